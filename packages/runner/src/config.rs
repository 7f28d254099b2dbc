use isaac::{LaunchConfig, SuiteSettings};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var}='{value}' is not a valid {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{0} must be set when REPORT_MODE=smtp")]
    Missing(&'static str),
}

/// Where the end-of-run report goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportMode {
    Smtp,
    Console,
    Off,
}

impl FromStr for ReportMode {
    type Err = ();

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_lowercase().as_str() {
            "smtp" => Ok(ReportMode::Smtp),
            "console" => Ok(ReportMode::Console),
            "off" | "none" => Ok(ReportMode::Off),
            _ => Err(()),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
    pub to: Vec<String>,
}

impl fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from", &self.from)
            .field("to", &self.to)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportConfig {
    Smtp(SmtpSettings),
    Console,
    Off,
}

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub site_url: String,
    pub mailbox_url: String,
    pub wait: Duration,
    pub lockout: Duration,
    pub cooldown: Duration,
    pub site_timeout: Duration,
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub users_file: PathBuf,
    pub output_dir: PathBuf,
    pub temp_email: String,
    pub temp_new_email: String,
    pub temp_password: String,
    pub temp_new_password: String,
    pub report: ReportConfig,
}

fn parse<T: FromStr>(
    var: &'static str,
    raw: Option<String>,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            value,
            expected,
        }),
    }
}

fn parse_bool(var: &'static str, raw: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = raw else {
        return Ok(default);
    };
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value,
            expected: "boolean",
        }),
    }
}

impl RunnerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads every setting through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let text = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let report_mode = match get("REPORT_MODE") {
            None => ReportMode::Console,
            Some(value) => value.parse().map_err(|()| ConfigError::Invalid {
                var: "REPORT_MODE",
                value,
                expected: "report mode (smtp, console, off)",
            })?,
        };
        let report = match report_mode {
            ReportMode::Console => ReportConfig::Console,
            ReportMode::Off => ReportConfig::Off,
            ReportMode::Smtp => {
                let required = |var: &'static str| get(var).ok_or(ConfigError::Missing(var));
                let to: Vec<String> = required("REPORT_TO")?
                    .split(',')
                    .map(|addr| addr.trim().to_string())
                    .filter(|addr| !addr.is_empty())
                    .collect();
                if to.is_empty() {
                    return Err(ConfigError::Missing("REPORT_TO"));
                }
                ReportConfig::Smtp(SmtpSettings {
                    host: required("SMTP_HOST")?,
                    port: parse("SMTP_PORT", get("SMTP_PORT"), 587, "port number")?,
                    username: get("SMTP_USERNAME"),
                    password: get("SMTP_PASSWORD"),
                    from: required("REPORT_FROM")?,
                    to,
                })
            }
        };

        Ok(Self {
            site_url: text("ISAAC_WEB", "https://staging.isaacphysics.org"),
            mailbox_url: text("GUERRILLAMAIL", "https://www.guerrillamail.com"),
            wait: Duration::from_secs(parse("WAIT_DUR", get("WAIT_DUR"), 2, "number of seconds")?),
            lockout: Duration::from_secs(parse(
                "LOCKOUT_SECS",
                get("LOCKOUT_SECS"),
                610,
                "number of seconds",
            )?),
            cooldown: Duration::from_secs(parse(
                "ANSWER_COOLDOWN_SECS",
                get("ANSWER_COOLDOWN_SECS"),
                60,
                "number of seconds",
            )?),
            site_timeout: Duration::from_secs(parse(
                "SITE_TIMEOUT_SECS",
                get("SITE_TIMEOUT_SECS"),
                60,
                "number of seconds",
            )?),
            headless: parse_bool("HEADLESS", get("HEADLESS"), true)?,
            chrome_path: get("CHROME_PATH").map(PathBuf::from),
            users_file: PathBuf::from(text("TEST_USERS_FILE", "TestUsers.json")),
            output_dir: PathBuf::from(text("OUTPUT_DIR", "test_output")),
            temp_email: text("TEMP_EMAIL", "isaactest@sharklasers.com"),
            temp_new_email: text("TEMP_NEW_EMAIL", "isaactesttwo@sharklasers.com"),
            temp_password: text("TEMP_PASSWORD", "test"),
            temp_new_password: text("TEMP_NEW_PASSWORD", "testing123"),
            report,
        })
    }

    pub fn suite_settings(&self) -> SuiteSettings {
        SuiteSettings {
            site_url: self.site_url.clone(),
            mailbox_url: self.mailbox_url.clone(),
            wait: self.wait,
            lockout: self.lockout,
            cooldown: self.cooldown,
        }
    }

    /// The browser must stay up through the login lockout wait, which sends
    /// no protocol traffic.
    pub fn launch_config(&self) -> LaunchConfig {
        LaunchConfig {
            headless: self.headless,
            chrome_path: self.chrome_path.clone(),
            idle_timeout: self.lockout + Duration::from_secs(300),
            ..LaunchConfig::default()
        }
    }

    pub fn log_file(&self) -> PathBuf {
        self.output_dir.join("_TEST_LOG.txt")
    }
}
