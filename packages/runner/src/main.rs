use anyhow::{anyhow, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use config::{ReportConfig, RunnerConfig};
use harness::{Registry, Summary};
use isaac::{site, suite, SuiteContext};
use report::Report;
use session::Target;
use tracing::{error, info, warn};

mod config;
mod logging;
mod report;
mod session;

/// Browser regression suite for the Isaac Physics website
#[derive(Parser, Debug)]
#[command(name = "isaac-regression")]
#[command(version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Run only this test, after its prerequisites and followed by its teardowns
    #[arg(value_name = "TEST_NAME")]
    test: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Print the dependency graph in Graphviz DOT format and exit
    Graph,
}

impl Cli {
    fn target(self) -> Target {
        match self.test {
            Some(name) => Target::Single(name),
            None => Target::All,
        }
    }
}

fn install_panic_hook() {
    std::panic::set_hook(Box::new(|info| {
        error!("panic: {info}");
    }));
}

fn log_runtime_config(config: &RunnerConfig) {
    info!(
        "startup: ISAAC_WEB={} GUERRILLAMAIL={}",
        config.site_url, config.mailbox_url
    );
    info!(
        "startup: WAIT_DUR={}s LOCKOUT_SECS={} ANSWER_COOLDOWN_SECS={} HEADLESS={} OUTPUT_DIR={}",
        config.wait.as_secs(),
        config.lockout.as_secs(),
        config.cooldown.as_secs(),
        config.headless,
        config.output_dir.display()
    );
    match &config.report {
        ReportConfig::Smtp(smtp) => info!("startup: REPORT_MODE=smtp {:?}", smtp),
        ReportConfig::Console => info!("startup: REPORT_MODE=console"),
        ReportConfig::Off => info!("startup: REPORT_MODE=off"),
    }
    if !config.users_file.exists() {
        warn!(
            "startup: WARNING test users file {} not found",
            config.users_file.display()
        );
    }
}

fn print_graph() -> Result<()> {
    let mut registry: Registry<SuiteContext> = Registry::new();
    suite::register_all(&mut registry)?;
    registry.validate()?;
    print!("{}", registry.dependency_graph());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if cli.command == Some(Commands::Graph) {
        return print_graph();
    }
    let target = cli.target();

    let config = RunnerConfig::from_env()?;
    std::fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "creating output directory {}",
            config.output_dir.display()
        )
    })?;
    let errors = logging::init(&config.log_file())?;
    install_panic_hook();
    log_runtime_config(&config);

    let started = Local::now();
    let session = match site::wait_for_site(&config.site_url, config.site_timeout)
        .await
        .with_context(|| format!("{} is not responding", config.site_url))
    {
        Ok(()) => tokio::task::spawn_blocking({
            let config = config.clone();
            move || session::run(&config, &target)
        })
        .await
        .map_err(|e| anyhow!("Task join error: {}", e))?,
        Err(e) => session::not_started(e),
    };

    if let Some(failure) = &session.failure {
        error!("Testing aborted: {:#}", failure);
    }
    let summary = Summary::new(&session.ledger, session.status, errors.count());
    for line in summary.to_string().lines() {
        info!("{}", line);
    }

    if let Some(mailer) = report::mailer(&config.report) {
        let report = Report::new(started, &summary, Some(config.log_file()));
        if let Err(e) = mailer.send(&report).await {
            error!("Couldn't send the report mail: {:#}", e);
        }
    }

    match session.failure {
        Some(failure) => Err(failure.context("regression run aborted")),
        None => Ok(()),
    }
}
