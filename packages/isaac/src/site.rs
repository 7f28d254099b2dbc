use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

pub const HSTS_HEADER: &str = "Strict-Transport-Security";
const ONE_YEAR_SECS: u64 = 60 * 60 * 24 * 365;

#[derive(Error, Debug)]
pub enum HstsError {
    #[error("No HSTS header present in response from '{0}'!")]
    Missing(String),

    #[error("Expected 3 directives in header, found {0}!")]
    DirectiveCount(usize),

    #[error("HSTS requires a max-age directive to be effective!")]
    NoMaxAge,

    #[error("Malformed max-age directive '{0}'!")]
    MalformedMaxAge(String),

    #[error("Expected '{0}' directive: not found!")]
    MissingDirective(&'static str),

    #[error("HSTS max-age should be greater than 1 year, got {0}s!")]
    MaxAgeTooShort(u64),

    #[error("Cannot connect to '{url}': {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Validates a `Strict-Transport-Security` value: exactly three directives,
/// `includeSubDomains`, `preload`, and a `max-age` over one year. Returns
/// the max-age in seconds.
pub fn check_hsts(header: &str) -> Result<u64, HstsError> {
    let directives: Vec<&str> = header.split(';').map(str::trim).collect();
    if directives.len() != 3 {
        return Err(HstsError::DirectiveCount(directives.len()));
    }
    let max_age = directives
        .iter()
        .find_map(|d| d.strip_prefix("max-age="))
        .ok_or(HstsError::NoMaxAge)?;
    for required in ["includeSubDomains", "preload"] {
        if !directives.contains(&required) {
            return Err(HstsError::MissingDirective(required));
        }
    }
    let max_age: u64 = max_age
        .parse()
        .map_err(|_| HstsError::MalformedMaxAge(max_age.to_string()))?;
    if max_age <= ONE_YEAR_SECS {
        return Err(HstsError::MaxAgeTooShort(max_age));
    }
    Ok(max_age)
}

/// Fetches `url` directly and returns its HSTS header value.
pub fn fetch_hsts(client: &reqwest::blocking::Client, url: &str) -> Result<String, HstsError> {
    info!("Making direct HTTP request to '{}'", url);
    let response = client.get(url).send().map_err(|source| HstsError::Request {
        url: url.to_string(),
        source,
    })?;
    let header = response
        .headers()
        .get(HSTS_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| HstsError::Missing(url.to_string()))?;
    info!("HSTS header present in response: '{}'.", header);
    Ok(header.to_string())
}

/// Polls `url` every 100ms until it answers with a success status.
pub async fn wait_for_site(url: &str, timeout: Duration) -> anyhow::Result<()> {
    let started = Instant::now();
    let mut attempts: u32 = 0;
    while started.elapsed() < timeout {
        if let Ok(response) = reqwest::get(url).await {
            if response.status().is_success() {
                info!("Site '{}' is up.", url);
                return Ok(());
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        attempts += 1;
        if attempts % 50 == 0 {
            warn!(
                "Still waiting for '{}'... ({}s)",
                url,
                started.elapsed().as_secs()
            );
        }
    }
    anyhow::bail!("Site '{}' did not respond in time (waited {:?})", url, timeout)
}
