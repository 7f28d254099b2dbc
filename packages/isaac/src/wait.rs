//! Fixed-interval polling on page state.

use crate::browser::{BrowserError, Driver};
use std::thread;
use std::time::{Duration, Instant};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Checks `cond` once, then every `interval` until it holds or `timeout` has
/// passed. Returns whether it held. Errors from `cond` stop the wait.
pub fn poll_until<F>(
    timeout: Duration,
    interval: Duration,
    mut cond: F,
) -> Result<bool, BrowserError>
where
    F: FnMut() -> Result<bool, BrowserError>,
{
    let started = Instant::now();
    loop {
        if cond()? {
            return Ok(true);
        }
        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Ok(false);
        }
        thread::sleep(interval.min(timeout - elapsed));
    }
}

fn expect(
    driver: &dyn Driver,
    xpath: &str,
    timeout: Duration,
    condition: &'static str,
    check: impl Fn(&dyn Driver, &str) -> Result<bool, BrowserError>,
) -> Result<(), BrowserError> {
    if poll_until(timeout, POLL_INTERVAL, || check(driver, xpath))? {
        Ok(())
    } else {
        Err(BrowserError::Timeout {
            condition,
            xpath: xpath.to_string(),
            waited: timeout,
        })
    }
}

pub fn for_visible(
    driver: &dyn Driver,
    xpath: &str,
    timeout: Duration,
) -> Result<(), BrowserError> {
    expect(driver, xpath, timeout, "visible", |d, x| d.is_displayed(x))
}

/// In the DOM, visible or not.
pub fn for_present(
    driver: &dyn Driver,
    xpath: &str,
    timeout: Duration,
) -> Result<(), BrowserError> {
    expect(driver, xpath, timeout, "present", |d, x| Ok(d.count(x)? > 0))
}

/// Hidden or gone.
pub fn for_invisible(
    driver: &dyn Driver,
    xpath: &str,
    timeout: Duration,
) -> Result<(), BrowserError> {
    expect(driver, xpath, timeout, "invisible", |d, x| Ok(!d.is_displayed(x)?))
}
