use crate::browser::{BrowserError, Driver};
use tracing::{error, info};

pub fn new_tab(driver: &dyn Driver) -> Result<(), BrowserError> {
    driver.open_tab()?;
    info!("Opened new tab.");
    Ok(())
}

/// Focuses the first tab whose url contains `url_part`, trying the current
/// tab before the others. Tab urls must be distinct for this to be reliable.
pub fn assert_tab(driver: &dyn Driver, url_part: &str) -> Result<(), BrowserError> {
    info!(
        "AssertTab: Changing to tab with url containing '{}'.",
        url_part
    );
    if driver.current_url()?.contains(url_part) {
        return Ok(());
    }
    let current = driver.active_tab();
    for index in (0..driver.tab_count()).filter(|i| *i != current) {
        driver.switch_tab(index)?;
        if driver.current_url()?.contains(url_part) {
            return Ok(());
        }
    }
    driver.switch_tab(current)?;
    error!(
        "AssertTab: Couldn't reach required tab with url containing '{}'!",
        url_part
    );
    Err(BrowserError::TabNotFound(url_part.to_string()))
}

/// Closes the current tab and focuses the first one.
pub fn close_tab(driver: &dyn Driver) -> Result<(), BrowserError> {
    let old_url = driver.current_url()?;
    driver.close_tab()?;
    if driver.tab_count() > 0 {
        driver.switch_tab(0)?;
    }
    let new_url = driver.current_url().unwrap_or_default();
    info!("Closed tab {}. Now on {}", old_url, new_url);
    Ok(())
}
