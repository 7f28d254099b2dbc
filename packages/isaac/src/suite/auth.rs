use super::{log_out_anyone, LOGIN_TAB, MENU_BUTTON};
use crate::context::SuiteContext;
use crate::forms::{self, Login};
use crate::{tabs, wait};
use anyhow::Result;
use std::thread;
use std::time::Duration;
use tracing::{error, info};

const NAV_MENU: &str = "//nav[@class='dl-nav']";
const COOKIES_MESSAGE: &str = "//div[@data-alert and contains(@class, 'cookies-message')]";
const COOKIES_ACCEPT: &str = "//a[contains(@class, 'cookies-accepted')]";
const LOGOUT_LINK: &str = "//a[@ui-sref='logout']";
const LOCKOUT_WARNING: &str = "//strong[contains(text(), 'too many attempts to login')]";
const BAD_LOGINS: usize = 11;

pub fn login(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    let student = &ctx.users.student;
    step!(driver.click(LOGIN_TAB), "Couldn't click login tab; can't login!");
    Login::user(student).keep_popup().submit(driver, ctx.settings.wait)?;
    ctx.pause();

    if !forms::is_logged_in(driver, Some(student), ctx.settings.wait)? {
        info!("Login failed!");
        let file = ctx.capture_failure("not_logging_in");
        error!("Can't login; see '{}'!", file);
        return Ok(false);
    }
    info!("Login successful.");
    pass!("Login using username and password successful.");
    Ok(true)
}

/// Must follow LOGIN directly: the popup is only offered shortly after a
/// fresh login.
pub fn questionnaire(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    info!("Ensure the popup has not been disabled, and wait 15 seconds for it to display.");
    forms::disable_popup(driver, true)?;
    if !forms::kill_popup(driver, Duration::from_secs(15))? {
        error!("Questionnaire popup not shown!");
        return Ok(false);
    }
    pass!("Questionnaire popup shown and closed.");
    Ok(true)
}

pub fn global_nav(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    step!(driver.click(MENU_BUTTON), "Can't find menu button to click; can't continue!");
    info!("Clicked menu button.");
    ctx.pause();
    step!(
        wait::for_visible(driver, NAV_MENU, wait::DEFAULT_TIMEOUT),
        "Global navigation didn't open!"
    );
    info!("Global navigation successfully opened.");
    ctx.pause();

    step!(driver.click(MENU_BUTTON), "Can't find menu button to close the menu!");
    ctx.pause();
    step!(
        wait::for_invisible(driver, NAV_MENU, wait::DEFAULT_TIMEOUT),
        "Global navigation didn't close!"
    );
    info!("Global navigation successfully closed.");
    pass!("Global navigation functions as expected.");
    Ok(true)
}

pub fn accept_cookies(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    ctx.pause();
    match wait::for_visible(driver, COOKIES_MESSAGE, wait::DEFAULT_TIMEOUT) {
        Ok(()) => {
            info!("Clicking 'Accept' on the cookies message.");
            step!(driver.click(COOKIES_ACCEPT), "Unable to accept cookies!");
        }
        Err(e) if e.is_page_problem() => {
            error!("WARNING: Can't find cookies message! Has it already been accepted?!");
        }
        Err(e) => return Err(e.into()),
    }
    step!(
        wait::for_invisible(driver, COOKIES_MESSAGE, wait::DEFAULT_TIMEOUT),
        "Cookie message didn't hide after being clicked!"
    );

    info!("Reloading the page to see if cookie message stays gone.");
    driver.refresh()?;
    ctx.pause();
    step!(
        wait::for_invisible(driver, COOKIES_MESSAGE, wait::DEFAULT_TIMEOUT),
        "Cookie message reappeared after page refresh!"
    );
    info!("Cookies message does not reappear.");
    pass!("The cookie message behaves as expected.");
    Ok(true)
}

/// A session started in one tab is picked up by a new one.
pub fn user_consistency(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    let student = &ctx.users.student;
    log_out_anyone(ctx)?;
    ctx.open("/login")?;

    Login::user(student).submit(driver, ctx.settings.wait)?;
    ctx.pause();
    if !forms::is_logged_in(driver, Some(student), ctx.settings.wait)? {
        info!("Login failed!");
        error!("Can't login to continue testing user consistency!");
        return Ok(false);
    }
    info!("Login successful.");

    tabs::new_tab(driver)?;
    driver.goto(&ctx.settings.site_url)?;
    info!("Got: {}.", ctx.settings.site_url);
    ctx.pause();
    let still_logged_in = forms::is_logged_in(driver, Some(student), ctx.settings.wait)?;
    tabs::close_tab(driver)?;
    ctx.pause();
    if !still_logged_in {
        error!("User not still logged in in new tab; can't test user consistency!");
        return Ok(false);
    }
    pass!("User still logged in in new tab.");
    Ok(true)
}

pub fn logout(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    step!(@shot ctx, "logout_failure";
        driver.click(MENU_BUTTON),
        "Can't find menu button; can't logout!"
    );
    ctx.pause();
    step!(@shot ctx, "logout_failure";
        driver.click(LOGOUT_LINK),
        "Can't find logout button; can't logout!"
    );
    ctx.pause();

    if !forms::is_logged_out(driver, ctx.settings.wait)? {
        let file = ctx.capture_failure("logout_failure");
        error!("Couldn't logout; see '{}'!", file);
        return Ok(false);
    }
    info!("Logged out.");
    pass!("Log out button works.");
    Ok(true)
}

/// Too many bad passwords lock the account for a while.
pub fn login_throttle(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    let student = &ctx.users.student;
    step!(driver.click(LOGIN_TAB), "Couldn't find login button; can't continue!");
    info!(
        "Clicked login tab. Now incorrectly submit login form {} times.",
        BAD_LOGINS
    );
    for _ in 0..BAD_LOGINS {
        Login::new(&student.email, "wrongpassword").submit(driver, ctx.settings.wait)?;
        ctx.pause();
    }

    if driver.count(LOCKOUT_WARNING)? == 0 {
        let file = ctx.capture_failure("login_throttle");
        error!(
            "Tried to log in {} times. No error message; see '{}'!",
            BAD_LOGINS, file
        );
        return Ok(false);
    }
    pass!("{} login attempts. Warning message shown and account locked out.", BAD_LOGINS);
    Ok(true)
}

/// Sits out the lockout, then logs in normally.
pub fn login_timeout(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    let student = &ctx.users.student;
    let lockout = ctx.settings.lockout;
    info!("Waiting for {}s lockout to expire.", lockout.as_secs());

    let minute = Duration::from_secs(60);
    let mut remaining = lockout;
    while remaining > Duration::ZERO {
        info!(
            "Still waiting. {} mins remaining.",
            remaining.as_secs().div_ceil(60)
        );
        let nap = remaining.min(minute);
        thread::sleep(nap);
        remaining -= nap;
    }
    info!("Finished waiting.");

    Login::user(student).submit(driver, ctx.settings.wait)?;
    ctx.pause();
    if !forms::is_logged_in(driver, Some(student), ctx.settings.wait)? {
        info!("Login failed!");
        let file = ctx.capture_failure("login_after_lockout");
        error!("Can't login after lockout; see '{}'!", file);
        return Ok(false);
    }
    info!("Login successful.");
    pass!("Login after lockout.");
    Ok(true)
}

/// Email addresses are matched case-insensitively at login.
pub fn login_uppercase(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    let student = &ctx.users.student;
    log_out_anyone(ctx)?;
    step!(driver.click(LOGIN_TAB), "Can't access login tab; can't continue!");
    let shouted = student.email.to_uppercase();
    Login::new(&shouted, &student.password).submit(driver, ctx.settings.wait)?;
    ctx.pause();

    if !forms::is_logged_in(driver, Some(student), ctx.settings.wait)? {
        info!("Login failed!");
        let file = ctx.capture_failure("logging_in_uppercase");
        error!("Can't login with uppercase email; see '{}'!", file);
        return Ok(false);
    }
    info!("Login successful.");
    pass!("Login using uppercase version of email successful.");
    Ok(true)
}
