use super::log_out_anyone;
use crate::context::SuiteContext;
use crate::forms::{self, Login, MobileView};
use anyhow::Result;
use tracing::{error, info};

const MOBILE_LOGIN: &str = "//div[@id='mobile-login']";
const ACCOUNT_SETTINGS: &str = "(//a[@ui-sref='accountSettings'])[1]";
const MOBILE_LOGOUT: &str = "//a[contains(text(), 'Log out')]";

pub fn login(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    let student = &ctx.users.student;
    log_out_anyone(ctx)?;

    let view = MobileView::enter(driver)?;
    ctx.pause();
    // The verification banner covers the menu on small screens.
    if !forms::snooze_email_verification(driver)? {
        error!("Can't continue with this test since the banner obstructs the menu!");
        return Ok(false);
    }
    step!(@shot ctx, "mobile_login";
        driver.click(MOBILE_LOGIN),
        "Cannot find mobile login button."
    );
    ctx.pause();
    Login::user(student).mobile().submit(driver, ctx.settings.wait)?;
    ctx.pause();
    if !forms::is_logged_in(driver, Some(student), ctx.settings.wait)? {
        error!("Failed to log in on mobile!");
        return Ok(false);
    }
    info!("Login succeeded on mobile site.");
    drop(view);

    pass!("Mobile login works as expected!");
    Ok(true)
}

pub fn logout(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();

    let view = MobileView::enter(driver)?;
    ctx.pause();
    if !forms::snooze_email_verification(driver)? {
        error!("Can't continue with this test since the banner obstructs the menu!");
        return Ok(false);
    }
    step!(@shot ctx, "logout_failure";
        driver.click(ACCOUNT_SETTINGS),
        "Can't find account settings; can't logout!"
    );
    ctx.pause();
    step!(@shot ctx, "logout_failure";
        driver.click(MOBILE_LOGOUT),
        "Can't find logout button; can't logout!"
    );

    if !forms::is_logged_out(driver, ctx.settings.wait)? {
        let file = ctx.capture_failure("mobile_logout_failure");
        error!("Couldn't logout; see '{}'!", file);
        return Ok(false);
    }
    info!("Logged out successfully.");
    ctx.pause();
    drop(view);

    pass!("Mobile log out works as expected.");
    Ok(true)
}
