use super::{log_out_anyone, LOGIN_TAB, TOAST_TITLE};
use crate::browser::{BrowserError, Driver};
use crate::context::SuiteContext;
use crate::forms::{self, rewrite_api_link, Login};
use crate::{tabs, wait};
use anyhow::Result;
use std::thread;
use std::time::Duration;
use tracing::{error, info};

const EMAIL_FIELD: &str = "(//input[@name='email'])[2]";
const FORGOT_PASSWORD: &str = "(//a[@ng-click='resetPassword()'])[2]";
const RESET_MESSAGE: &str = "(//p[@ng-show='passwordResetFlag'])[2]";
const NEW_PASSWORD: &str = "//input[@id='password']";
const CONFIRM_PASSWORD: &str = "//input[@id='confirm-password']";
const CHANGE_PASSWORD: &str = "//button[@ng-click='resetPassword()']";
const RESET_DONE: &str =
    "//div[@ng-switch='submitted']/div[contains(text(), 'reset successfully')]";
const SUBJECT: &str = "Password Reset Request";
const LINK_TEXT: &str = "click here";
/// Reset emails sent before the site starts refusing requests.
const RESET_LIMIT: usize = 4;

/// Asks for one password reset more than allowed. The last request should
/// raise an error toast; the others only the inline confirmation.
pub fn throttle(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    log_out_anyone(ctx)?;
    ctx.open("/login")?;

    let email = ctx.temp.email();
    step!(driver.fill(EMAIL_FIELD, &email), "No login form to request a reset from!");
    for attempt in 0..=RESET_LIMIT {
        info!("Clicking password reset button.");
        step!(driver.click(FORGOT_PASSWORD), "No password reset button!");
        thread::sleep(Duration::from_millis(100));
        let shot = format!("reset_password_button_message_{attempt}");
        ctx.artifacts.screenshot(driver, &shot)?;
        let requests = attempt + 1;

        if attempt < RESET_LIMIT {
            step!(
                wait::for_invisible(driver, TOAST_TITLE, Duration::from_millis(500)),
                "Password reset error message unexpectedly shown after {} requests!",
                requests
            );
            thread::sleep(Duration::from_millis(500));
            let message = step!(
                driver.text(RESET_MESSAGE),
                "No password reset message shown; see '{}.png'!",
                shot
            );
            if !message.contains("Your password request is being processed.") {
                error!("Incorrect password reset message shown; see '{}.png'!", shot);
                return Ok(false);
            }
        } else {
            step!(
                wait::for_visible(driver, TOAST_TITLE, wait::DEFAULT_TIMEOUT),
                "Password reset error message not shown after {} requests.",
                requests
            );
            info!("Password reset error message shown after {} attempts.", requests);
            break;
        }
        ctx.pause();
    }
    pass!(
        "Password reset error message shown after {} requests.",
        RESET_LIMIT + 1
    );
    Ok(true)
}

pub fn receive_emails(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_mailbox_tab()?;
    let driver = ctx.driver();
    ctx.inbox.wait_for_email(driver, ctx.settings.wait, RESET_LIMIT)?;

    info!("Getting all unread emails with subject '{}'.", SUBJECT);
    let emails = ctx.inbox.by_subject(driver, SUBJECT, true)?;
    if emails.len() != RESET_LIMIT {
        let file = ctx.capture_failure("receive_reset_pwd");
        error!(
            "Expected {} password reset emails, received {}. See '{}'!",
            RESET_LIMIT,
            emails.len(),
            file
        );
        return Ok(false);
    }
    info!("Received the expected {} password reset emails.", RESET_LIMIT);
    for email in &emails {
        step!(
            ctx.inbox.image(driver, &ctx.artifacts, email),
            "Can't image {}!",
            email
        );
        step!(
            ctx.inbox.save_html_body(driver, &ctx.artifacts, email),
            "Can't save {}!",
            email
        );
    }
    pass!("{} reset password emails received.", RESET_LIMIT);
    Ok(true)
}

fn submit_new_password(driver: &dyn Driver, password: &str) -> Result<(), BrowserError> {
    driver.fill(NEW_PASSWORD, password)?;
    driver.fill(CONFIRM_PASSWORD, password)?;
    info!("Submitting new password.");
    driver.click(CHANGE_PASSWORD)
}

/// Sets the temporary account's new password through the emailed link.
pub fn reset_link(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_mailbox_tab()?;
    let driver = ctx.driver();
    info!("About to check latest reset password link works.");
    let Some(email) = ctx.inbox.by_subject(driver, SUBJECT, false)?.into_iter().next() else {
        error!("No password reset emails received! Can't continue.");
        return Ok(false);
    };
    step!(
        ctx.inbox.view(driver, &email, true),
        "Can't open the password reset email!"
    );
    info!("Selecting most recent password reset email '{}'.", email);
    ctx.pause();
    let link = ctx.inbox.body_link(driver, LINK_TEXT)?;
    ctx.inbox.close(driver)?;
    ctx.pause();
    let Some(link) = link else {
        error!("Can't access reset password link in email; can't continue!");
        return Ok(false);
    };
    let url = rewrite_api_link(&link, &ctx.settings.site_url);
    info!("Reset Password URL: '{}'.", url);

    tabs::new_tab(driver)?;
    info!("Opening password reset link from email in new tab.");
    driver.goto(&url)?;
    ctx.pause();
    tabs::assert_tab(driver, &ctx.site("/resetpassword"))?;

    let password = ctx.temp.new_password.as_str();
    let reset = match submit_new_password(driver, password) {
        Ok(()) => {
            ctx.pause();
            if driver.count(RESET_DONE)? > 0 {
                true
            } else {
                let file = ctx.capture_failure("resetting_password");
                error!("Resetting password failed; see '{}'!", file);
                false
            }
        }
        Err(e) if e.is_page_problem() => {
            error!("Can't access reset password form correctly; can't continue!");
            false
        }
        Err(e) => return Err(e.into()),
    };
    tabs::close_tab(driver)?;
    ctx.pause();
    if !reset {
        return Ok(false);
    }
    ctx.temp.set_password(password);
    pass!("Reset password link works.");
    Ok(true)
}

pub fn login_with_new_password(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    driver.goto(&ctx.settings.site_url)?;
    info!("Got: {}", ctx.settings.site_url);
    ctx.pause();

    let user = ctx.temp.user();
    step!(driver.click(LOGIN_TAB), "Can't access login tab; can't continue!");
    Login::user(&user).submit(driver, ctx.settings.wait)?;
    ctx.pause();
    if !forms::is_logged_in(driver, Some(&user), ctx.settings.wait)? {
        info!("Login failed!");
        let file = ctx.capture_failure("not_logging_in");
        error!("Can't login with new password; see '{}'!", file);
        return Ok(false);
    }
    info!("Login successful.");
    pass!("Login using username and new password successful.");
    Ok(true)
}
