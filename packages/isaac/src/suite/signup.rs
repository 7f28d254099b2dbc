use super::{log_out_anyone, LOGIN_TAB};
use crate::context::SuiteContext;
use crate::forms;
use crate::wait;
use anyhow::Result;
use tracing::{error, info};

const WELCOME_SUBJECT: &str = "Welcome to Isaac Physics!";
const ACCOUNT_EXISTS: &str = "//h4[contains(text(), 'Registration Failed')]\
    /span[contains(text(), 'An account already exists with the e-mail address')]";

/// Registers the temporary account. DELETE_USER removes it again.
pub fn signup(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    log_out_anyone(ctx)?;

    ctx.to_site_tab()?;
    ctx.pause();
    step!(driver.click(LOGIN_TAB), "Can't find login button; can't continue!");
    ctx.pause();

    let user = ctx.temp.user();
    if !forms::sign_up(driver, &user, ctx.settings.wait, false)? {
        error!("Can't register user!");
        return Ok(false);
    }
    pass!("Successfully register new user '{}' on Isaac.", user.email);
    Ok(true)
}

pub fn welcome_email(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_mailbox_tab()?;
    let driver = ctx.driver();
    ctx.inbox.wait_for_email(driver, ctx.settings.wait, 1)?;

    info!("GuerrillaMail: Access welcome email in inbox.");
    let welcome = ctx.inbox.by_subject(driver, WELCOME_SUBJECT, false)?;
    if welcome.len() != 1 {
        let file = ctx.capture_failure("not_isaac_email");
        error!(
            "Expected to receive a welcome email, received {} emails! See '{}'!",
            welcome.len(),
            file
        );
        return Ok(false);
    }
    info!("Got welcome email as expected.");
    step!(
        ctx.inbox.image(driver, &ctx.artifacts, &welcome[0]),
        "Can't image the welcome email!"
    );
    step!(
        ctx.inbox.save_html_body(driver, &ctx.artifacts, &welcome[0]),
        "Can't save the welcome email!"
    );
    pass!("Welcome email received!");
    Ok(true)
}

/// An existing address in another case must not register a second account.
pub fn signup_uppercase(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    log_out_anyone(ctx)?;
    step!(driver.click(LOGIN_TAB), "Can't access login tab; can't continue!");
    ctx.pause();

    info!("Try to sign up with uppercase version of already used email.");
    let mut shouted = ctx.temp.user();
    shouted.email = shouted.email.to_uppercase();
    if forms::sign_up(driver, &shouted, ctx.settings.wait, true)? {
        error!("Sign up successful despite being uppercase form of existing account!");
        return Ok(false);
    }
    step!(
        wait::for_visible(driver, ACCOUNT_EXISTS, wait::DEFAULT_TIMEOUT),
        "Sign up with uppercase email failed with wrong error message!"
    );
    ctx.pause();
    info!("Couldn't sign up, as expected.");

    driver.goto(&ctx.settings.site_url)?;
    info!("Got: {}", ctx.settings.site_url);
    ctx.pause();
    pass!("Cannot sign up with uppercase form of existing email.");
    Ok(true)
}
