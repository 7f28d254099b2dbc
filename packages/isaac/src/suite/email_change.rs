use super::verification::{LINK_TEXT, SUBJECT as VERIFY_SUBJECT, VERIFIED};
use super::{log_out_anyone, MENU_BUTTON};
use crate::context::SuiteContext;
use crate::forms::{self, rewrite_api_link, Login};
use crate::{tabs, wait};
use anyhow::Result;
use std::time::Duration;
use tracing::{error, info};

const ACCOUNT_LINK: &str = "(//a[@ui-sref='accountSettings'])[2]";
const ACCOUNT_EMAIL: &str = "//input[@id='account-email']";
const SAVE: &str = "//a[text()='Save']";
const SAVED_NOTICE: &str = "You have edited your email address.";
const WARNING_SUBJECT: &str = "Change in Isaac Physics email address requested!";
const BAD_CREDENTIALS: &str = "//strong[text()='Incorrect credentials provided.']";
const REJECT_WAIT: Duration = Duration::from_secs(5);

/// Changes the temporary account's email address on the account page. The
/// site confirms with an alert and sends the user home.
pub fn email_change(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    ctx.pause();
    log_out_anyone(ctx)?;
    let user = ctx.temp.user();
    info!("Attempting to change email address for '{}'.", user.email);
    ctx.open("/login")?;
    Login::user(&user).submit(driver, ctx.settings.wait)?;
    ctx.pause();

    step!(
        @shot ctx, "account_global_nav";
        driver.click(MENU_BUTTON).and_then(|()| {
            info!("Opened global nav (menu bar).");
            ctx.pause();
            driver.click(ACCOUNT_LINK)
        }),
        "Couldn't access 'My Account' link from global nav!"
    );
    info!("Clicked 'My Account' button.");
    ctx.pause();

    let start_url = driver.current_url()?;
    if !start_url.contains("/account") {
        let file = ctx.capture_failure("change_email_page");
        error!("'/account' not in URL: '{}'; see '{}'!", start_url, file);
        return Ok(false);
    }
    let email_box = format!("{ACCOUNT_EMAIL}/..");
    step!(
        @shot ctx, "change_email_page";
        ctx.artifacts
            .screenshot_element(driver, "change_email_old_email", &email_box)
            .and_then(|_| driver.fill(ACCOUNT_EMAIL, &ctx.temp.new_email)),
        "Couldn't change email on 'My Account' page!"
    );
    ctx.pause();
    ctx.artifacts
        .screenshot_element(driver, "change_email_new_email", &email_box)?;

    driver.arm_dialogs(true)?;
    step!(
        @shot ctx, "change_email_page";
        driver.click(SAVE),
        "Couldn't save the account settings!"
    );
    ctx.pause();
    let notice = driver.last_dialog()?.unwrap_or_default();
    info!("Have to accept an alert.");
    if !notice.contains(SAVED_NOTICE) {
        let file = ctx.capture_failure("change_email_page");
        error!("Alert contained unexpected message '{}'; see '{}'!", notice, file);
        return Ok(false);
    }
    info!("Alert said: '{}'.", notice);
    ctx.pause();

    let end_url = driver.current_url()?;
    if end_url == start_url {
        let file = ctx.capture_failure("change_email_page");
        error!("Expected to leave account page, but still on '{}'; see '{}'!", end_url, file);
        return Ok(false);
    }
    let home = format!("{}/", ctx.settings.site_url.trim_end_matches('/'));
    let landed = end_url.split('#').next().unwrap_or_default();
    if landed != home {
        let file = ctx.capture_failure("change_email_page");
        error!(
            "Should have redirected to homepage, went to '{}' instead; see '{}'!",
            end_url, file
        );
        return Ok(false);
    }
    pass!("Email changed in account setting successfully.");
    Ok(true)
}

/// The old address gets a warning naming the new one; the new address gets
/// a verification email, whose link is kept for the login checks.
pub fn email_change_emails(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_mailbox_tab()?;
    let driver = ctx.driver();
    let new_email = &ctx.temp.new_email;
    info!("Checking if emails were sent after changing account email.");
    ctx.inbox.wait_for_email(driver, ctx.settings.wait, 1)?;

    let Some(warning) = ctx.inbox.by_subject(driver, WARNING_SUBJECT, false)?.into_iter().next()
    else {
        let file = ctx.capture_failure("no_old_email_warning");
        error!("No warning email received in old email inbox; see '{}'!", file);
        return Ok(false);
    };
    info!("Old warning email received and has expected subject line.");
    step!(ctx.inbox.image(driver, &ctx.artifacts, &warning), "Can't image {}!", warning);
    step!(
        ctx.inbox.save_html_body(driver, &ctx.artifacts, &warning),
        "Can't save {}!",
        warning
    );
    step!(ctx.inbox.view(driver, &warning, false), "Can't open {}!", warning);
    let named = ctx.inbox.body_link(driver, new_email)?;
    ctx.inbox.close(driver)?;
    if named.is_none() {
        error!("Link to new address not in old warning email, see image!");
        return Ok(false);
    }
    info!("Warning email successfully sent to old address.");
    ctx.pause();

    if let Err(e) = ctx.inbox.set_address(driver, Some(new_email.as_str())) {
        error!("Can't switch the mailbox to '{}': {:#}", new_email, e);
        return Ok(false);
    }
    ctx.inbox.wait_for_email(driver, ctx.settings.wait, 1)?;
    let Some(verify) = ctx.inbox.by_subject(driver, VERIFY_SUBJECT, false)?.into_iter().next()
    else {
        let file = ctx.capture_failure("verify_new_not_received");
        error!("Verification email for new email not received; see '{}'!", file);
        return Ok(false);
    };
    info!("New verify email received and has expected subject line.");
    step!(ctx.inbox.image(driver, &ctx.artifacts, &verify), "Can't image {}!", verify);
    step!(
        ctx.inbox.save_html_body(driver, &ctx.artifacts, &verify),
        "Can't save {}!",
        verify
    );
    step!(ctx.inbox.view(driver, &verify, false), "Can't open {}!", verify);
    ctx.pause();
    let link = ctx.inbox.body_link(driver, LINK_TEXT)?;
    ctx.inbox.close(driver)?;
    let Some(link) = link else {
        error!("Couldn't access new email verification link in email!");
        return Ok(false);
    };
    ctx.temp
        .set_verify_link(rewrite_api_link(&link, &ctx.settings.site_url));
    info!("Copied verification link.");
    ctx.pause();
    pass!("Emails received for old and new accounts after changing email address.");
    Ok(true)
}

/// Submits the login form and waits briefly for the bad credentials notice.
fn login_refused(ctx: &SuiteContext, email: &str, password: &str) -> Result<bool> {
    let driver = ctx.driver();
    Login::new(email, password).submit(driver, ctx.settings.wait)?;
    info!("Submitted login form for '{}'.", email);
    match wait::for_visible(driver, BAD_CREDENTIALS, REJECT_WAIT) {
        Ok(()) => Ok(true),
        Err(e) if e.is_page_problem() => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// The old address logs in until the new one is verified; afterwards only
/// the new one does.
pub fn email_change_login_status(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    info!(
        "Now testing login conditions; old email should work until after verification, \
         then new email only."
    );
    log_out_anyone(ctx)?;
    let user = ctx.temp.user();
    let new_email = ctx.temp.new_email.as_str();

    ctx.open("/login")?;
    Login::user(&user).submit(driver, ctx.settings.wait)?;
    info!("Submitted login form with old credentials.");
    ctx.pause();
    if !forms::is_logged_in(driver, Some(&user), ctx.settings.wait)? {
        let file = ctx.capture_failure("not_logging_in");
        error!(
            "Login failed with old email before verification of new email; see '{}'!",
            file
        );
        return Ok(false);
    }
    info!("Login successful with old email before verification of new email.");
    ctx.open("/logout")?;
    ctx.open("/login")?;

    if !login_refused(ctx, new_email, &user.password)? {
        let file = ctx.capture_failure("logged_in_unexpectedly");
        error!(
            "Login succeeded with new email before verification of new email; see '{}'!",
            file
        );
        return Ok(false);
    }
    info!("Login failed with new email before verification of new email.");
    driver.refresh()?;
    ctx.pause();

    info!("Now verifying new email address.");
    let Some(link) = ctx.temp.verify_link() else {
        error!("New email verification link not saved. Can't complete test!");
        return Ok(false);
    };
    tabs::new_tab(driver)?;
    ctx.pause();
    driver.goto(&link)?;
    info!("Got: {}", link);
    match wait::for_visible(driver, VERIFIED, wait::DEFAULT_TIMEOUT) {
        Ok(()) => {}
        Err(e) if e.is_page_problem() => {
            let file = ctx.capture_failure("change_email_verify_fail");
            tabs::close_tab(driver)?;
            ctx.pause();
            error!("New email verification failed, can't continue. See '{}'!", file);
            return Ok(false);
        }
        Err(e) => return Err(e.into()),
    }
    ctx.pause();
    info!("Verification of new email address succeeded.");
    info!("Updating internal credentials to reflect new email address!");
    ctx.temp.set_email(new_email);
    tabs::close_tab(driver)?;

    ctx.to_site_tab()?;
    if !login_refused(ctx, &user.email, &user.password)? {
        let file = ctx.capture_failure("logged_in_unexpectedly");
        error!(
            "Login succeeded with old email after verification of new email; see '{}'!",
            file
        );
        info!("Reverting update to internal credentials as old email still working!");
        ctx.temp.set_email(&user.email);
        return Ok(false);
    }
    info!("Login failed with old email after verification of new email.");

    ctx.open("/login")?;
    Login::new(new_email, &user.password).submit(driver, ctx.settings.wait)?;
    info!("Submitted login form with new credentials.");
    ctx.pause();
    if !forms::is_logged_in(driver, None, ctx.settings.wait)? {
        let file = ctx.capture_failure("not_logging_in");
        error!(
            "Login failed with new email after verification of new email; see '{}'!",
            file
        );
        return Ok(false);
    }
    info!("Login successful with new email after verification of new email.");
    ctx.pause();
    pass!(
        "Old login worked until verification of new, then stopped. \
         New didn't work until verification."
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::Driver;
    use crate::fake::FakeDriver;
    use crate::suite::testing::{context, context_with, shared_context, SITE};
    use serde_json::json;

    const OLD: &str = "isaactest@sharklasers.com";
    const NEW: &str = "isaactesttwo@sharklasers.com";

    fn account_page(driver: &FakeDriver, home: &str) {
        driver.link(ACCOUNT_LINK, &format!("{SITE}/account"));
        driver.link(SAVE, home);
        driver.respond(&["el.value = ''"], json!(true));
        driver.respond(
            &["getBoundingClientRect"],
            json!({ "x": 0.0, "y": 0.0, "width": 300.0, "height": 40.0 }),
        );
        driver.respond(
            &["__lastDialog || null"],
            json!("You have edited your email address. Please verify it."),
        );
    }

    #[test]
    fn test_email_change_saves_and_goes_home() {
        let (ctx, driver) = shared_context(|driver| account_page(driver, &format!("{SITE}/#!")));

        assert!(email_change(&ctx).unwrap());

        assert!(driver.typed().contains(&(ACCOUNT_EMAIL.to_string(), NEW.to_string())));
        assert_eq!(driver.clicks().last(), Some(&SAVE.to_string()));
        let armed = driver.scripts().iter().any(|s| s.contains("return true; };"));
        assert!(armed);
        assert!(ctx.artifacts.dir().join("change_email_new_email.png").exists());
    }

    #[test]
    fn test_email_change_must_land_on_homepage() {
        let ctx = context_with(|driver| account_page(driver, &format!("{SITE}/account/error")));
        assert!(!email_change(&ctx).unwrap());
    }

    #[test]
    fn test_email_change_needs_account_page() {
        let ctx = context_with(|driver| {
            driver.respond(&["el.value = ''"], json!(true));
        });
        assert!(!email_change(&ctx).unwrap());
    }

    fn row(subject: &str) -> serde_json::Value {
        json!({ "sender": "no-reply@isaacphysics.org", "subject": subject,
                "excerpt": "Isaac Physics", "time": "11:02:40", "unread": true })
    }

    fn both_inboxes(driver: &FakeDriver) {
        driver.respond(
            &["mail_row", "email-excerpt"],
            json!([row(WARNING_SUBJECT), row("Verify your email")]),
        );
        driver.respond(
            &["getBoundingClientRect"],
            json!({ "x": 0.0, "y": 0.0, "width": 600.0, "height": 400.0 }),
        );
        driver.respond(&["email_body", "innerHTML"], json!("<p>Isaac Physics</p>"));
        driver.respond(&["use-alias", "checked"], json!(false));
        driver.respond(&["el.value = ''"], json!(true));
        driver.respond(&["email-widget", "innerText"], json!(NEW));
        driver.respond(&["Verify your email address", "snapshotLength"], json!(1));
        driver.respond(
            &["Verify your email address", "getAttribute"],
            json!(["https://localhost:8080/isaac-api/verifyemail?token=xyz"]),
        );
    }

    #[test]
    fn test_change_emails_keep_verify_link() {
        let ctx = context_with(|driver| {
            driver.respond(&[NEW, "snapshotLength"], json!(1));
            driver.respond(&[NEW, "getAttribute"], json!([format!("mailto:{NEW}")]));
            both_inboxes(driver);
        });

        assert!(email_change_emails(&ctx).unwrap());
        assert_eq!(
            ctx.temp.verify_link().as_deref(),
            Some("https://staging.isaacphysics.org/verifyemail?token=xyz")
        );
    }

    #[test]
    fn test_warning_must_name_new_address() {
        let ctx = context_with(both_inboxes);
        assert!(!email_change_emails(&ctx).unwrap());
        assert_eq!(ctx.temp.verify_link(), None);
    }

    #[test]
    fn test_no_warning_email_fails() {
        let ctx = context();
        assert!(!email_change_emails(&ctx).unwrap());
    }

    fn login_page(driver: &FakeDriver, refusals: Vec<serde_json::Value>) {
        driver.respond(&["el.value = ''"], json!(true));
        driver.respond(
            &["scope().user"],
            json!({ "_id": 42, "email": OLD, "givenName": "Temp" }),
        );
        driver.respond_seq(&["offsetWidth", "Incorrect credentials"], refusals);
        driver.respond(&["verificationStates.SUCCESS"], json!(true));
    }

    #[test]
    fn test_login_moves_to_new_address_after_verifying() {
        let (ctx, driver) = shared_context(|driver| login_page(driver, vec![json!(true)]));
        ctx.temp
            .set_verify_link(format!("{SITE}/verifyemail?token=xyz"));

        assert!(email_change_login_status(&ctx).unwrap());

        assert_eq!(ctx.temp.email(), NEW);
        assert_eq!(driver.tab_count(), 2);
        let emails: Vec<String> = driver
            .typed()
            .into_iter()
            .filter(|(xpath, _)| xpath.contains("@name='email'"))
            .map(|(_, email)| email)
            .collect();
        assert_eq!(emails, vec![OLD, NEW, OLD, NEW]);
    }

    #[test]
    fn test_old_address_still_working_reverts_credentials() {
        let ctx = context_with(|driver| login_page(driver, vec![json!(true), json!(false)]));
        ctx.temp
            .set_verify_link(format!("{SITE}/verifyemail?token=xyz"));

        assert!(!email_change_login_status(&ctx).unwrap());
        assert_eq!(ctx.temp.email(), OLD);
    }

    #[test]
    fn test_missing_verify_link_fails() {
        let (ctx, driver) = shared_context(|driver| login_page(driver, vec![json!(true)]));

        assert!(!email_change_login_status(&ctx).unwrap());
        assert_eq!(ctx.temp.email(), OLD);
        assert_eq!(driver.tab_count(), 2);
    }
}
