use crate::context::SuiteContext;
use crate::forms::rewrite_api_link;
use crate::{tabs, wait};
use anyhow::Result;
use std::thread;
use tracing::{error, info};

const REQUEST_LINK: &str = "//a[@ng-click='requestEmailVerification()']";
const REQUEST_TOAST: &str = "//div[@class='toast-message']/h4[@class='ng-binding']";
pub(super) const VERIFIED: &str = "//h2[@ng-if='verificationState==verificationStates.SUCCESS']";
pub(super) const SUBJECT: &str = "Verify your email";
pub(super) const LINK_TEXT: &str = "Verify your email address";
/// Requests allowed before the site starts refusing them.
const REQUEST_LIMIT: usize = 4;

/// Requests one verification email more than allowed. All but the last
/// should report success.
pub fn request_emails(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    ctx.pause();
    if driver.count(REQUEST_LINK)? == 0 {
        error!(
            "Can't access verification request link in banner; can't continue! Are we logged in?"
        );
        return Ok(false);
    }

    for attempt in 0..=REQUEST_LIMIT {
        info!("Clicking request email verification link.");
        step!(driver.click(REQUEST_LINK), "Verification request link went away!");
        step!(
            wait::for_visible(driver, REQUEST_TOAST, wait::DEFAULT_TIMEOUT),
            "Verification Popup didn't appear!"
        );
        let message = step!(
            driver.text(REQUEST_TOAST),
            "Verification Popup closed before it could be read!"
        );
        let shot = format!("email_verification_request_popup_{attempt}");
        ctx.artifacts.screenshot(driver, &shot)?;
        step!(
            wait::for_invisible(driver, REQUEST_TOAST, wait::DEFAULT_TIMEOUT),
            "Verification Popup didn't close; see '{}.png'!",
            shot
        );
        // The next toast only shows once this one has fully cleared.
        thread::sleep(ctx.settings.wait * 6);

        let message = message.trim();
        if attempt < REQUEST_LIMIT {
            if message != "Email verification request succeeded." {
                error!("Popup text was: '{}'!", message);
                error!("Success text not shown on request {}!", attempt + 1);
                return Ok(false);
            }
            info!("Success message shown.");
        } else if message != "Email verification request failed." {
            error!("Popup text was: '{}'!", message);
            error!("Warning not shown after {} requests!", attempt);
            return Ok(false);
        }
    }
    info!("Error message shown as expected.");
    pass!(
        "Email verification link shows warning on request {}, success on others.",
        REQUEST_LIMIT + 1
    );
    Ok(true)
}

pub fn receive_emails(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_mailbox_tab()?;
    let driver = ctx.driver();
    ctx.inbox
        .wait_for_email(driver, ctx.settings.wait, REQUEST_LIMIT)?;

    info!("Checking if verification emails received.");
    let emails = ctx.inbox.by_subject(driver, SUBJECT, false)?;
    if emails.len() != REQUEST_LIMIT {
        let file = ctx.capture_failure("receive_verification");
        error!(
            "Expected {} verification emails, received {}. See '{}'!",
            REQUEST_LIMIT,
            emails.len(),
            file
        );
        return Ok(false);
    }
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
    pass!("{} verification emails received.", emails.len());
    Ok(true)
}

/// Follows the link in the newest verification email in a new tab.
pub fn verify_link(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_mailbox_tab()?;
    let driver = ctx.driver();
    info!("About to check latest verification link works.");
    let Some(email) = ctx.inbox.by_subject(driver, SUBJECT, false)?.into_iter().next() else {
        error!("No verification emails received! Can't continue.");
        return Ok(false);
    };
    step!(
        ctx.inbox.view(driver, &email, true),
        "Can't open the verification email!"
    );
    info!("Selecting most recent email '{}'.", email);
    ctx.pause();
    let link = ctx.inbox.body_link(driver, LINK_TEXT)?;
    ctx.inbox.close(driver)?;
    ctx.pause();
    let Some(link) = link else {
        error!("Can't access verification link in email; can't continue!");
        return Ok(false);
    };
    let url = rewrite_api_link(&link, &ctx.settings.site_url);

    tabs::new_tab(driver)?;
    info!("Opening verification link from email in new tab.");
    driver.goto(&url)?;
    tabs::assert_tab(driver, &ctx.site("/verifyemail"))?;
    info!("Verification URL: '{}'.", driver.current_url()?);
    let verified = match wait::for_visible(driver, VERIFIED, wait::DEFAULT_TIMEOUT) {
        Ok(()) => true,
        Err(e) if e.is_page_problem() => {
            let file = ctx.capture_failure("verification_status");
            error!("Verification Failed; see '{}'!", file);
            false
        }
        Err(e) => return Err(e.into()),
    };
    tabs::close_tab(driver)?;
    ctx.pause();
    if !verified {
        return Ok(false);
    }
    pass!("Email address verified successfully.");
    Ok(true)
}

pub fn banner_gone(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    driver.refresh()?;
    ctx.pause();
    info!("Checking if verification banner now gone.");
    step!(
        wait::for_invisible(driver, REQUEST_LINK, wait::DEFAULT_TIMEOUT),
        "Verification banner still present after email verified!"
    );
    pass!("Verification banner gone after verifying email.");
    Ok(true)
}
