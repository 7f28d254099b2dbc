//! Isaac page helpers shared by the scripted tests.

use crate::browser::{BrowserError, Driver};
use crate::fixtures::User;
use crate::wait;
use serde::Deserialize;
use std::thread;
use std::time::Duration;
use tracing::{error, info, warn};

const POPUP_CLOSE: &str = "//a[@class='close-reveal-modal']";
const VERIFY_SNOOZE: &str =
    "//div[@data-alert]/div[contains(@ng-if, 'emailVerificationStatus')]/div[3]/a";
const POPUP_STORAGE_KEY: &str = "lastNotificationTime";
const ONE_MONTH_MS: i64 = 2_592_000_000;
const MOBILE_SIZE: (u32, u32) = (360, 640);
const API_PREFIX: &str = "https://localhost:8080/isaac-api";

/// A page-level miss becomes `Ok(false)` after logging `message`; anything
/// else is passed on.
fn or_false(result: Result<bool, BrowserError>, message: &str) -> Result<bool, BrowserError> {
    match result {
        Err(e) if e.is_page_problem() => {
            error!("{}", message);
            Ok(false)
        }
        other => other,
    }
}

/// The login form on the current page.
///
/// Desktop pages carry two copies of the form; the second is the visible
/// one. The mobile layout only has the first.
#[derive(Clone, Copy)]
pub struct Login<'a> {
    email: &'a str,
    password: &'a str,
    mobile: bool,
    keep_popup: bool,
}

impl<'a> Login<'a> {
    pub fn new(email: &'a str, password: &'a str) -> Self {
        Self {
            email,
            password,
            mobile: false,
            keep_popup: false,
        }
    }

    pub fn user(user: &'a User) -> Self {
        Self::new(&user.email, &user.password)
    }

    pub fn mobile(mut self) -> Self {
        self.mobile = true;
        self
    }

    /// Leave the questionnaire popup enabled after logging in.
    pub fn keep_popup(mut self) -> Self {
        self.keep_popup = true;
        self
    }

    fn index(&self) -> usize {
        if self.mobile {
            1
        } else {
            2
        }
    }

    /// Fills in and submits the form. `Ok(false)` if there is no form.
    pub fn submit(self, driver: &dyn Driver, wait: Duration) -> Result<bool, BrowserError> {
        let i = self.index();
        let filled = (|| -> Result<bool, BrowserError> {
            driver.fill(&format!("(//input[@name='email'])[{i}]"), self.email)?;
            driver.fill(&format!("(//input[@name='password'])[{i}]"), self.password)?;
            driver.click(&format!("(//input[@value='Log in'])[{i}]"))?;
            Ok(true)
        })();
        if !or_false(filled, "No login form to fill out!")? {
            return Ok(false);
        }
        info!("Submitted login form for '{}'.", self.email);
        thread::sleep(wait);
        if !self.keep_popup {
            disable_popup(driver, false)?;
        }
        Ok(true)
    }
}

/// Registers `user` from the login page: the first form leads on to the
/// registration form, which is then completed. With `suppress`, failure is
/// expected and not reported as an error.
pub fn sign_up(
    driver: &dyn Driver,
    user: &User,
    wait: Duration,
    suppress: bool,
) -> Result<bool, BrowserError> {
    let first = (|| -> Result<bool, BrowserError> {
        driver.fill("(//input[@name='email'])[2]", &user.email)?;
        driver.fill("(//input[@name='password'])[2]", &user.password)?;
        driver.click("(//a[@ui-sref='register'])[2]")?;
        Ok(true)
    })();
    if or_false(first, "No login/signup form to fill out!")? {
        thread::sleep(wait);
        info!("Filled out login form to click Register.");
    }

    let start_url = driver.current_url()?;
    let second = (|| -> Result<bool, BrowserError> {
        driver.fill("//input[@id='account-firstname']", &user.firstname)?;
        driver.fill("//input[@id='account-lastname']", &user.lastname)?;
        driver.fill("//input[@id='account-password2']", &user.password)?;
        driver.click("//input[@value='Register Now']")?;
        Ok(true)
    })();
    match second {
        Ok(_) => {}
        Err(e) if e.is_page_problem() => {
            if !suppress {
                error!("Can't fill out signup form for '{}'!", user.email);
            }
            return Ok(false);
        }
        Err(e) => return Err(e),
    }
    thread::sleep(wait);

    let new_url = driver.current_url()?;
    if new_url == start_url {
        if !suppress {
            info!("Was on '{}', now still '{}'.", start_url, new_url);
            error!("Submitting signup form failed for '{}'!", user.email);
        }
        return Ok(false);
    }
    info!("Registration form successfully submitted for '{}'.", user.email);
    Ok(true)
}

#[derive(Debug, Default, Deserialize)]
struct SessionUser {
    #[serde(rename = "_id")]
    id: Option<serde_json::Value>,
    email: Option<String>,
    #[serde(rename = "givenName")]
    given_name: Option<String>,
}

fn session_user(driver: &dyn Driver) -> Result<SessionUser, BrowserError> {
    let value = driver.execute(
        "try { var u = angular.element('head').scope().user; \
         return u ? { _id: u._id || null, email: u.email || null, givenName: u.givenName || null } : null; } \
         catch (e) { return null; }",
    )?;
    if value.is_null() {
        return Ok(SessionUser::default());
    }
    serde_json::from_value(value).map_err(|e| BrowserError::Script(e.to_string()))
}

/// Whether the page's session belongs to `user`, or to anyone when `user`
/// is `None`.
pub fn is_logged_in(
    driver: &dyn Driver,
    user: Option<&User>,
    wait: Duration,
) -> Result<bool, BrowserError> {
    thread::sleep(wait);
    let session = session_user(driver)?;
    let (Some(email), Some(given_name)) = (session.email, session.given_name) else {
        info!("AssertLoggedIn: No user is logged in!");
        return Ok(false);
    };
    match user {
        None => {
            info!("AssertLoggedIn: A user is logged in.");
            Ok(true)
        }
        Some(user) if email == user.email && given_name == user.firstname => {
            info!("AssertLoggedIn: The user '{}' is logged in.", user.firstname);
            Ok(true)
        }
        Some(user) => {
            info!("AssertLoggedIn: The user '{}' is not logged in!", user.firstname);
            info!(
                "AssertLoggedIn: A user '{}' ({}) may be logged in.",
                given_name, email
            );
            Ok(false)
        }
    }
}

pub fn is_logged_out(driver: &dyn Driver, wait: Duration) -> Result<bool, BrowserError> {
    thread::sleep(wait);
    match session_user(driver)?.id {
        None => {
            info!("AssertLoggedOut: All users are logged out.");
            Ok(true)
        }
        Some(id) => {
            error!("AssertLoggedOut: A user ({}) is still logged in!", id);
            Ok(false)
        }
    }
}

/// Stops the questionnaire popup for this session by pretending it was last
/// shown a month from now. `undo` pretends it was last shown in 1970.
pub fn disable_popup(driver: &dyn Driver, undo: bool) -> Result<(), BrowserError> {
    let shown_at = if undo {
        0
    } else {
        chrono::Utc::now().timestamp_millis() + ONE_MONTH_MS
    };
    driver.set_local_storage(POPUP_STORAGE_KEY, &shown_at.to_string())?;
    thread::sleep(Duration::from_secs(2));
    Ok(())
}

/// Waits up to `timeout` for the questionnaire popup and closes it.
pub fn kill_popup(driver: &dyn Driver, timeout: Duration) -> Result<bool, BrowserError> {
    match wait::for_visible(driver, POPUP_CLOSE, timeout) {
        Ok(()) => {}
        Err(BrowserError::Timeout { .. }) => return Ok(false),
        Err(e) => return Err(e),
    }
    driver.click(POPUP_CLOSE)?;
    thread::sleep(Duration::from_secs(1));
    info!("Popup Closed!");
    Ok(true)
}

/// Snoozes the email verification banner, which covers the menu on small
/// screens. True if the banner is gone afterwards or was never there.
pub fn snooze_email_verification(driver: &dyn Driver) -> Result<bool, BrowserError> {
    match wait::for_visible(driver, VERIFY_SNOOZE, Duration::from_secs(5)) {
        Ok(()) => {}
        Err(BrowserError::Timeout { .. }) => return Ok(true),
        Err(e) => return Err(e),
    }
    info!("Snoozing email verification warning. (It obstructs menu on mobile).");
    driver.click(VERIFY_SNOOZE)?;
    match wait::for_invisible(driver, VERIFY_SNOOZE, wait::DEFAULT_TIMEOUT) {
        Ok(()) => Ok(true),
        Err(BrowserError::Timeout { .. }) => {
            error!("Email verification snooze button doesn't work!");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Shrinks the window to phone size for as long as it is alive.
pub struct MobileView<'a> {
    driver: &'a dyn Driver,
    previous: (u32, u32),
}

impl<'a> MobileView<'a> {
    pub fn enter(driver: &'a dyn Driver) -> Result<Self, BrowserError> {
        let previous = driver.window_size()?;
        driver.set_window_size(MOBILE_SIZE.0, MOBILE_SIZE.1)?;
        driver.refresh()?;
        info!("Resized window to mobile size.");
        Ok(Self { driver, previous })
    }
}

impl Drop for MobileView<'_> {
    fn drop(&mut self) {
        let (width, height) = self.previous;
        let restored = self
            .driver
            .set_window_size(width, height)
            .and_then(|()| self.driver.refresh());
        match restored {
            Ok(()) => info!("Restored window dimensions."),
            Err(e) => warn!("Could not restore window dimensions: {}", e),
        }
    }
}

/// Emailed links point at the API's internal address; map them onto the
/// site under test.
pub fn rewrite_api_link(link: &str, site_url: &str) -> String {
    link.replace(API_PREFIX, site_url)
}
