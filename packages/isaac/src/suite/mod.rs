//! The scripted regression tests and their dependency table.
//!
//! Every body takes the shared [`SuiteContext`] and returns `Ok(true)` on a
//! pass. Problems with the page under test (a missing element, a wait that
//! ran out, a wrong value) are logged and give `Ok(false)`; anything else
//! coming back from the browser aborts the run.

use crate::browser::BrowserError;
use crate::context::SuiteContext;
use harness::{HarnessError, Registry, TestCase};

/// Unwraps a browser step. A page-level miss logs the message and fails the
/// test; other errors abort it. `@shot name` also captures
/// `ERROR_<name>.png` first.
macro_rules! step {
    (@shot $ctx:expr, $shot:expr; $result:expr, $($msg:tt)+) => {
        match $result {
            Ok(value) => value,
            Err(e) if e.is_page_problem() => {
                tracing::info!("{}", e);
                let file = $ctx.capture_failure($shot);
                tracing::error!($($msg)+);
                tracing::error!("See '{}'!", file);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }
    };
    ($result:expr, $($msg:tt)+) => {
        match $result {
            Ok(value) => value,
            Err(e) if e.is_page_problem() => {
                tracing::info!("{}", e);
                tracing::error!($($msg)+);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }
    };
}

macro_rules! pass {
    ($($msg:tt)+) => {
        tracing::info!(verdict = "PASS", $($msg)+)
    };
}

mod access;
mod admin;
mod auth;
mod email_change;
mod groups;
mod mobile;
mod password_reset;
mod questions;
mod signup;
mod site_checks;
mod verification;

const LOGIN_TAB: &str = "//a[@id='login-tab']";
const MENU_BUTTON: &str = "//button[@ng-click='menuToggle()']";
const TOAST_TITLE: &str = "//div[@class='toast-message']/h4";

fn log_out_anyone(ctx: &SuiteContext) -> Result<(), BrowserError> {
    ctx.open("/logout")?;
    tracing::info!("Logging out any logged in user.");
    Ok(())
}

/// Registers the whole suite in run order.
pub fn register_all(registry: &mut Registry<SuiteContext>) -> Result<(), HarnessError> {
    let cases = [
        TestCase::new("LOGIN", auth::login),
        TestCase::new("QUESTIONNAIRE", auth::questionnaire).depends_on(["LOGIN"]),
        TestCase::new("GLOBAL_NAV", auth::global_nav).depends_on(["LOGIN"]),
        TestCase::new("ACCEPT_COOKIES", auth::accept_cookies).depends_on(["LOGIN"]),
        TestCase::new("USER_CONSISTENCY", auth::user_consistency).depends_on(["LOGIN"]),
        TestCase::new("LOGOUT", auth::logout).depends_on(["LOGIN", "GLOBAL_NAV"]),
        TestCase::new("LOGIN_THROTTLE", auth::login_throttle).depends_on(["LOGIN"]),
        TestCase::new("LOGIN_TIMEOUT", auth::login_timeout).depends_on(["LOGIN_THROTTLE"]),
        TestCase::new("LOGIN_UPPERCASE", auth::login_uppercase).depends_on(["LOGIN"]),
        TestCase::new("SIGNUP", signup::signup)
            .depends_on(["LOGIN", "LOGOUT"])
            .teardown("DELETE_USER"),
        TestCase::new("WELCOME_EMAIL", signup::welcome_email).depends_on(["SIGNUP"]),
        TestCase::new("SIGNUP_UPPERCASE", signup::signup_uppercase)
            .depends_on(["LOGIN", "SIGNUP"]),
        TestCase::new("REQ_VERIFY_EMAILS", verification::request_emails).depends_on(["SIGNUP"]),
        TestCase::new("RECEIVE_VERIFY_EMAILS", verification::receive_emails)
            .depends_on(["REQ_VERIFY_EMAILS"]),
        TestCase::new("VERIFY_LINK", verification::verify_link)
            .depends_on(["RECEIVE_VERIFY_EMAILS"]),
        TestCase::new("VERIFY_BANNER_GONE", verification::banner_gone)
            .depends_on(["VERIFY_LINK"]),
        TestCase::new("PWD_RESET_THROTTLE", password_reset::throttle)
            .depends_on(["LOGIN", "LOGOUT", "SIGNUP"]),
        TestCase::new("RECEIVE_PWD_RESET_EMAILS", password_reset::receive_emails)
            .depends_on(["PWD_RESET_THROTTLE"]),
        TestCase::new("PWD_RESET_LINK", password_reset::reset_link)
            .depends_on(["RECEIVE_PWD_RESET_EMAILS"]),
        TestCase::new("RESET_PWD_LOGIN", password_reset::login_with_new_password)
            .depends_on(["LOGIN", "PWD_RESET_LINK"]),
        TestCase::new("LOGIN_MOBILE", mobile::login).depends_on(["LOGOUT", "ACCEPT_COOKIES"]),
        TestCase::new("LOGOUT_MOBILE", mobile::logout).depends_on(["LOGIN_MOBILE"]),
        TestCase::new("ACCORDION_BEHAVIOUR", questions::accordion_behaviour),
        TestCase::new("NUMERIC_Q_UNITS_SELECT", questions::numeric_units_select)
            .depends_on(["ACCORDION_BEHAVIOUR"]),
        TestCase::new("NUMERIC_Q_HELP_POPUP", questions::numeric_help_popup)
            .depends_on(["ACCORDION_BEHAVIOUR"]),
        TestCase::new("NUMERIC_Q_ALL_CORRECT", questions::numeric_all_correct)
            .depends_on(["NUMERIC_Q_UNITS_SELECT"]),
        TestCase::new("NUMERIC_Q_ANSWER_CHANGE", questions::numeric_answer_change)
            .depends_on(["NUMERIC_Q_UNITS_SELECT", "NUMERIC_Q_ALL_CORRECT"]),
        TestCase::new("NUMERIC_Q_ANSWER_RELOADED", questions::numeric_answer_reloaded)
            .depends_on(["NUMERIC_Q_ALL_CORRECT"]),
        TestCase::new("NUMERIC_Q_INCORRECT_UNIT", questions::numeric_incorrect_unit)
            .depends_on(["NUMERIC_Q_ANSWER_CHANGE"]),
        TestCase::new("NUMERIC_Q_INCORRECT_SF", questions::numeric_incorrect_sf)
            .depends_on(["NUMERIC_Q_ANSWER_CHANGE"]),
        TestCase::new("NUMERIC_Q_INCORRECT_VALUE", questions::numeric_incorrect_value)
            .depends_on(["NUMERIC_Q_ANSWER_CHANGE"]),
        TestCase::new("NUMERIC_Q_UNITS_NONE", questions::numeric_units_none)
            .depends_on(["NUMERIC_Q_ANSWER_CHANGE"]),
        TestCase::new("NUMERIC_Q_ALL_INCORRECT", questions::numeric_all_incorrect)
            .depends_on(["NUMERIC_Q_ANSWER_CHANGE"]),
        TestCase::new("MULTIPLE_CHOICE_QUESTIONS", questions::multiple_choice)
            .depends_on(["ACCORDION_BEHAVIOUR"]),
        TestCase::new("SYMBOLIC_Q_TEXT_ENTRY_CORRECT", questions::symbolic_text_entry_correct),
        TestCase::new("STRING_MATCH_Q_CORRECT", questions::string_match_correct)
            .depends_on(["ACCORDION_BEHAVIOUR"]),
        TestCase::new("HSTS_HEADER", site_checks::hsts_header),
        TestCase::new("ADMIN_PAGE_ACCESS", access::admin_page_access)
            .depends_on(["LOGIN", "LOGOUT"]),
        TestCase::new("ADMIN_USER_SEARCH", admin::user_search),
        TestCase::new("GROUPS_PAGE_ACCESS", access::groups_page_access)
            .depends_on(["LOGIN", "LOGOUT"]),
        TestCase::new("GROUPS_CREATION", groups::groups_creation)
            .depends_on(["LOGIN", "LOGOUT", "GROUPS_PAGE_ACCESS"]),
        TestCase::new("GROUPS_SHARING", groups::groups_sharing)
            .depends_on(["LOGIN", "LOGOUT", "GROUPS_CREATION"]),
        TestCase::new("EMAIL_CHANGE", email_change::email_change)
            .depends_on(["LOGIN", "GLOBAL_NAV", "SIGNUP", "RECEIVE_VERIFY_EMAILS"]),
        TestCase::new("EMAIL_CHANGE_EMAILS", email_change::email_change_emails)
            .depends_on(["EMAIL_CHANGE"]),
        TestCase::new("EMAIL_CHANGE_LOGIN_STATUS", email_change::email_change_login_status)
            .depends_on(["EMAIL_CHANGE_EMAILS"]),
        TestCase::new("DELETE_USER", admin::delete_user).depends_on(["LOGIN", "SIGNUP"]),
    ];
    for case in cases {
        registry.register(case)?;
    }
    Ok(())
}
