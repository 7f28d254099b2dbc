use super::{log_out_anyone, MENU_BUTTON, TOAST_TITLE};
use crate::context::SuiteContext;
use crate::forms::Login;
use crate::wait;
use anyhow::Result;
use std::thread;
use std::time::Duration;
use tracing::{error, info};

const USER_MANAGER: &str = "//a[@ui-sref='adminUserManager']";
const SEARCH_EMAIL: &str = "//input[@id='user-search-email']";
const FIND_USERS: &str = "//a[@ng-click='findUsers()']";
const NO_RESULTS: &str = "//h3[contains(text(), 'Manage Users ()')]";
const TOAST_BODY: &str = "//div[@class='toast-message']/p";

const SEARCH_BUTTON: &str = "(//button[@ng-click='findUsers()'])[1]";
const FAMILY_NAME: &str = "//input[@id='user-search-familyName']";
const SCHOOL_OTHER: &str = "//select[@id='user-school-other']";
const SCHOOL_URN: &str = "//input[@id='user-school-urn']";
const ROLE_SELECT: &str = "//select[@id='user-search-role']";
const RESULT_ROWS: &str = "//table//tr";
const RESULT_ROLES: &str = "//table//tr/td[5]";
const MANUAL_SCHOOL: &str = "A Manually Entered School";
const EDITOR_URN: &str = "133801";
/// Fewer rows than this from an empty search means the wildcard is broken.
const WILDCARD_MIN: usize = 40;
const ERROR_TOAST_WAIT: Duration = Duration::from_millis(500);

fn delete_button(email: &str) -> String {
    format!("//td[text()='{email}']/..//a[contains(@ng-click, 'deleteUser')]")
}

/// Removes the temporary account as the admin user, then logs out.
///
/// The delete button is pressed twice: the first confirm is declined so the
/// message can be checked, the second is accepted.
pub fn delete_user(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    ctx.pause();
    info!("Attempt to delete temporary user.");
    ctx.open("/login")?;

    Login::user(&ctx.users.admin).submit(driver, ctx.settings.wait)?;
    ctx.pause();
    step!(
        driver.click(MENU_BUTTON),
        "Can't access User Manager from Global Nav; can't continue testing!"
    );
    ctx.pause();
    step!(
        driver.click(USER_MANAGER),
        "Can't access User Manager from Global Nav; can't continue testing!"
    );
    ctx.pause();

    let email = ctx.temp.email();
    step!(
        driver.type_into(SEARCH_EMAIL, &email),
        "Can't find the user search form; can't continue testing!"
    );
    ctx.pause();
    step!(driver.click(FIND_USERS), "Search button did not work; can't continue testing!");
    step!(
        wait::for_invisible(driver, NO_RESULTS, wait::DEFAULT_TIMEOUT),
        "Search button did not work; can't continue testing!"
    );

    let button = delete_button(&email);
    driver.arm_dialogs(false)?;
    step!(
        driver.click(&button),
        "No user matching the email found by search; can't delete the account!"
    );
    thread::sleep(ctx.settings.wait * 2);
    let message = driver.last_dialog()?.unwrap_or_default();
    info!("Alert, with message: '{}'.", message);
    let expected =
        format!("Are you sure you want to delete the account with email address: {email}?");
    if !message.contains(&expected) {
        error!("Alert contained unexpected message '{}'!", message);
        error!("Dismissed the alert, did not accept!");
        return Ok(false);
    }

    driver.arm_dialogs(true)?;
    step!(
        driver.click(&button),
        "Delete button went away before the deletion was confirmed!"
    );
    info!("Accepted the alert.");
    step!(
        wait::for_visible(driver, TOAST_BODY, wait::DEFAULT_TIMEOUT),
        "No deletion confirmation message shown!"
    );
    let toast = step!(
        driver.text(TOAST_BODY),
        "Deletion confirmation message went away before it could be read!"
    );
    info!("Popup said: '{}'.", toast);
    if !toast.contains("successfully deleted") {
        error!("Successful deletion message not shown!");
        return Ok(false);
    }
    ctx.pause();
    info!("User deleted.");

    ctx.open("/logout")?;
    info!("Logging out the admin user.");
    pass!("User '{}' deleted successfully.", email);
    Ok(true)
}

/// One way of narrowing the user search.
#[derive(Debug, Clone, Copy)]
enum Criterion<'a> {
    Text(&'static str, &'a str),
    Select(&'static str, &'a str),
}

/// Searches by `criterion` and expects exactly one row for `email`. The page
/// is refreshed afterwards so the next search starts clean.
fn search_finds(
    ctx: &SuiteContext,
    what: &str,
    criterion: Criterion<'_>,
    email: &str,
) -> Result<bool> {
    let driver = ctx.driver();
    info!("Test search by {}.", what);
    ctx.pause();
    match criterion {
        Criterion::Text(field, value) => step!(
            driver.type_into(field, value),
            "Can't find the {} search box; can't continue testing!",
            what
        ),
        Criterion::Select(field, value) => step!(
            driver.select_value(field, value),
            "Can't choose '{}' to search by {}; can't continue testing!",
            value,
            what
        ),
    }
    ctx.pause();
    step!(driver.click(SEARCH_BUTTON), "Can't find the 'Search' button; can't continue!");
    step!(
        wait::for_invisible(driver, NO_RESULTS, wait::DEFAULT_TIMEOUT),
        "Search button did not work; can't continue testing!"
    );
    let found = driver.count(&format!("//table//tr/td[text()='{email}']"))?;
    if found != 1 {
        error!("Expected 1 result searching by {} for '{}', got '{}'!", what, email, found);
        return Ok(false);
    }
    info!("Search by {} works as expected.", what);
    driver.refresh()?;
    info!("Refresh the page to clear all results.");
    ctx.pause();
    Ok(true)
}

/// Searches the user manager as the admin user by each supported field, then
/// with no criteria at all and finally by role.
pub fn user_search(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    ctx.pause();
    log_out_anyone(ctx)?;
    info!("Test user search page as admin.");
    ctx.open("/admin/usermanager")?;
    if !Login::user(&ctx.users.admin).submit(driver, ctx.settings.wait)? {
        error!("Can't access User Manager; can't continue testing!");
        return Ok(false);
    }
    ctx.pause();

    let users = &ctx.users;
    let searches = [
        (
            "family name",
            Criterion::Text(FAMILY_NAME, &users.student.lastname),
            &users.student.email,
        ),
        (
            "email address",
            Criterion::Text(SEARCH_EMAIL, &users.teacher.email),
            &users.teacher.email,
        ),
        (
            "manually entered school name",
            Criterion::Select(SCHOOL_OTHER, MANUAL_SCHOOL),
            &users.admin.email,
        ),
        ("school URN", Criterion::Text(SCHOOL_URN, EDITOR_URN), &users.editor.email),
    ];
    for (what, criterion, email) in searches {
        if !search_finds(ctx, what, criterion, email)? {
            return Ok(false);
        }
    }

    info!("Test wildcard searches.");
    ctx.pause();
    let mut entered = String::new();
    for field in [FAMILY_NAME, SEARCH_EMAIL, SCHOOL_URN] {
        let value = step!(
            driver.attribute(field, "value"),
            "Can't find search boxes; can't continue testing!"
        );
        entered.push_str(&value.unwrap_or_default());
    }
    if !entered.is_empty() {
        error!("Expected form fields to be blank initially, got '{}'!", entered);
        return Ok(false);
    }
    step!(driver.click(SEARCH_BUTTON), "Can't find the 'Search' button; can't continue!");
    step!(
        @shot ctx, "admin_user_search";
        wait::for_invisible(driver, TOAST_TITLE, ERROR_TOAST_WAIT),
        "Error message unexpectedly shown!"
    );
    ctx.pause();
    let rows = driver.count(RESULT_ROWS)?;
    if rows <= WILDCARD_MIN {
        error!("Expected at least {} users, got '{}'!", WILDCARD_MIN, rows);
        return Ok(false);
    }
    info!("Wildcard search works as expected.");
    driver.refresh()?;
    info!("Refresh the page to clear all results.");
    ctx.pause();

    info!("Test search by user role.");
    step!(
        driver.select_value(ROLE_SELECT, "STUDENT"),
        "Can't find search boxes; can't continue testing!"
    );
    step!(driver.click(SEARCH_BUTTON), "Can't find the 'Search' button; can't continue!");
    step!(
        @shot ctx, "admin_user_search";
        wait::for_invisible(driver, TOAST_TITLE, ERROR_TOAST_WAIT),
        "Error message unexpectedly shown!"
    );
    ctx.pause();
    if let Some(role) = driver.texts(RESULT_ROLES)?.iter().find(|r| r.trim() != "STUDENT") {
        error!("Unexpected role '{}' in results for type 'STUDENT'; can't continue!", role);
        return Ok(false);
    }
    info!("Search by role works as expected.");
    driver.refresh()?;
    info!("Refresh the page to clear all results.");
    ctx.pause();

    pass!("Search page functionality as expected.");
    Ok(true)
}
