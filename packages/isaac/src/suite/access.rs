use super::{log_out_anyone, MENU_BUTTON};
use crate::browser::BrowserError;
use crate::context::SuiteContext;
use crate::fixtures::Role;
use crate::forms::{self, Login};
use crate::wait;
use anyhow::Result;
use tracing::{error, info};

const UNAUTHORISED: &str = "//h1[text()='Unauthorised']";
pub(super) const GROUPS_LINK: &str = "//a[@ui-sref='groups']";

/// Who may open a members-only page, and how it is reached from the menu.
pub(super) struct PageAccess {
    /// First path segment, as in `/admin`.
    pub page: &'static str,
    /// Logged in, these get the "Unauthorised" page.
    pub denied: &'static [Role],
    pub allowed: &'static [Role],
    pub nav_link: &'static str,
    pub heading: &'static str,
}

const ADMIN_PAGE: PageAccess = PageAccess {
    page: "admin",
    denied: &[Role::Student, Role::Teacher, Role::ContentEditor],
    allowed: &[Role::EventManager, Role::Admin],
    nav_link: "//a[@ui-sref='admin']",
    heading: "//h1[text()='Isaac Administration']",
};

const GROUPS_PAGE: PageAccess = PageAccess {
    page: "groups",
    denied: &[Role::Student],
    allowed: &[
        Role::Teacher,
        Role::ContentEditor,
        Role::EventManager,
        Role::Admin,
    ],
    nav_link: GROUPS_LINK,
    heading: "//h1[text()='Manage Groups']",
};

/// Logs `role` in from the login page, then opens the global nav and
/// follows `link`.
pub(super) fn follow_nav_link(
    ctx: &SuiteContext,
    role: Role,
    link: &str,
) -> Result<(), BrowserError> {
    let driver = ctx.driver();
    ctx.open("/login")?;
    info!("As '{}', try to use global nav.", role);
    Login::user(ctx.users.get(role)).submit(driver, ctx.settings.wait)?;
    ctx.pause();
    driver.click(MENU_BUTTON)?;
    ctx.pause();
    driver.click(link)?;
    ctx.pause();
    Ok(())
}

fn redirected_to_login(url: &str, page: &str) -> bool {
    url.contains(&format!("/login?target=%2F{page}"))
        || url.contains(&format!("/login?target=~2F{page}"))
}

/// Every case is tried even after one fails. Only a denied user that can't
/// log in at all stops the test early.
pub(super) fn check_page_access(ctx: &SuiteContext, access: &PageAccess) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    log_out_anyone(ctx)?;
    let path = format!("/{}", access.page);
    let mut failed = false;

    info!("Test if logged out user can access '{}'.", path);
    ctx.open(&path)?;
    let url = driver.current_url()?;
    if redirected_to_login(&url, access.page) {
        info!("Logged out users can't access the {} page.", access.page);
    } else {
        failed = true;
        let file = ctx.capture_failure(&format!("unexpected_{}_access", access.page));
        info!(
            "Expected '/login?target=%2F{0}' (or '~2F{0}') in URL, found '{1}'!",
            access.page, url
        );
        error!("Logged out user accessed '{}'; see '{}'!", path, file);
    }
    ctx.open("/logout")?;

    for role in access.denied {
        info!("Test if '{}' users can access the {} page.", role, access.page);
        let user = ctx.users.get(*role);
        ctx.open(&path)?;
        Login::user(user).submit(driver, ctx.settings.wait)?;
        ctx.pause();
        if !forms::is_logged_in(driver, Some(user), ctx.settings.wait)? {
            error!("Couldn't log user in to test '{}' access!", path);
            return Ok(false);
        }
        match wait::for_visible(driver, UNAUTHORISED, wait::DEFAULT_TIMEOUT) {
            Ok(()) => info!("User of type '{}' can't access the {} page.", role, access.page),
            Err(e) if e.is_page_problem() => {
                failed = true;
                let file = ctx.capture_failure(&format!("unexpected_{}_access", access.page));
                error!("User of type '{}' accessed '{}'; see '{}'!", role, path, file);
            }
            Err(e) => return Err(e.into()),
        }
        ctx.open("/logout")?;
        info!("Logged out '{}' user.", role);
    }

    for role in access.allowed {
        let reached = follow_nav_link(ctx, *role, access.nav_link)
            .and_then(|()| wait::for_visible(driver, access.heading, wait::DEFAULT_TIMEOUT));
        match reached {
            Ok(()) => info!("'{}' users can access '{}'.", role, path),
            Err(e) if e.is_page_problem() => {
                failed = true;
                info!("{}", e);
                let file = ctx.capture_failure(&format!("no_{}_access", access.page));
                error!("'{}' user can't access '{}'; see '{}'!", role, path, file);
            }
            Err(e) => return Err(e.into()),
        }
        ctx.open("/logout")?;
        info!("Logged out '{}' user.", role);
    }

    if failed {
        return Ok(false);
    }
    pass!("Access to {} page restricted appropriately.", access.page);
    Ok(true)
}

pub fn admin_page_access(ctx: &SuiteContext) -> Result<bool> {
    check_page_access(ctx, &ADMIN_PAGE)
}

pub fn groups_page_access(ctx: &SuiteContext) -> Result<bool> {
    check_page_access(ctx, &GROUPS_PAGE)
}
