use super::access::{follow_nav_link, GROUPS_LINK};
use super::log_out_anyone;
use crate::context::SuiteContext;
use crate::fixtures::Role;
use crate::wait;
use anyhow::Result;
use tracing::{error, info};

const GROUP_NAME: &str = "//div[@class='panel ng-scope']//input[@ng-model='newGroup.groupName']";
const SAVE_GROUP: &str =
    "(//div[@class='panel ng-scope']//a[contains(@ng-click, 'saveGroup(selectedGroup != null)')])";
const MODAL_CLOSE: &str = "//div[@id='isaacModal']//*[contains(@class, 'close-reveal-modal')]";
const GROUP_HEADER: &str = "//*[contains(@class, 'group-nav-header')]";
const ACCESS_TOKEN: &str = "//*[contains(@class, 'access-token')]";
const NEW_GROUP: &str = "testGroup";

/// Every role that may own a group.
const OWNERS: [Role; 4] = [
    Role::Teacher,
    Role::ContentEditor,
    Role::EventManager,
    Role::Admin,
];

pub fn groups_creation(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    log_out_anyone(ctx)?;

    for role in OWNERS {
        step!(
            follow_nav_link(ctx, role, GROUPS_LINK),
            "Can't reach the groups page as {}; can't continue!",
            role
        );
        step!(
            driver.fill(GROUP_NAME, NEW_GROUP),
            "Can't create the group '{}' for {}; can't continue!",
            NEW_GROUP,
            role
        );
        info!("Entered '{}' as the group name.", NEW_GROUP);
        ctx.pause();
        step!(
            driver.click(SAVE_GROUP),
            "Can't create the group '{}' for {}; can't continue!",
            NEW_GROUP,
            role
        );
        ctx.pause();
        step!(
            @shot ctx, "group_created_modal";
            wait::for_visible(driver, MODAL_CLOSE, wait::DEFAULT_TIMEOUT)
                .and_then(|()| driver.click(MODAL_CLOSE)),
            "Group created modal didn't show for {}!",
            role
        );
        ctx.pause();
        info!("Created group named '{}' for {}.", NEW_GROUP, role);
        ctx.open("/logout")?;
        info!("Logged out '{}' user.", role);
    }

    pass!("Creating the group '{}' works for expected types.", NEW_GROUP);
    Ok(true)
}

/// Opens the first group of each owner and reveals its joining token.
pub fn groups_sharing(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    log_out_anyone(ctx)?;

    for role in OWNERS {
        step!(
            follow_nav_link(ctx, role, GROUPS_LINK),
            "Can't reach the groups page as {}; can't continue!",
            role
        );
        let shown = driver
            .click(GROUP_HEADER)
            .and_then(|()| driver.click(ACCESS_TOKEN));
        match shown {
            Ok(()) => info!("Showed the group token for {}.", role),
            Err(e) if e.is_page_problem() => {
                info!("{}", e);
                let file = ctx.capture_failure("group_token");
                error!("Can't show a group token for {}; see '{}'!", role, file);
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        }
        ctx.pause();
        ctx.open("/logout")?;
        info!("Logged out '{}' user.", role);
    }

    pass!("Sharing the group '{}' works.", NEW_GROUP);
    Ok(true)
}
