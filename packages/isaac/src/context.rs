use crate::artifacts::Artifacts;
use crate::browser::{BrowserError, Driver};
use crate::fixtures::{TempAccount, TestUsers};
use crate::mailbox::Inbox;
use crate::tabs;
use anyhow::{Context, Result};
use std::thread;
use std::time::Duration;
use tracing::info;

const MAILBOX_WELCOME: &str = "Welcome to Guerrilla Mail";

#[derive(Debug, Clone)]
pub struct SuiteSettings {
    pub site_url: String,
    pub mailbox_url: String,
    /// Settle time after page actions.
    pub wait: Duration,
    /// How long the site locks an account out after too many bad logins.
    pub lockout: Duration,
    /// Pause after a graded answer so the next one is not rate limited.
    pub cooldown: Duration,
}

/// Everything a test body gets: the browser, the mailbox, the accounts and
/// where to put artifacts.
pub struct SuiteContext {
    pub driver: Box<dyn Driver>,
    pub inbox: Inbox,
    pub users: TestUsers,
    pub temp: TempAccount,
    pub settings: SuiteSettings,
    pub artifacts: Artifacts,
    pub http: reqwest::blocking::Client,
}

impl SuiteContext {
    /// Opens the site in the first tab and the mailbox in a second one,
    /// points the mailbox at the temporary account and clears out its
    /// welcome message.
    pub fn start(
        driver: Box<dyn Driver>,
        settings: SuiteSettings,
        users: TestUsers,
        temp: TempAccount,
        artifacts: Artifacts,
    ) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("building HTTP client")?;
        let inbox = Inbox::new(settings.mailbox_url.clone());
        let ctx = Self {
            driver,
            inbox,
            users,
            temp,
            settings,
            artifacts,
            http,
        };

        let driver = ctx.driver();
        driver.goto(&ctx.settings.site_url)?;
        info!("Got: {}", ctx.settings.site_url);
        ctx.pause();

        tabs::new_tab(driver)?;
        driver.goto(&ctx.settings.mailbox_url)?;
        info!("Got: {}", ctx.settings.mailbox_url);
        thread::sleep(Duration::from_secs(1));

        let address = ctx
            .inbox
            .set_address(driver, Some(&ctx.temp.email()))
            .context("setting up the mailbox")?;
        ctx.temp.set_email(&address);
        thread::sleep(Duration::from_secs(1));

        let welcome = ctx.inbox.by_subject(driver, MAILBOX_WELCOME, false)?;
        ctx.inbox.delete_all(driver, &welcome)?;
        Ok(ctx)
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    /// `path` appended to the site url.
    pub fn site(&self, path: &str) -> String {
        format!("{}{}", self.settings.site_url.trim_end_matches('/'), path)
    }

    pub fn pause(&self) {
        thread::sleep(self.settings.wait);
    }

    /// Loads `path` on the site in the current tab.
    pub fn open(&self, path: &str) -> Result<(), BrowserError> {
        let url = self.site(path);
        self.driver().goto(&url)?;
        info!("Got: {}", url);
        self.pause();
        Ok(())
    }

    pub fn to_site_tab(&self) -> Result<(), BrowserError> {
        tabs::assert_tab(self.driver(), &self.settings.site_url)
    }

    pub fn to_mailbox_tab(&self) -> Result<(), BrowserError> {
        tabs::assert_tab(self.driver(), &self.settings.mailbox_url)
    }

    /// Screenshot named after `context`; returns the file name.
    pub fn capture_failure(&self, context: &str) -> String {
        self.artifacts.failure(self.driver(), context)
    }
}
