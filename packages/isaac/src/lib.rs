//! Browser-driven regression suite for the Isaac Physics website.
//!
//! The [`browser::Driver`] trait is the only way anything here touches the
//! browser. Page helpers, the GuerrillaMail inbox scraper and the scripted
//! tests in [`suite`] are all written against it.

pub mod artifacts;
pub mod browser;
pub mod context;
pub mod fixtures;
pub mod forms;
pub mod mailbox;
pub mod questions;
pub mod site;
pub mod suite;
pub mod tabs;
pub mod wait;

#[cfg(test)]
pub(crate) mod fake;

pub use artifacts::Artifacts;
pub use browser::{BrowserError, ChromeDriver, Driver, LaunchConfig, Rect};
pub use context::{SuiteContext, SuiteSettings};
pub use fixtures::{Role, TempAccount, TestUsers, User};
pub use mailbox::{Email, Inbox};
