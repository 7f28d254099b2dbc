//! Page object for the GuerrillaMail web inbox.
//!
//! Rows are scraped on every call; nothing is cached between calls. An
//! [`Email`] refers to its row by position, so it is only valid until the
//! inbox changes (a delete or a newly arrived message).

use crate::artifacts::{safe_name, Artifacts};
use crate::browser::{BrowserError, Driver};
use crate::wait;
use anyhow::{bail, Context};
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

const MAIL_ROWS: &str = "//tr[contains(@class, 'mail_row')]";
const ALIAS_CHECKBOX: &str = "//input[@id='use-alias']";
const INBOX_ID: &str = "//span[@id='inbox-id']";
const INBOX_ID_INPUT: &str = "//span[@id='inbox-id']/input[@type='text']";
const INBOX_ID_SET: &str = "//span[@id='inbox-id']/button[text()='Set']";
const ADDRESS_WIDGET: &str = "//*[@id='email-widget']";
const DELETE_BUTTON: &str = "//*[@id='del_button']";
const BACK_TO_INBOX: &str = "//*[@id='back_to_inbox_link']";
const DISPLAY_IMAGES: &str = "//*[@id='display_images']";
const EMAIL_PANE: &str = "//div[@class='email']";
const EMAIL_BODY: &str = "//div[@class='email_body']";

const SCRAPE_ROWS: &str = r#"
var rows = document.evaluate("//tr[contains(@class, 'mail_row')]", document, null,
    XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
var out = [];
for (var i = 0; i < rows.snapshotLength; i++) {
    var row = rows.snapshotItem(i);
    var cell = function (cls) { var c = row.querySelector('td.' + cls); return c ? c.innerText : ''; };
    var excerpt = row.querySelector('td.td3 span.email-excerpt');
    var excerptText = excerpt ? excerpt.innerText : '';
    out.push({
        sender: cell('td2'),
        subject: cell('td3').replace(excerptText, ''),
        excerpt: excerptText,
        time: cell('td4'),
        unread: row.classList.contains('email_unread')
    });
}
return out;
"#;

#[derive(Debug, Deserialize)]
struct ScrapedRow {
    sender: String,
    subject: String,
    excerpt: String,
    time: String,
    unread: bool,
}

/// One inbox row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    /// 1-based position in the inbox table.
    pub row: usize,
    pub sender: String,
    pub subject: String,
    pub excerpt: String,
    pub time: String,
    pub unread: bool,
}

impl Email {
    fn xpath(&self) -> String {
        format!("({})[{}]", MAIL_ROWS, self.row)
    }

    /// `<subject>_<time>` made safe for use as a file name.
    pub fn file_stem(&self) -> String {
        safe_name(&format!("{}_{}", self.subject, self.time))
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Email from '{}' at '{}'>", self.sender, self.time)
    }
}

pub struct Inbox {
    url: String,
    pause: Duration,
    refresh: Duration,
}

impl Inbox {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pause: Duration::from_secs(1),
            refresh: Duration::from_secs(10),
        }
    }

    /// `pause` is the settle time after clicks; `refresh` is how often the
    /// mailbox page pulls new mail.
    pub fn with_timing(mut self, pause: Duration, refresh: Duration) -> Self {
        self.pause = pause;
        self.refresh = refresh;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Turns off the scrambled alias and, given `address`, switches the
    /// inbox to its local part. Returns the address the mailbox now shows.
    pub fn set_address(
        &self,
        driver: &dyn Driver,
        address: Option<&str>,
    ) -> anyhow::Result<String> {
        if driver.is_selected(ALIAS_CHECKBOX)? {
            driver.click(ALIAS_CHECKBOX)?;
        }
        let Some(address) = address else {
            let shown = driver.text(ADDRESS_WIDGET)?.trim().to_string();
            info!("Set GuerrillaMail email address to {}", shown);
            return Ok(shown);
        };

        let local_part = address.split('@').next().unwrap_or(address);
        driver.click(INBOX_ID)?;
        driver
            .fill(INBOX_ID_INPUT, local_part)
            .context("mailbox address field")?;
        driver.click(INBOX_ID_SET)?;
        thread::sleep(self.pause);

        let shown = driver.text(ADDRESS_WIDGET)?.trim().to_string();
        if shown != address {
            bail!("Failed to change GuerrillaMail email address! Mailbox shows '{shown}'.");
        }
        info!("Set GuerrillaMail email address to {}", shown);
        Ok(shown)
    }

    pub fn emails(&self, driver: &dyn Driver) -> Result<Vec<Email>, BrowserError> {
        let value = driver.execute(SCRAPE_ROWS)?;
        let rows: Vec<ScrapedRow> = match value {
            serde_json::Value::Null => Vec::new(),
            value => serde_json::from_value(value)
                .map_err(|e| BrowserError::Script(format!("inbox rows: {e}")))?,
        };
        Ok(rows
            .into_iter()
            .enumerate()
            .map(|(i, row)| Email {
                row: i + 1,
                sender: row.sender.trim().to_string(),
                subject: row.subject.trim().to_string(),
                excerpt: row.excerpt.trim().to_string(),
                time: row.time.trim().to_string(),
                unread: row.unread,
            })
            .collect())
    }

    pub fn unread(&self, driver: &dyn Driver) -> Result<Vec<Email>, BrowserError> {
        Ok(self
            .emails(driver)?
            .into_iter()
            .filter(|email| email.unread)
            .collect())
    }

    /// Emails whose subject contains `subject`.
    pub fn by_subject(
        &self,
        driver: &dyn Driver,
        subject: &str,
        unread_only: bool,
    ) -> Result<Vec<Email>, BrowserError> {
        Ok(self
            .emails(driver)?
            .into_iter()
            .filter(|email| !unread_only || email.unread)
            .filter(|email| email.subject.contains(subject))
            .collect())
    }

    pub fn by_time(
        &self,
        driver: &dyn Driver,
        timestamp: &str,
    ) -> Result<Vec<Email>, BrowserError> {
        Ok(self
            .emails(driver)?
            .into_iter()
            .filter(|email| email.time == timestamp)
            .collect())
    }

    /// Waits until at least `expected` unread emails are listed, giving up
    /// after ten rounds. Returns the last unread count seen.
    pub fn wait_for_email(
        &self,
        driver: &dyn Driver,
        wait: Duration,
        expected: usize,
    ) -> Result<usize, BrowserError> {
        let mut unread = 0;
        for round in 0..10 {
            unread = self.unread(driver)?.len();
            if unread >= expected {
                info!("GuerrillaMail: {} unread emails.", unread);
                return Ok(unread);
            }
            info!(
                "GuerrillaMail: {} of {} emails so far, waiting (round {}).",
                unread,
                expected,
                round + 1
            );
            thread::sleep(wait + self.refresh);
        }
        warn!(
            "GuerrillaMail: gave up waiting with {} of {} emails.",
            unread, expected
        );
        Ok(unread)
    }

    pub fn delete(&self, driver: &dyn Driver, email: &Email) -> Result<(), BrowserError> {
        self.delete_all(driver, std::slice::from_ref(email))
    }

    /// Ticks every row in `emails` and deletes them with a single press of
    /// the delete button. All of `emails` must come from the same scrape:
    /// rows move up after a delete.
    pub fn delete_all(&self, driver: &dyn Driver, emails: &[Email]) -> Result<(), BrowserError> {
        if emails.is_empty() {
            return Ok(());
        }
        self.close(driver)?;
        for email in emails {
            info!("Deleting {}.", email);
            let tickbox = format!("{}/td[@class='td1']/input", email.xpath());
            if !driver.is_selected(&tickbox)? {
                driver.click(&tickbox)?;
            }
        }
        thread::sleep(self.pause / 2);
        driver.click(DELETE_BUTTON)?;
        thread::sleep(self.pause);
        Ok(())
    }

    /// Opens the email. With `images`, remote images are loaded and the
    /// message pane is stretched to fit the body for screenshots.
    pub fn view(
        &self,
        driver: &dyn Driver,
        email: &Email,
        images: bool,
    ) -> Result<(), BrowserError> {
        info!("Viewing {}", email);
        driver.click(&format!("{}/td[@class='td2']", email.xpath()))?;
        thread::sleep(self.pause);
        if images {
            driver.click(DISPLAY_IMAGES)?;
            let body = driver.bounding_box(EMAIL_BODY)?;
            let height = body.height.round() as u64 + 125;
            driver.execute(&format!(
                "document.getElementsByClassName('email')[0].style.height = '{height}px'; return true;"
            ))?;
            thread::sleep(self.pause);
        }
        Ok(())
    }

    /// Back to the inbox list. Does nothing if no email is open.
    pub fn close(&self, driver: &dyn Driver) -> Result<(), BrowserError> {
        if driver.is_displayed(BACK_TO_INBOX)? {
            info!("Closing open email.");
            driver.click(BACK_TO_INBOX)?;
            thread::sleep(self.pause);
        }
        Ok(())
    }

    /// `href` of the first link in the open email whose text is `text`.
    pub fn body_link(
        &self,
        driver: &dyn Driver,
        text: &str,
    ) -> Result<Option<String>, BrowserError> {
        let xpath = format!("{EMAIL_BODY}//a[text()='{text}']");
        if let Err(e) = wait::for_present(driver, &xpath, self.pause) {
            warn!("No '{}' link in the open email: {}", text, e);
            return Ok(None);
        }
        driver.attribute(&xpath, "href")
    }

    pub fn image(
        &self,
        driver: &dyn Driver,
        artifacts: &Artifacts,
        email: &Email,
    ) -> Result<PathBuf, BrowserError> {
        info!("Imaging {}.", email);
        self.view(driver, email, true)?;
        let path = artifacts.screenshot_element(driver, &email.file_stem(), EMAIL_PANE)?;
        self.close(driver)?;
        Ok(path)
    }

    pub fn save_html_body(
        &self,
        driver: &dyn Driver,
        artifacts: &Artifacts,
        email: &Email,
    ) -> Result<PathBuf, BrowserError> {
        info!("Saving HTML of {}.", email);
        self.view(driver, email, true)?;
        let html = driver.inner_html(EMAIL_BODY)?;
        let path = artifacts.save_html(&email.file_stem(), &html)?;
        self.close(driver)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeDriver;
    use serde_json::json;

    fn inbox() -> Inbox {
        Inbox::new("https://www.guerrillamail.com").with_timing(Duration::ZERO, Duration::ZERO)
    }

    fn rows() -> serde_json::Value {
        json!([
            { "sender": " no-reply@isaacphysics.org ", "subject": " Password Reset Request ",
              "excerpt": "Hello Temp", "time": "10:42:01", "unread": true },
            { "sender": "no-reply@isaacphysics.org", "subject": "Verify your email",
              "excerpt": "Please verify", "time": "10:40:12", "unread": true },
            { "sender": "no-reply@isaacphysics.org", "subject": "Welcome to Isaac Physics!",
              "excerpt": "Welcome", "time": "10:31:55", "unread": false },
            { "sender": "no-reply@guerrillamail.com", "subject": "Welcome to Guerrilla Mail",
              "excerpt": "Dear Random User", "time": "10:30:00", "unread": false }
        ])
    }

    fn driver_with_rows() -> FakeDriver {
        let driver = FakeDriver::new();
        driver.respond(&["mail_row", "email-excerpt"], rows());
        driver
    }

    #[test]
    fn test_emails_are_trimmed_and_numbered() {
        let driver = driver_with_rows();
        let emails = inbox().emails(&driver).unwrap();
        assert_eq!(emails.len(), 4);
        assert_eq!(emails[0].row, 1);
        assert_eq!(emails[0].sender, "no-reply@isaacphysics.org");
        assert_eq!(emails[0].subject, "Password Reset Request");
        assert_eq!(emails[3].row, 4);
    }

    #[test]
    fn test_empty_inbox() {
        let driver = FakeDriver::new();
        assert!(inbox().emails(&driver).unwrap().is_empty());
    }

    #[test]
    fn test_filters() {
        let driver = driver_with_rows();
        let inbox = inbox();

        assert_eq!(inbox.unread(&driver).unwrap().len(), 2);
        assert_eq!(inbox.by_subject(&driver, "Welcome", false).unwrap().len(), 2);
        assert!(inbox.by_subject(&driver, "Welcome", true).unwrap().is_empty());

        let verify = inbox.by_subject(&driver, "Verify your email", true).unwrap();
        assert_eq!(verify.len(), 1);
        assert_eq!(verify[0].row, 2);

        let at = inbox.by_time(&driver, "10:31:55").unwrap();
        assert_eq!(at.len(), 1);
        assert_eq!(at[0].subject, "Welcome to Isaac Physics!");
        assert!(inbox.by_time(&driver, "10:31").unwrap().is_empty());
    }

    #[test]
    fn test_wait_for_email_returns_once_enough_arrive() {
        let driver = FakeDriver::new();
        driver.respond_seq(
            &["mail_row", "email-excerpt"],
            vec![json!([]), rows()],
        );
        let unread = inbox()
            .wait_for_email(&driver, Duration::ZERO, 2)
            .unwrap();
        assert_eq!(unread, 2);
    }

    #[test]
    fn test_wait_for_email_gives_up_with_count() {
        let driver = driver_with_rows();
        let unread = inbox()
            .wait_for_email(&driver, Duration::ZERO, 4)
            .unwrap();
        assert_eq!(unread, 2);
    }

    #[test]
    fn test_delete_ticks_row_then_deletes() {
        let driver = driver_with_rows();
        driver.respond(&["td1", "checked"], json!(false));
        let inbox = inbox();
        let welcome = inbox
            .by_subject(&driver, "Welcome to Guerrilla Mail", false)
            .unwrap()
            .remove(0);

        inbox.delete(&driver, &welcome).unwrap();

        assert_eq!(
            driver.clicks(),
            vec![
                "(//tr[contains(@class, 'mail_row')])[4]/td[@class='td1']/input".to_string(),
                DELETE_BUTTON.to_string(),
            ]
        );
    }

    #[test]
    fn test_delete_all_ticks_every_match_before_one_delete() {
        let driver = FakeDriver::new();
        driver.respond(
            &["mail_row", "email-excerpt"],
            json!([
                { "sender": "no-reply@guerrillamail.com", "subject": "Welcome to Guerrilla Mail",
                  "excerpt": "", "time": "10:30:00", "unread": true },
                { "sender": "no-reply@guerrillamail.com", "subject": "Welcome to Guerrilla Mail",
                  "excerpt": "", "time": "10:30:01", "unread": true },
                { "sender": "no-reply@isaacphysics.org", "subject": "Keep me",
                  "excerpt": "", "time": "10:31:00", "unread": true }
            ]),
        );
        driver.respond(&["td1", "checked"], json!(false));
        let inbox = inbox();
        let welcome = inbox
            .by_subject(&driver, "Welcome to Guerrilla Mail", false)
            .unwrap();

        inbox.delete_all(&driver, &welcome).unwrap();

        assert_eq!(
            driver.clicks(),
            vec![
                "(//tr[contains(@class, 'mail_row')])[1]/td[@class='td1']/input".to_string(),
                "(//tr[contains(@class, 'mail_row')])[2]/td[@class='td1']/input".to_string(),
                DELETE_BUTTON.to_string(),
            ]
        );
    }

    #[test]
    fn test_delete_all_of_nothing_clicks_nothing() {
        let driver = FakeDriver::new();
        inbox().delete_all(&driver, &[]).unwrap();
        assert!(driver.clicks().is_empty());
    }

    #[test]
    fn test_set_address_checks_widget() {
        let driver = FakeDriver::new();
        driver.respond(&["use-alias", "checked"], json!(false));
        driver.respond(&["el.value = ''"], json!(true));
        driver.respond(&["email-widget", "innerText"], json!("isaactest@sharklasers.com"));

        let address = inbox()
            .set_address(&driver, Some("isaactest@sharklasers.com"))
            .unwrap();
        assert_eq!(address, "isaactest@sharklasers.com");
        assert!(driver
            .typed()
            .contains(&(INBOX_ID_INPUT.to_string(), "isaactest".to_string())));

        let err = inbox()
            .set_address(&driver, Some("someone@sharklasers.com"))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to change"));
    }

    #[test]
    fn test_body_link_absent_is_none() {
        let driver = FakeDriver::new();
        assert_eq!(inbox().body_link(&driver, "click here").unwrap(), None);

        driver.respond(&["click here", "snapshotLength"], json!(1));
        driver.respond(
            &["click here", "getAttribute"],
            json!(["https://localhost:8080/isaac-api/reset"]),
        );
        assert_eq!(
            inbox().body_link(&driver, "click here").unwrap().as_deref(),
            Some("https://localhost:8080/isaac-api/reset")
        );
    }

    #[test]
    fn test_file_stem() {
        let email = Email {
            row: 1,
            sender: "no-reply@isaacphysics.org".into(),
            subject: "Verify your email".into(),
            excerpt: String::new(),
            time: "10:40:12".into(),
            unread: true,
        };
        assert_eq!(email.file_stem(), "Verify_your_email_104012");
        assert_eq!(
            email.to_string(),
            "<Email from 'no-reply@isaacphysics.org' at '10:40:12'>"
        );
    }
}
