use crate::browser::{BrowserError, Driver};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Writes screenshots and saved HTML into the run's output directory.
#[derive(Debug, Clone)]
pub struct Artifacts {
    dir: PathBuf,
}

impl Artifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn screenshot(&self, driver: &dyn Driver, name: &str) -> Result<PathBuf, BrowserError> {
        let path = self.dir.join(format!("{name}.png"));
        fs::write(&path, driver.screenshot(None)?)?;
        info!("Saved image '{}.png'.", name);
        Ok(path)
    }

    /// Clipped to the element. A zero-sized element gets a whole-page image.
    pub fn screenshot_element(
        &self,
        driver: &dyn Driver,
        name: &str,
        xpath: &str,
    ) -> Result<PathBuf, BrowserError> {
        let rect = driver.bounding_box(xpath)?;
        let clip = if rect.is_empty() {
            info!("Element had no size. Saving whole screen");
            None
        } else {
            Some(rect)
        };
        let path = self.dir.join(format!("{name}.png"));
        fs::write(&path, driver.screenshot(clip)?)?;
        info!("Saved image '{}.png'.", name);
        Ok(path)
    }

    pub fn save_html(&self, name: &str, html: &str) -> Result<PathBuf, BrowserError> {
        let path = self.dir.join(format!("{name}.html"));
        fs::write(&path, html)?;
        info!("Saved HTML '{}.html'.", name);
        Ok(path)
    }

    /// Captures `ERROR_<context>.png` and returns the file name for the
    /// error message. Never fails; a failed capture is only logged.
    pub fn failure(&self, driver: &dyn Driver, context: &str) -> String {
        let name = format!("ERROR_{context}");
        if let Err(e) = self.screenshot(driver, &name) {
            warn!("Could not save '{}.png': {}", name, e);
        }
        format!("{name}.png")
    }
}

/// File-name-safe form of free text such as an email subject.
pub fn safe_name(raw: &str) -> String {
    raw.trim_start()
        .chars()
        .filter(|c| *c != ':')
        .map(|c| if c == ' ' { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeDriver;
    use serde_json::json;
    use uuid::Uuid;

    fn scratch() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("isaac-artifacts-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_safe_name() {
        assert_eq!(
            safe_name("  Welcome to Isaac Physics!_10:42:01"),
            "Welcome_to_Isaac_Physics_104201"
        );
        assert_eq!(safe_name("Verify your email_12:00"), "Verify_your_email_1200");
        assert_eq!(safe_name("a/b\\c"), "abc");
    }

    #[test]
    fn test_screenshot_and_html_files() {
        let dir = scratch();
        let artifacts = Artifacts::new(&dir);
        let driver = FakeDriver::new();

        let png = artifacts.screenshot(&driver, "11_login_attempts").unwrap();
        assert_eq!(png, dir.join("11_login_attempts.png"));
        assert!(fs::read(&png).unwrap().starts_with(b"\x89PNG"));

        let html = artifacts.save_html("body", "<p>hi</p>").unwrap();
        assert_eq!(fs::read_to_string(html).unwrap(), "<p>hi</p>");

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_element_screenshot_clips_or_falls_back() {
        let dir = scratch();
        let artifacts = Artifacts::new(&dir);
        let driver = FakeDriver::new();
        driver.respond(
            &["//div[@class='email']", "getBoundingClientRect"],
            json!({ "x": 0.0, "y": 100.0, "width": 640.0, "height": 480.0 }),
        );
        driver.respond(
            &["//div[@class='flat']", "getBoundingClientRect"],
            json!({ "x": 0.0, "y": 0.0, "width": 640.0, "height": 0.0 }),
        );

        let clipped = artifacts
            .screenshot_element(&driver, "email", "//div[@class='email']")
            .unwrap();
        assert!(fs::read(clipped).unwrap().ends_with(b"clip"));

        let whole = artifacts
            .screenshot_element(&driver, "flat", "//div[@class='flat']")
            .unwrap();
        assert!(!fs::read(whole).unwrap().ends_with(b"clip"));

        fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_failure_names_file_even_when_capture_fails() {
        let artifacts = Artifacts::new("/nonexistent/isaac-output");
        let driver = FakeDriver::new();
        assert_eq!(
            artifacts.failure(&driver, "logout_failure"),
            "ERROR_logout_failure.png"
        );
    }
}
