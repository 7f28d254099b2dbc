use headless_chrome::protocol::cdp::Page;
use headless_chrome::types::Bounds;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Deserialize;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("no element matches {0}")]
    NoSuchElement(String),

    #[error("timed out after {waited:?} waiting for {xpath} to be {condition}")]
    Timeout {
        condition: &'static str,
        xpath: String,
        waited: Duration,
    },

    #[error("no open tab has a url containing '{0}'")]
    TabNotFound(String),

    #[error("page script failed: {0}")]
    Script(String),

    #[error("browser protocol error: {0:#}")]
    Protocol(#[from] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BrowserError {
    /// Missing elements and expired waits. Tests report these as a failed
    /// verdict; everything else aborts the test.
    pub fn is_page_problem(&self) -> bool {
        matches!(
            self,
            BrowserError::NoSuchElement(_) | BrowserError::Timeout { .. }
        )
    }
}

/// Page-coordinate box in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn is_empty(&self) -> bool {
        self.width < 1.0 || self.height < 1.0
    }
}

/// Quotes `raw` as a JavaScript string literal.
pub fn js_string(raw: &str) -> String {
    Value::String(raw.to_string()).to_string()
}

fn first_node(xpath: &str) -> String {
    format!(
        "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
        js_string(xpath)
    )
}

/// Runs `body` with `el` bound to the first node matching `xpath`. The body
/// must return something other than `null`.
fn on_node<D: Driver + ?Sized>(
    driver: &D,
    xpath: &str,
    body: &str,
) -> Result<Value, BrowserError> {
    let script = format!("var el = {}; if (!el) return null; {}", first_node(xpath), body);
    match driver.execute(&script)? {
        Value::Null => Err(BrowserError::NoSuchElement(xpath.to_string())),
        value => Ok(value),
    }
}

fn as_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Everything the suite needs from a browser. Element arguments are XPath
/// expressions; the first match is used.
///
/// Implementors provide navigation, script execution, input, tabs, window
/// size and screenshots. The DOM queries are provided on top of `execute`.
pub trait Driver {
    fn goto(&self, url: &str) -> Result<(), BrowserError>;
    fn refresh(&self) -> Result<(), BrowserError>;
    fn current_url(&self) -> Result<String, BrowserError>;

    /// Runs `script` as the body of a function in the active tab and returns
    /// its JSON-serialised return value (`Null` for `undefined`).
    fn execute(&self, script: &str) -> Result<Value, BrowserError>;

    fn click(&self, xpath: &str) -> Result<(), BrowserError>;
    fn type_into(&self, xpath: &str, text: &str) -> Result<(), BrowserError>;

    /// Opens a blank tab and makes it active.
    fn open_tab(&self) -> Result<(), BrowserError>;
    fn tab_count(&self) -> usize;
    fn active_tab(&self) -> usize;
    fn switch_tab(&self, index: usize) -> Result<(), BrowserError>;
    /// Closes the active tab. Focus moves to the first remaining tab.
    fn close_tab(&self) -> Result<(), BrowserError>;

    fn window_size(&self) -> Result<(u32, u32), BrowserError>;
    fn set_window_size(&self, width: u32, height: u32) -> Result<(), BrowserError>;

    /// PNG of the active tab, optionally clipped.
    fn screenshot(&self, clip: Option<Rect>) -> Result<Vec<u8>, BrowserError>;

    fn count(&self, xpath: &str) -> Result<usize, BrowserError> {
        let script = format!(
            "return document.evaluate({}, document, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null).snapshotLength;",
            js_string(xpath)
        );
        Ok(self.execute(&script)?.as_u64().unwrap_or(0) as usize)
    }

    /// False when nothing matches.
    fn is_displayed(&self, xpath: &str) -> Result<bool, BrowserError> {
        let script = format!(
            "var el = {}; if (!el) return false; \
             var style = window.getComputedStyle(el); \
             return !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length) \
                 && style.visibility !== 'hidden' && style.display !== 'none';",
            first_node(xpath)
        );
        Ok(self.execute(&script)?.as_bool().unwrap_or(false))
    }

    fn text(&self, xpath: &str) -> Result<String, BrowserError> {
        on_node(self, xpath, "return el.innerText || el.textContent || '';").map(as_string)
    }

    /// Text of every match, in document order.
    fn texts(&self, xpath: &str) -> Result<Vec<String>, BrowserError> {
        let script = format!(
            "var nodes = document.evaluate({}, document, null, \
                 XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null); \
             var out = []; \
             for (var i = 0; i < nodes.snapshotLength; i++) {{ \
                 var el = nodes.snapshotItem(i); out.push(el.innerText || el.textContent || ''); \
             }} \
             return out;",
            js_string(xpath)
        );
        match self.execute(&script)? {
            Value::Null => Ok(Vec::new()),
            value => serde_json::from_value(value)
                .map_err(|e| BrowserError::Script(e.to_string())),
        }
    }

    /// DOM property `name` if it is a string, else the attribute.
    fn attribute(&self, xpath: &str, name: &str) -> Result<Option<String>, BrowserError> {
        let body = format!(
            "var v = el[{name}]; if (typeof v !== 'string') v = el.getAttribute({name}); return [v];",
            name = js_string(name)
        );
        let value = on_node(self, xpath, &body)?;
        Ok(value
            .get(0)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn inner_html(&self, xpath: &str) -> Result<String, BrowserError> {
        on_node(self, xpath, "return el.innerHTML;").map(as_string)
    }

    fn is_selected(&self, xpath: &str) -> Result<bool, BrowserError> {
        on_node(self, xpath, "return !!(el.checked || el.selected);")
            .map(|value| value.as_bool().unwrap_or(false))
    }

    fn css_property(&self, xpath: &str, property: &str) -> Result<String, BrowserError> {
        let body = format!(
            "return window.getComputedStyle(el).getPropertyValue({});",
            js_string(property)
        );
        on_node(self, xpath, &body).map(as_string)
    }

    fn clear(&self, xpath: &str) -> Result<(), BrowserError> {
        on_node(
            self,
            xpath,
            "el.value = ''; el.dispatchEvent(new Event('input', { bubbles: true })); return true;",
        )?;
        Ok(())
    }

    /// Clears the field, then types `text` into it.
    fn fill(&self, xpath: &str, text: &str) -> Result<(), BrowserError> {
        self.clear(xpath)?;
        self.type_into(xpath, text)
    }

    /// Picks the `<option>` with `value` in a `<select>` and lets the page
    /// know it changed.
    fn select_value(&self, xpath: &str, value: &str) -> Result<(), BrowserError> {
        let body = format!(
            "var wanted = {}; \
             var found = Array.prototype.some.call(el.options, \
                 function (o) {{ return o.value === wanted; }}); \
             if (!found) return false; \
             el.value = wanted; \
             el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true;",
            js_string(value)
        );
        match on_node(self, xpath, &body)? {
            Value::Bool(true) => Ok(()),
            _ => Err(BrowserError::NoSuchElement(format!(
                "{xpath}/option[@value='{value}']"
            ))),
        }
    }

    fn bounding_box(&self, xpath: &str) -> Result<Rect, BrowserError> {
        let value = on_node(
            self,
            xpath,
            "var r = el.getBoundingClientRect(); \
             return { x: r.left + window.scrollX, y: r.top + window.scrollY, width: r.width, height: r.height };",
        )?;
        serde_json::from_value(value).map_err(|e| BrowserError::Script(e.to_string()))
    }

    fn set_local_storage(&self, key: &str, value: &str) -> Result<(), BrowserError> {
        let script = format!(
            "window.localStorage.setItem({}, {}); return true;",
            js_string(key),
            js_string(value)
        );
        self.execute(&script)?;
        Ok(())
    }

    /// Replaces `alert` and `confirm` in the page so they never block.
    /// `confirm` answers `accept`; the last message is kept for
    /// [`Driver::last_dialog`].
    fn arm_dialogs(&self, accept: bool) -> Result<(), BrowserError> {
        let script = format!(
            "window.__lastDialog = null; \
             window.confirm = function (m) {{ window.__lastDialog = String(m); return {accept}; }}; \
             window.alert = function (m) {{ window.__lastDialog = String(m); }}; \
             return true;"
        );
        self.execute(&script)?;
        Ok(())
    }

    fn last_dialog(&self) -> Result<Option<String>, BrowserError> {
        let value = self.execute("return window.__lastDialog || null;")?;
        Ok(value.as_str().map(str::to_string))
    }
}

/// Browser launch settings.
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub window: (u32, u32),
    /// The browser is shut down after this long without protocol traffic, so
    /// it must outlast the longest sleep in the suite.
    pub idle_timeout: Duration,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            window: (1920, 1080),
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// [`Driver`] over a Chromium instance controlled through `headless_chrome`.
pub struct ChromeDriver {
    browser: Browser,
    tabs: RefCell<Vec<Arc<Tab>>>,
    active: Cell<usize>,
}

impl ChromeDriver {
    pub fn launch(config: &LaunchConfig) -> Result<Self, BrowserError> {
        let options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some(config.window))
            .path(config.chrome_path.clone())
            .idle_browser_timeout(config.idle_timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("invalid launch options: {e}"))?;

        let browser = Browser::new(options)?;
        let tab = browser.new_tab()?;
        info!(
            "Opened browser (headless={}, window={}x{}).",
            config.headless, config.window.0, config.window.1
        );

        Ok(Self {
            browser,
            tabs: RefCell::new(vec![tab]),
            active: Cell::new(0),
        })
    }

    fn tab(&self) -> Result<Arc<Tab>, BrowserError> {
        let index = self.active.get();
        self.tabs
            .borrow()
            .get(index)
            .cloned()
            .ok_or_else(|| BrowserError::TabNotFound(format!("#{index}")))
    }
}

impl Driver for ChromeDriver {
    fn goto(&self, url: &str) -> Result<(), BrowserError> {
        debug!("browser.goto: {}", url);
        let tab = self.tab()?;
        tab.navigate_to(url)?;
        tab.wait_until_navigated()?;
        Ok(())
    }

    fn refresh(&self) -> Result<(), BrowserError> {
        let tab = self.tab()?;
        tab.reload(false, None)?;
        tab.wait_until_navigated()?;
        Ok(())
    }

    fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.tab()?.get_url())
    }

    fn execute(&self, script: &str) -> Result<Value, BrowserError> {
        let wrapped = format!(
            "(function () {{ try {{ return JSON.stringify({{ ok: (function () {{ {script} }})() }}); }} \
             catch (e) {{ return JSON.stringify({{ err: String(e) }}); }} }})()"
        );
        let result = self.tab()?.evaluate(&wrapped, false)?;
        let raw = match result.value {
            Some(Value::String(raw)) => raw,
            _ => return Ok(Value::Null),
        };
        let mut envelope: Value =
            serde_json::from_str(&raw).map_err(|e| BrowserError::Script(e.to_string()))?;
        if let Some(err) = envelope.get("err") {
            return Err(BrowserError::Script(as_string(err.clone())));
        }
        Ok(envelope
            .get_mut("ok")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    fn click(&self, xpath: &str) -> Result<(), BrowserError> {
        let tab = self.tab()?;
        let element = tab
            .find_element_by_xpath(xpath)
            .map_err(|_| BrowserError::NoSuchElement(xpath.to_string()))?;
        element.click()?;
        Ok(())
    }

    fn type_into(&self, xpath: &str, text: &str) -> Result<(), BrowserError> {
        let tab = self.tab()?;
        let element = tab
            .find_element_by_xpath(xpath)
            .map_err(|_| BrowserError::NoSuchElement(xpath.to_string()))?;
        element.type_into(text)?;
        Ok(())
    }

    fn open_tab(&self) -> Result<(), BrowserError> {
        let tab = self.browser.new_tab()?;
        tab.activate()?;
        let mut tabs = self.tabs.borrow_mut();
        tabs.push(tab);
        self.active.set(tabs.len() - 1);
        Ok(())
    }

    fn tab_count(&self) -> usize {
        self.tabs.borrow().len()
    }

    fn active_tab(&self) -> usize {
        self.active.get()
    }

    fn switch_tab(&self, index: usize) -> Result<(), BrowserError> {
        let tab = self
            .tabs
            .borrow()
            .get(index)
            .cloned()
            .ok_or_else(|| BrowserError::TabNotFound(format!("#{index}")))?;
        tab.activate()?;
        self.active.set(index);
        Ok(())
    }

    fn close_tab(&self) -> Result<(), BrowserError> {
        let index = self.active.get();
        let tab = self.tab()?;
        tab.close(true)?;
        let mut tabs = self.tabs.borrow_mut();
        tabs.remove(index);
        self.active.set(0);
        if let Some(first) = tabs.first() {
            first.activate()?;
        }
        Ok(())
    }

    fn window_size(&self) -> Result<(u32, u32), BrowserError> {
        let value = self.execute("return [window.outerWidth, window.outerHeight];")?;
        let dim = |i: usize| value.get(i).and_then(Value::as_u64).unwrap_or(0) as u32;
        Ok((dim(0), dim(1)))
    }

    fn set_window_size(&self, width: u32, height: u32) -> Result<(), BrowserError> {
        self.tab()?.set_bounds(Bounds::Normal {
            left: None,
            top: None,
            width: Some(f64::from(width)),
            height: Some(f64::from(height)),
        })?;
        Ok(())
    }

    fn screenshot(&self, clip: Option<Rect>) -> Result<Vec<u8>, BrowserError> {
        let clip = clip.map(|rect| Page::Viewport {
            x: rect.x,
            y: rect.y,
            width: rect.width,
            height: rect.height,
            scale: 1.0,
        });
        let png = self.tab()?.capture_screenshot(
            Page::CaptureScreenshotFormatOption::Png,
            None,
            clip,
            true,
        )?;
        Ok(png)
    }
}
