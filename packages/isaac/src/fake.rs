use crate::browser::{BrowserError, Driver, Rect};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

struct Response {
    needles: Vec<String>,
    values: VecDeque<Value>,
}

/// Scripted [`Driver`] for unit tests.
///
/// `execute` answers with the first registered response whose needles all
/// occur in the script. A response with several values hands them out in
/// order and then keeps repeating the last one. Unmatched scripts get `Null`.
pub struct FakeDriver {
    responses: RefCell<Vec<Response>>,
    scripts: RefCell<Vec<String>>,
    clicks: RefCell<Vec<String>>,
    typed: RefCell<Vec<(String, String)>>,
    urls: RefCell<Vec<String>>,
    active: Cell<usize>,
    size: Cell<(u32, u32)>,
    missing: RefCell<Vec<String>>,
    redirects: RefCell<Vec<(String, String)>>,
    links: RefCell<Vec<(String, String)>>,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self {
            responses: RefCell::new(Vec::new()),
            scripts: RefCell::new(Vec::new()),
            clicks: RefCell::new(Vec::new()),
            typed: RefCell::new(Vec::new()),
            urls: RefCell::new(vec!["about:blank".to_string()]),
            active: Cell::new(0),
            size: Cell::new((1920, 1080)),
            missing: RefCell::new(Vec::new()),
            redirects: RefCell::new(Vec::new()),
            links: RefCell::new(Vec::new()),
        }
    }

    pub fn respond(&self, needles: &[&str], value: Value) {
        self.respond_seq(needles, vec![value]);
    }

    pub fn respond_seq(&self, needles: &[&str], values: Vec<Value>) {
        self.responses.borrow_mut().push(Response {
            needles: needles.iter().map(|n| n.to_string()).collect(),
            values: values.into(),
        });
    }

    /// Any `goto` to a url ending in `from` lands on `to` instead.
    pub fn redirect(&self, from: &str, to: &str) {
        self.redirects
            .borrow_mut()
            .push((from.to_string(), to.to_string()));
    }

    /// Clicking `xpath` loads `url` in the active tab.
    pub fn link(&self, xpath: &str, url: &str) {
        self.links
            .borrow_mut()
            .push((xpath.to_string(), url.to_string()));
    }

    /// Makes `click` and `type_into` fail for this xpath.
    pub fn remove(&self, xpath: &str) {
        self.missing.borrow_mut().push(xpath.to_string());
    }

    pub fn with_tabs(urls: &[&str]) -> Self {
        let driver = Self::new();
        *driver.urls.borrow_mut() = urls.iter().map(|u| u.to_string()).collect();
        driver
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.borrow().clone()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.clicks.borrow().clone()
    }

    pub fn typed(&self) -> Vec<(String, String)> {
        self.typed.borrow().clone()
    }

    fn check_present(&self, xpath: &str) -> Result<(), BrowserError> {
        if self.missing.borrow().iter().any(|m| m == xpath) {
            return Err(BrowserError::NoSuchElement(xpath.to_string()));
        }
        Ok(())
    }
}

impl Driver for FakeDriver {
    fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let landed = self
            .redirects
            .borrow()
            .iter()
            .find(|(from, _)| url.ends_with(from.as_str()))
            .map_or_else(|| url.to_string(), |(_, to)| to.clone());
        let index = self.active.get();
        self.urls.borrow_mut()[index] = landed;
        Ok(())
    }

    fn refresh(&self) -> Result<(), BrowserError> {
        Ok(())
    }

    fn current_url(&self) -> Result<String, BrowserError> {
        Ok(self.urls.borrow()[self.active.get()].clone())
    }

    fn execute(&self, script: &str) -> Result<Value, BrowserError> {
        self.scripts.borrow_mut().push(script.to_string());
        let mut responses = self.responses.borrow_mut();
        let found = responses
            .iter_mut()
            .find(|r| r.needles.iter().all(|n| script.contains(n.as_str())));
        Ok(match found {
            Some(response) if response.values.len() > 1 => {
                response.values.pop_front().unwrap_or(Value::Null)
            }
            Some(response) => response.values.front().cloned().unwrap_or(Value::Null),
            None => Value::Null,
        })
    }

    fn click(&self, xpath: &str) -> Result<(), BrowserError> {
        self.check_present(xpath)?;
        self.clicks.borrow_mut().push(xpath.to_string());
        let target = self
            .links
            .borrow()
            .iter()
            .find(|(link, _)| link == xpath)
            .map(|(_, url)| url.clone());
        if let Some(url) = target {
            self.urls.borrow_mut()[self.active.get()] = url;
        }
        Ok(())
    }

    fn type_into(&self, xpath: &str, text: &str) -> Result<(), BrowserError> {
        self.check_present(xpath)?;
        self.typed
            .borrow_mut()
            .push((xpath.to_string(), text.to_string()));
        Ok(())
    }

    fn open_tab(&self) -> Result<(), BrowserError> {
        let mut urls = self.urls.borrow_mut();
        urls.push("about:blank".to_string());
        self.active.set(urls.len() - 1);
        Ok(())
    }

    fn tab_count(&self) -> usize {
        self.urls.borrow().len()
    }

    fn active_tab(&self) -> usize {
        self.active.get()
    }

    fn switch_tab(&self, index: usize) -> Result<(), BrowserError> {
        if index >= self.tab_count() {
            return Err(BrowserError::TabNotFound(format!("#{index}")));
        }
        self.active.set(index);
        Ok(())
    }

    fn close_tab(&self) -> Result<(), BrowserError> {
        let index = self.active.get();
        self.urls.borrow_mut().remove(index);
        self.active.set(0);
        Ok(())
    }

    fn window_size(&self) -> Result<(u32, u32), BrowserError> {
        Ok(self.size.get())
    }

    fn set_window_size(&self, width: u32, height: u32) -> Result<(), BrowserError> {
        self.size.set((width, height));
        Ok(())
    }

    fn screenshot(&self, clip: Option<Rect>) -> Result<Vec<u8>, BrowserError> {
        let mut png = b"\x89PNG".to_vec();
        if clip.is_some() {
            png.extend_from_slice(b"clip");
        }
        Ok(png)
    }
}

/// Lets a test keep a handle on the fake after boxing it into a context.
impl Driver for Rc<FakeDriver> {
    fn goto(&self, url: &str) -> Result<(), BrowserError> {
        (**self).goto(url)
    }

    fn refresh(&self) -> Result<(), BrowserError> {
        (**self).refresh()
    }

    fn current_url(&self) -> Result<String, BrowserError> {
        (**self).current_url()
    }

    fn execute(&self, script: &str) -> Result<Value, BrowserError> {
        (**self).execute(script)
    }

    fn click(&self, xpath: &str) -> Result<(), BrowserError> {
        (**self).click(xpath)
    }

    fn type_into(&self, xpath: &str, text: &str) -> Result<(), BrowserError> {
        (**self).type_into(xpath, text)
    }

    fn open_tab(&self) -> Result<(), BrowserError> {
        (**self).open_tab()
    }

    fn tab_count(&self) -> usize {
        (**self).tab_count()
    }

    fn active_tab(&self) -> usize {
        (**self).active_tab()
    }

    fn switch_tab(&self, index: usize) -> Result<(), BrowserError> {
        (**self).switch_tab(index)
    }

    fn close_tab(&self) -> Result<(), BrowserError> {
        (**self).close_tab()
    }

    fn window_size(&self) -> Result<(u32, u32), BrowserError> {
        (**self).window_size()
    }

    fn set_window_size(&self, width: u32, height: u32) -> Result<(), BrowserError> {
        (**self).set_window_size(width, height)
    }

    fn screenshot(&self, clip: Option<Rect>) -> Result<Vec<u8>, BrowserError> {
        (**self).screenshot(clip)
    }
}
