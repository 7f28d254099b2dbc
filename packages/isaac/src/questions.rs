//! The `_regression_test_` question page: its accordion and the question
//! widgets inside it.

use crate::browser::{BrowserError, Driver};
use std::thread;
use std::time::Duration;
use tracing::{error, info};

pub const QUESTION_PAGE: &str = "/questions/_regression_test_";

pub const NUMERIC: &str = "//div[@ng-switch-when='isaacNumericQuestion']";
pub const MULTIPLE_CHOICE: &str = "//div[@ng-switch-when='isaacMultiChoiceQuestion']";
pub const SYMBOLIC: &str = "//div[@ng-switch-when='isaacSymbolicQuestion']";
pub const STRING_MATCH: &str = "//div[@ng-switch-when='isaacStringMatchQuestion']";

const TITLEBARS: &str = "//a[contains(@class, 'ru_accordion_titlebar')]";
const SECTION_SETTLE: Duration = Duration::from_millis(500);
/// The units dropdown is parked far off screen when closed.
const DROPDOWN_PARKED: f64 = 9000.0;

pub fn titlebar(n: usize) -> String {
    format!("({TITLEBARS})[{n}]")
}

/// Body of the `n`th section, counting from 1.
pub fn section(n: usize) -> String {
    format!("({TITLEBARS})[{n}]/../div")
}

pub fn section_count(driver: &dyn Driver) -> Result<usize, BrowserError> {
    driver.count(TITLEBARS)
}

fn toggle_section(driver: &dyn Driver, n: usize, open: bool) -> Result<(), BrowserError> {
    let bar = titlebar(n);
    if driver.count(&bar)? == 0 {
        return Err(BrowserError::NoSuchElement(bar));
    }
    let state = if open { "open" } else { "closed" };
    if driver.is_displayed(&section(n))? == open {
        info!("Accordion section {} already {}.", n, state);
        return Ok(());
    }
    driver.click(&bar)?;
    info!("Accordion section {} {}.", n, state);
    thread::sleep(SECTION_SETTLE);
    Ok(())
}

/// Clicks the `n`th titlebar unless that section is already showing.
pub fn open_section(driver: &dyn Driver, n: usize) -> Result<(), BrowserError> {
    toggle_section(driver, n, true)
}

pub fn close_section(driver: &dyn Driver, n: usize) -> Result<(), BrowserError> {
    toggle_section(driver, n, false)
}

/// The three marks of a correct answer inside `question`: the heading, the
/// editor's explanation for the chosen answer and the "Well done!" footer.
pub fn correct_marks(question: &str, explanation: &str) -> [String; 3] {
    [
        format!("{question}//h1[text()='Correct!']"),
        format!("({question}//p[text()='{explanation}'])[2]"),
        format!("{question}//strong[text()='Well done!']"),
    ]
}

pub fn check_answer_button(question: &str) -> String {
    format!("{question}//button[text()='Check my answer']")
}

pub fn value_box(question: &str) -> String {
    format!("{question}//input[@ng-model='ctrl.selectedValue']")
}

pub fn units_button(question: &str) -> String {
    format!("{question}//button[@ng-click='ctrl.showUnitsDropdown()']")
}

pub fn units_dropdown(question: &str) -> String {
    format!("{question}//ul[@class='f-dropdown']")
}

fn unit_choices(question: &str) -> String {
    format!("{question}//a[contains(@ng-click,'ctrl.selectedUnits')]")
}

/// Which entry of the units dropdown to pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitChoice<'a> {
    /// The entry whose LaTeX contains this text.
    Correct(&'a str),
    /// The first real unit whose LaTeX does not contain this text.
    Wrong(&'a str),
    /// The "None" entry.
    NoUnits,
}

/// Pixel value of a computed CSS length such as `-9999px`.
pub fn parse_px(raw: &str) -> Option<f64> {
    raw.trim().trim_end_matches("px").trim().parse().ok()
}

/// The incorrect-answer highlight, in any form a browser reports it.
pub fn is_red(colour: &str) -> bool {
    matches!(
        colour.trim(),
        "#be4c4c" | "rgba(190, 76, 76, 1)" | "rgb(190, 76, 76)"
    )
}

fn pick_unit(
    driver: &dyn Driver,
    question: &str,
    unit: UnitChoice<'_>,
) -> Result<(), BrowserError> {
    let choices = unit_choices(question);
    match unit {
        UnitChoice::NoUnits => {
            driver.click(&format!(
                "{question}//a[contains(@ng-click,'ctrl.selectedUnits') and text()='None']"
            ))?;
            info!("Selected unit 'None'.");
        }
        UnitChoice::Correct(latex) => {
            driver.click(&format!("{choices}//script[contains(text(), '{latex}')]/.."))?;
            info!("Selected correct unit (to match '{}').", latex);
        }
        UnitChoice::Wrong(latex) => {
            // Entry 1 is "None".
            let total = driver.count(&choices)?;
            let mut picked = None;
            for n in 2..=total {
                let text = driver.inner_html(&format!("({choices})[{n}]/script"))?;
                if !text.contains(latex) {
                    picked = Some((n, text));
                    break;
                }
            }
            let Some((n, text)) = picked else {
                return Err(BrowserError::NoSuchElement(format!(
                    "{choices} without '{latex}'"
                )));
            };
            driver.click(&format!("({choices})[{n}]"))?;
            info!("Selected incorrect unit '{}'.", text.trim());
        }
    }
    Ok(())
}

/// Types `value` into a numeric question, picks a unit and checks the
/// answer. `Ok(false)` after logging if any part of the widget misbehaves.
pub fn answer_numeric(
    driver: &dyn Driver,
    question: &str,
    value: &str,
    unit: UnitChoice<'_>,
    wait: Duration,
) -> Result<bool, BrowserError> {
    let chosen = (|| -> Result<String, BrowserError> {
        driver.fill(&value_box(question), value)?;
        info!("Entered value '{}'.", value);
        thread::sleep(wait);
        driver.click(&units_button(question))?;
        info!("Clicked to open units dropdown.");
        thread::sleep(wait);
        pick_unit(driver, question, unit)?;
        thread::sleep(wait);
        driver.css_property(&units_dropdown(question), "left")
    })();
    let left = match chosen {
        Ok(left) => left,
        Err(e) if e.is_page_problem() => {
            info!("{}", e);
            error!("Can't find part of the answer fields; can't continue!");
            return Ok(false);
        }
        Err(e) => return Err(e),
    };
    match parse_px(&left) {
        None => {
            error!(
                "Couldn't read the CSS property 'left' ('{}') for the units dropdown!",
                left
            );
            return Ok(false);
        }
        Some(left) if left >= DROPDOWN_PARKED => {
            error!("Units dropdown didn't disappear on clicking a unit; can't continue!");
            return Ok(false);
        }
        Some(_) => info!("Selected answer, both value and unit."),
    }
    thread::sleep(wait);

    match driver.click(&format!("{question}//button[@ng-click='checkAnswer()']")) {
        Ok(()) => {}
        Err(e) if e.is_page_problem() => {
            error!("Couldn't click the 'Check my answer' button; can't continue!");
            return Ok(false);
        }
        Err(e) => return Err(e),
    }
    info!("Clicked 'Check my answer'.");
    thread::sleep(wait);
    Ok(true)
}
