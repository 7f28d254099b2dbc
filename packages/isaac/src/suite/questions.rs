use super::{log_out_anyone, LOGIN_TAB};
use crate::browser::{BrowserError, Driver};
use crate::context::SuiteContext;
use crate::forms::Login;
use crate::questions::{
    self, UnitChoice, MULTIPLE_CHOICE, NUMERIC, QUESTION_PAGE, STRING_MATCH, SYMBOLIC,
};
use crate::wait;
use anyhow::Result;
use std::thread;
use std::time::Duration;
use tracing::{error, info};

const QUICK_QUESTION: &str = "//p[text()='This is a quick question.']";
const SECTIONS: usize = 6;
const SECTION_WAIT: Duration = Duration::from_secs(5);
const MULTIPLE_CHOICE_SECTION: usize = 2;
const NUMERIC_SECTION: usize = 3;
const SYMBOLIC_SECTION: usize = 4;
const STRING_MATCH_SECTION: usize = 6;

const UNIT: &str = r"\units{ m\,s^{-1} }";
const RELOADED_UNIT: &str = r"\units{m\,s^{-1}}";
const CORRECT_CHOICE: &str = "This is a correct choice.";
const TRY_AGAIN: &str = "//h5[text()='Please try again.']";
const HELP_MARK: &str = "//span[@class='value-help']";
const HELP_POPUP: &str = "//span[@class='value-help']/div[@class='popup']";

fn all_visible(driver: &dyn Driver, xpaths: &[String]) -> Result<(), BrowserError> {
    xpaths
        .iter()
        .try_for_each(|xpath| wait::for_visible(driver, xpath, wait::DEFAULT_TIMEOUT))
}

fn all_invisible(driver: &dyn Driver, xpaths: &[String]) -> Result<(), BrowserError> {
    xpaths
        .iter()
        .try_for_each(|xpath| wait::for_invisible(driver, xpath, wait::DEFAULT_TIMEOUT))
}

fn answer_panel(n: usize) -> String {
    format!("({NUMERIC}//div[@class='ru-answer-block-panel'])[{n}]")
}

fn choice(label: &str) -> String {
    format!("{MULTIPLE_CHOICE}//label//span[contains(text(), '{label}')]")
}

fn cool_down(ctx: &SuiteContext) {
    info!(
        "Avoid rate limiting: wait {} seconds.",
        ctx.settings.cooldown.as_secs()
    );
    thread::sleep(ctx.settings.cooldown);
}

/// Stays on the question page if a previous test left the site tab there.
fn to_question_page(ctx: &SuiteContext) -> Result<(), BrowserError> {
    ctx.to_site_tab()?;
    if !ctx.driver().current_url()?.contains(QUESTION_PAGE) {
        ctx.open(QUESTION_PAGE)?;
    }
    ctx.pause();
    Ok(())
}

fn show_numeric(ctx: &SuiteContext, shot: &str) -> Result<bool> {
    let driver = ctx.driver();
    step!(
        questions::open_section(driver, NUMERIC_SECTION),
        "Can't find third accordion section to open; can't continue!"
    );
    ctx.pause();
    step!(@shot ctx, shot;
        wait::for_visible(driver, NUMERIC, wait::DEFAULT_TIMEOUT),
        "Accordion section did not open to display the numeric question!"
    );
    info!("Accordion opened, numeric question displayed.");
    Ok(true)
}

pub fn accordion_behaviour(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    ctx.pause();
    log_out_anyone(ctx)?;
    ctx.open(QUESTION_PAGE)?;

    info!("Check accordions open first section automatically.");
    step!(@shot ctx, "accordion_default";
        wait::for_visible(driver, QUICK_QUESTION, wait::DEFAULT_TIMEOUT),
        "First accordion section not open by default!"
    );
    info!("First accordion section open by default on question pages.");
    ctx.pause();

    info!("Try closing an accordion section.");
    step!(
        questions::close_section(driver, 1),
        "Can't find accordion title bar to click; can't continue!"
    );
    ctx.pause();
    step!(@shot ctx, "accordion_closing";
        wait::for_invisible(driver, QUICK_QUESTION, wait::DEFAULT_TIMEOUT),
        "Accordion section did not close correctly!"
    );
    info!("Accordions close as expected.");

    info!("Try reopening accordion section.");
    step!(
        questions::open_section(driver, 1),
        "Can't find accordion title bar to click again; can't continue!"
    );
    ctx.pause();
    step!(@shot ctx, "accordion_reopen";
        wait::for_visible(driver, QUICK_QUESTION, wait::DEFAULT_TIMEOUT),
        "Accordion section did not reopen correctly!"
    );
    info!("Accordions open as expected.");
    step!(
        questions::close_section(driver, 1),
        "Can't find accordion title bar to click again; can't continue!"
    );
    ctx.pause();
    info!("Closed accordion section; all should now be closed.");

    info!("Check all accordion sections work.");
    let found = questions::section_count(driver)?;
    if found != SECTIONS {
        error!("Expected {} accordion sections, got {}!", SECTIONS, found);
        return Ok(false);
    }
    for n in 1..=SECTIONS {
        step!(driver.click(&questions::titlebar(n)), "Couldn't open all accordion sections!");
        step!(
            wait::for_visible(driver, &questions::section(n), SECTION_WAIT),
            "Accordion section {} did not open!",
            n
        );
        info!("Accordion section {} correctly shown.", n);
        step!(driver.click(&questions::titlebar(n)), "Couldn't close all accordion sections!");
        step!(
            wait::for_invisible(driver, &questions::section(n), SECTION_WAIT),
            "Accordion section {} did not close!",
            n
        );
        info!("Accordion section {} correctly hidden.", n);
        ctx.pause();
    }
    pass!("Accordion behavior is as expected.");
    Ok(true)
}

pub fn numeric_units_select(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    ctx.open(QUESTION_PAGE)?;
    if !show_numeric(ctx, "numeric_q_units_select")? {
        return Ok(false);
    }

    let button = questions::units_button(NUMERIC);
    step!(
        driver.click(&button),
        "Can't find numeric question or units dropdown button; can't continue!"
    );
    ctx.pause();
    info!("Clicked to open units dropdown.");
    let opened = step!(
        driver.css_property(&format!("{NUMERIC}//ul[contains(@class, 'f-dropdown')]"), "left"),
        "Can't find the units dropdown; can't continue!"
    );
    match questions::parse_px(&opened) {
        Some(left) if left > 0.0 => info!("Units dropdown displayed correctly."),
        Some(_) => {
            error!("Units dropdown not opened correctly!");
            return Ok(false);
        }
        None => {
            error!("Couldn't read the CSS property 'left' ('{}') for the dropdown!", opened);
            return Ok(false);
        }
    }

    step!(driver.click(&button), "Units dropdown button went away; can't continue!");
    ctx.pause();
    info!("Clicked to close units dropdown.");
    let closed = step!(
        driver.css_property(&questions::units_dropdown(NUMERIC), "left"),
        "Can't find the units dropdown; can't continue!"
    );
    match questions::parse_px(&closed) {
        Some(left) if left < 9000.0 => info!("Units dropdown hidden correctly."),
        Some(_) => {
            error!("Units dropdown did not close correctly!");
            return Ok(false);
        }
        None => {
            error!("Couldn't read the CSS property 'left' ('{}') for the dropdown!", closed);
            return Ok(false);
        }
    }
    pass!("Numeric question units popup works correctly.");
    Ok(true)
}

pub fn numeric_help_popup(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    ctx.open(QUESTION_PAGE)?;
    if !show_numeric(ctx, "numeric_q_help_popup")? {
        return Ok(false);
    }
    step!(driver.click(HELP_MARK), "Couldn't find help button; can't continue!");
    step!(
        wait::for_visible(driver, HELP_POPUP, wait::DEFAULT_TIMEOUT),
        "Help message popup not shown!"
    );
    info!("Help message correctly shown on mouseover.");
    pass!("Numeric question help message displays.");
    Ok(true)
}

pub fn numeric_all_correct(ctx: &SuiteContext) -> Result<bool> {
    to_question_page(ctx)?;
    let driver = ctx.driver();
    step!(
        questions::open_section(driver, NUMERIC_SECTION),
        "Can't find the numeric question; can't continue!"
    );

    info!("Attempt to enter correct answer.");
    let unit = UnitChoice::Correct(UNIT);
    if !questions::answer_numeric(driver, NUMERIC, "2.01", unit, ctx.settings.wait)? {
        error!("Couldn't answer Numeric Question; can't continue!");
        return Ok(false);
    }
    ctx.pause();

    step!(@shot ctx, "numeric_q_all_correct";
        all_visible(driver, &questions::correct_marks(NUMERIC, CORRECT_CHOICE)),
        "The messages shown for a correct answer were not all displayed!"
    );
    info!("'Correct!', the explanation and 'Well done!' were all shown.");
    cool_down(ctx);
    pass!("Numeric Question 'correct value, correct unit' behavior as expected.");
    Ok(true)
}

/// Editing an answer clears the marks left by checking it.
pub fn numeric_answer_change(ctx: &SuiteContext) -> Result<bool> {
    to_question_page(ctx)?;
    let driver = ctx.driver();
    let marks = questions::correct_marks(NUMERIC, CORRECT_CHOICE);
    step!(
        all_visible(driver, &marks),
        "Correct answer text can't be found; can't check if it goes; can't continue!"
    );

    info!("Alter previously typed answer.");
    step!(
        driver.type_into(&questions::value_box(NUMERIC), "00"),
        "Can't find value box to try changing answer; can't continue!"
    );
    step!(@shot ctx, "numeric_q_answer_change";
        all_invisible(driver, &marks),
        "The messages shown for an old answer do not disappear upon altering answer!"
    );
    ctx.pause();
    pass!("Numeric Question answer text disappears upon changing answer.");
    Ok(true)
}

pub fn numeric_answer_reloaded(ctx: &SuiteContext) -> Result<bool> {
    to_question_page(ctx)?;
    let driver = ctx.driver();
    info!("Refreshing the page.");
    driver.refresh()?;
    ctx.pause();
    step!(
        questions::open_section(driver, NUMERIC_SECTION),
        "Can't find the numeric question; can't continue!"
    );
    ctx.pause();

    info!("Checking previously entered answer is present after reload.");
    let value = step!(@shot ctx, "numeric_q_answer_reloaded";
        driver.attribute(&questions::value_box(NUMERIC), "value"),
        "Can't find value box for numeric question after reload!"
    )
    .unwrap_or_default();
    if value != "2.01" {
        error!("Value incorrectly reloaded. Expected '2.01', got '{}'!", value);
        return Ok(false);
    }
    let units = step!(@shot ctx, "numeric_q_answer_reloaded";
        driver.inner_html(&format!("{}/span/script", questions::units_button(NUMERIC))),
        "Can't find units box for numeric question after reload!"
    );
    if units.trim() != RELOADED_UNIT {
        error!(
            "Units incorrectly reloaded. Expected '{}', got '{}'!",
            RELOADED_UNIT, units
        );
        return Ok(false);
    }
    info!("Value and units correctly reloaded after page refresh.");

    step!(@shot ctx, "numeric_q_answer_reloaded";
        all_visible(driver, &questions::correct_marks(NUMERIC, CORRECT_CHOICE)),
        "The messages shown for an answer were not all reloaded!"
    );
    ctx.pause();
    pass!("Numeric Question answers reloaded correctly.");
    Ok(true)
}

/// One deliberately wrong numeric answer and the feedback it must get.
struct Attempt {
    shot: &'static str,
    describe: &'static str,
    value: &'static str,
    unit: UnitChoice<'static>,
    heading: &'static str,
    hint: &'static str,
    red_panels: &'static [usize],
    cool_down: bool,
}

const INCORRECT_UNIT: Attempt = Attempt {
    shot: "numeric_q_incorrect_unit",
    describe: "correct value, incorrect unit",
    value: "2.01",
    unit: UnitChoice::Wrong(UNIT),
    heading: "incorrect",
    hint: "//p[text()='Check your units.']",
    red_panels: &[2],
    cool_down: false,
};

const INCORRECT_SF: Attempt = Attempt {
    shot: "numeric_q_incorrect_sf",
    describe: "incorrect significant figures",
    value: "2.0",
    unit: UnitChoice::Correct(UNIT),
    heading: "incorrect",
    hint: "//p/strong[text()='Significant figures']/..",
    red_panels: &[1],
    cool_down: true,
};

const INCORRECT_VALUE: Attempt = Attempt {
    shot: "numeric_q_incorrect_value",
    describe: "incorrect value, correct unit",
    value: "4.33",
    unit: UnitChoice::Correct(UNIT),
    heading: "incorrect",
    hint: "//p[text()='Check your working.']",
    red_panels: &[1],
    cool_down: true,
};

const UNITS_NONE: Attempt = Attempt {
    shot: "numeric_q_units_none",
    describe: "no units when units are required",
    value: "999",
    unit: UnitChoice::NoUnits,
    heading: "Incorrect",
    hint: "//p[text()='This answer required no units!']",
    red_panels: &[1],
    cool_down: true,
};

const ALL_INCORRECT: Attempt = Attempt {
    shot: "numeric_q_all_incorrect",
    describe: "incorrect value, incorrect unit",
    value: "4.33",
    unit: UnitChoice::Wrong(UNIT),
    heading: "Incorrect",
    hint: "//p[text()='Check your working.']",
    red_panels: &[1, 2],
    cool_down: true,
};

fn answer_incorrectly(ctx: &SuiteContext, attempt: &Attempt) -> Result<bool> {
    to_question_page(ctx)?;
    let driver = ctx.driver();
    step!(
        questions::open_section(driver, NUMERIC_SECTION),
        "Can't find the numeric question; can't continue!"
    );

    info!("Attempt to enter {}.", attempt.describe);
    if !questions::answer_numeric(driver, NUMERIC, attempt.value, attempt.unit, ctx.settings.wait)?
    {
        error!("Couldn't answer Numeric Question; can't continue!");
        return Ok(false);
    }
    ctx.pause();

    let feedback = [
        format!("{NUMERIC}//h2[text()='{}']", attempt.heading),
        format!("({NUMERIC}{})[1]", attempt.hint),
        format!("{NUMERIC}{TRY_AGAIN}"),
    ];
    step!(@shot ctx, attempt.shot;
        all_visible(driver, &feedback),
        "The messages shown for '{}' were not all displayed!",
        attempt.describe
    );
    info!("The '{}' and 'Please try again.' messages were shown.", attempt.heading);

    for panel in attempt.red_panels {
        let colour = step!(
            driver.css_property(&answer_panel(*panel), "background-color"),
            "Can't find answer panel {}!",
            panel
        );
        if !questions::is_red(&colour) {
            let file = ctx.capture_failure(attempt.shot);
            error!(
                "Answer panel {} was not highlighted red (got '{}'); see '{}'!",
                panel, colour, file
            );
            return Ok(false);
        }
    }
    info!("Red highlighting shown around the wrong part of the answer.");
    if attempt.cool_down {
        cool_down(ctx);
    }
    pass!("Numeric Question '{}' behavior as expected.", attempt.describe);
    Ok(true)
}

pub fn numeric_incorrect_unit(ctx: &SuiteContext) -> Result<bool> {
    answer_incorrectly(ctx, &INCORRECT_UNIT)
}

pub fn numeric_incorrect_sf(ctx: &SuiteContext) -> Result<bool> {
    answer_incorrectly(ctx, &INCORRECT_SF)
}

pub fn numeric_incorrect_value(ctx: &SuiteContext) -> Result<bool> {
    answer_incorrectly(ctx, &INCORRECT_VALUE)
}

pub fn numeric_units_none(ctx: &SuiteContext) -> Result<bool> {
    answer_incorrectly(ctx, &UNITS_NONE)
}

pub fn numeric_all_incorrect(ctx: &SuiteContext) -> Result<bool> {
    answer_incorrectly(ctx, &ALL_INCORRECT)
}

pub fn multiple_choice(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    ctx.open(QUESTION_PAGE)?;
    step!(
        questions::open_section(driver, MULTIPLE_CHOICE_SECTION),
        "Can't find second accordion section to open; can't continue!"
    );
    step!(@shot ctx, "multiple_choice_questions";
        wait::for_visible(driver, MULTIPLE_CHOICE, wait::DEFAULT_TIMEOUT),
        "Accordion section did not open to display the multiple choice question!"
    );
    info!("Accordion opened, multiple choice question displayed.");

    let check = questions::check_answer_button(MULTIPLE_CHOICE);
    info!("Attempt to select an incorrect answer.");
    step!(driver.click(&choice("69")), "Can't find the incorrect choice; can't continue!");
    step!(driver.click(&check), "Can't find 'Check my answer' button; can't continue!");
    ctx.pause();
    let wrong = [
        format!("{MULTIPLE_CHOICE}//h2[text()='incorrect']"),
        format!("({MULTIPLE_CHOICE}//p[text()='This is an incorrect choice.'])[1]"),
        format!("{MULTIPLE_CHOICE}{TRY_AGAIN}"),
    ];
    step!(@shot ctx, "multiple_choice_questions";
        all_visible(driver, &wrong),
        "The messages shown for an incorrect answer were not all displayed!"
    );
    info!("The incorrect answer messages were shown.");

    info!("Attempt to select the correct answer.");
    step!(driver.click(&choice("42")), "Can't find the correct choice; can't continue!");
    step!(
        wait::for_invisible(driver, &wrong[0], wait::DEFAULT_TIMEOUT),
        "The 'incorrect' message did not go away on choosing another answer!"
    );
    step!(driver.click(&check), "Can't find 'Check my answer' button; can't continue!");
    ctx.pause();
    step!(@shot ctx, "multiple_choice_questions";
        all_visible(driver, &questions::correct_marks(MULTIPLE_CHOICE, CORRECT_CHOICE)),
        "The messages shown for a correct answer were not all displayed!"
    );
    pass!("Multiple Choice Question behavior as expected.");
    Ok(true)
}

/// Answers the symbolic question through its plain text entry box, logged
/// in as the admin user.
pub fn symbolic_text_entry_correct(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    log_out_anyone(ctx)?;
    step!(driver.click(LOGIN_TAB), "Couldn't click login tab; can't login!");
    ctx.pause();
    Login::user(&ctx.users.admin)
        .keep_popup()
        .submit(driver, ctx.settings.wait)?;
    ctx.pause();
    ctx.open(QUESTION_PAGE)?;
    step!(
        questions::open_section(driver, SYMBOLIC_SECTION),
        "Can't find the symbolic question; can't continue!"
    );

    info!("Attempt to enter correct answer.");
    step!(
        driver.fill(&format!("{SYMBOLIC}//input[@type='text']"), "(((x)))"),
        "Couldn't answer symbolic Question; can't continue!"
    );
    ctx.pause();
    step!(
        driver.click(&questions::check_answer_button(SYMBOLIC)),
        "Couldn't click the 'Check my answer' button; can't continue!"
    );
    ctx.pause();

    step!(@shot ctx, "symbolic_q_correct";
        all_visible(driver, &questions::correct_marks(SYMBOLIC, CORRECT_CHOICE)),
        "The messages shown for a correct answer were not all displayed!"
    );
    cool_down(ctx);
    pass!("Symbolic Question 'correct answer' behavior as expected.");
    Ok(true)
}

pub fn string_match_correct(ctx: &SuiteContext) -> Result<bool> {
    ctx.to_site_tab()?;
    let driver = ctx.driver();
    ctx.open(QUESTION_PAGE)?;
    step!(
        questions::open_section(driver, STRING_MATCH_SECTION),
        "Can't find sixth accordion section to open; can't continue!"
    );
    step!(@shot ctx, "string_match_q_correct";
        wait::for_visible(driver, STRING_MATCH, wait::DEFAULT_TIMEOUT),
        "Accordion section did not open to display the string match question!"
    );

    step!(
        driver.fill(&questions::value_box(STRING_MATCH), "hello"),
        "Can't find the answer box; can't continue!"
    );
    info!("Entered answer 'hello'.");
    ctx.pause();
    step!(
        driver.click(&questions::check_answer_button(STRING_MATCH)),
        "Couldn't click the 'Check my answer' button; can't continue!"
    );
    ctx.pause();

    let marks = questions::correct_marks(STRING_MATCH, r#"This needs a lower case "h"."#);
    step!(@shot ctx, "string_match_q_correct";
        all_visible(driver, &marks),
        "The messages shown for a correct answer were not all displayed!"
    );
    pass!("String Match Question 'correct answer' behavior as expected.");
    Ok(true)
}
