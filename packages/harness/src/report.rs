use crate::ledger::{Ledger, Outcome};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Finished,
    /// A fatal error or panic stopped the suite early.
    Aborted,
}

/// End-of-run tally written to the log and the report mail.
#[derive(Debug, Clone)]
pub struct Summary {
    pub status: RunStatus,
    pub passed: usize,
    pub total: usize,
    pub errors: usize,
    pub entries: Vec<(String, Outcome)>,
}

impl Summary {
    pub fn new(ledger: &Ledger, status: RunStatus, errors: usize) -> Self {
        Self {
            status,
            passed: ledger.passed(),
            total: ledger.len(),
            errors,
            entries: ledger
                .iter()
                .map(|(name, outcome)| (name.to_string(), outcome))
                .collect(),
        }
    }

    pub fn failed(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .iter()
            .filter(|(_, outcome)| *outcome == Outcome::Failed)
            .map(|(name, _)| name.as_str())
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self.status {
            RunStatus::Finished => "Finished",
            RunStatus::Aborted => "Aborted",
        };
        writeln!(
            f,
            "Testing {}. {} of {} passed. {} errors!",
            verb, self.passed, self.total, self.errors
        )?;
        for (name, outcome) in &self.entries {
            writeln!(f, " - {:<25}: {}", name, outcome)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> Ledger {
        let mut ledger = Ledger::new();
        for name in ["LOGIN", "LOGOUT", "SIGNUP", "WELCOME_EMAIL"] {
            ledger.insert(name);
        }
        ledger.set("LOGIN", Outcome::Passed);
        ledger.set("LOGOUT", Outcome::Failed);
        ledger.set("SIGNUP", Outcome::Unresolved);
        ledger
    }

    #[test]
    fn test_summary_counts() {
        let summary = Summary::new(&ledger(), RunStatus::Finished, 3);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.errors, 3);
        assert_eq!(summary.failed().collect::<Vec<_>>(), vec!["LOGOUT"]);
    }

    #[test]
    fn test_summary_text() {
        let text = Summary::new(&ledger(), RunStatus::Finished, 2).to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Testing Finished. 1 of 4 passed. 2 errors!");
        assert_eq!(lines[1], format!(" - {:<25}: Passed", "LOGIN"));
        assert_eq!(lines[2], format!(" - {:<25}: Failed", "LOGOUT"));
        assert_eq!(lines[3], format!(" - {:<25}: Not Run", "SIGNUP"));
        assert_eq!(lines[4], format!(" - {:<25}: Not Run", "WELCOME_EMAIL"));
    }

    #[test]
    fn test_aborted_summary_headline() {
        let text = Summary::new(&ledger(), RunStatus::Aborted, 0).to_string();
        assert!(text.starts_with("Testing Aborted. 1 of 4 passed."));
    }
}
