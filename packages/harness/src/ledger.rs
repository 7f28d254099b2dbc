use std::collections::HashMap;
use std::fmt;

/// Result state of a single named test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Outcome {
    #[default]
    NotRun,
    Passed,
    Failed,
    /// Skipped because at least one dependency had not passed.
    Unresolved,
}

impl Outcome {
    pub fn from_verdict(passed: bool) -> Self {
        if passed {
            Outcome::Passed
        } else {
            Outcome::Failed
        }
    }

    /// Anything other than `NotRun`.
    pub fn is_attempted(self) -> bool {
        self != Outcome::NotRun
    }

    /// `Passed` or `Failed`: the body ran to a verdict.
    pub fn is_resolved(self) -> bool {
        matches!(self, Outcome::Passed | Outcome::Failed)
    }

    pub fn label(self) -> &'static str {
        match self {
            Outcome::Passed => "Passed",
            Outcome::Failed => "Failed",
            Outcome::NotRun | Outcome::Unresolved => "Not Run",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome per test name, iterated in the order the names were inserted.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    order: Vec<String>,
    results: HashMap<String, Outcome>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name` as `NotRun`. Returns false if it was already present.
    pub fn insert(&mut self, name: &str) -> bool {
        if self.results.contains_key(name) {
            return false;
        }
        self.order.push(name.to_string());
        self.results.insert(name.to_string(), Outcome::NotRun);
        true
    }

    pub fn get(&self, name: &str) -> Option<Outcome> {
        self.results.get(name).copied()
    }

    /// Updates an existing entry. Unknown names are ignored.
    pub fn set(&mut self, name: &str, outcome: Outcome) {
        if let Some(slot) = self.results.get_mut(name) {
            *slot = outcome;
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.results.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Outcome)> + '_ {
        self.order
            .iter()
            .map(move |name| (name.as_str(), self.results[name]))
    }

    pub fn passed(&self) -> usize {
        self.results
            .values()
            .filter(|outcome| **outcome == Outcome::Passed)
            .count()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
