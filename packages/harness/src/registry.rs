use crate::error::HarnessError;
use crate::ledger::{Ledger, Outcome};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, error, info, warn};

/// Conversion from whatever a test body returns into a pass/fail verdict.
///
/// `None` means the body produced no verdict; the runner records that as a
/// failure.
pub trait IntoVerdict {
    fn into_verdict(self) -> Option<bool>;
}

impl IntoVerdict for bool {
    fn into_verdict(self) -> Option<bool> {
        Some(self)
    }
}

impl IntoVerdict for Option<bool> {
    fn into_verdict(self) -> Option<bool> {
        self
    }
}

impl IntoVerdict for () {
    fn into_verdict(self) -> Option<bool> {
        None
    }
}

type Body<C> = Box<dyn Fn(&C) -> anyhow::Result<Option<bool>>>;

/// A named test, the tests it needs to have passed first, and the clean-up
/// tests to run after it when it is run as a target.
pub struct TestCase<C> {
    name: String,
    dependencies: Vec<String>,
    teardowns: Vec<String>,
    body: Body<C>,
}

impl<C> TestCase<C> {
    pub fn new<F, V>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&C) -> anyhow::Result<V> + 'static,
        V: IntoVerdict,
    {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            teardowns: Vec::new(),
            body: Box::new(move |ctx| body(ctx).map(IntoVerdict::into_verdict)),
        }
    }

    /// Declares prerequisites. Repeated names are collapsed.
    pub fn depends_on<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.dependencies.contains(&name) {
                self.dependencies.push(name);
            }
        }
        self
    }

    /// Declares a clean-up test. Use sparingly.
    pub fn teardown(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.teardowns.contains(&name) {
            self.teardowns.push(name);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn teardowns(&self) -> &[String] {
        &self.teardowns
    }
}

impl<C> fmt::Debug for TestCase<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("teardowns", &self.teardowns)
            .finish_non_exhaustive()
    }
}

/// Returned by [`Registry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestHandle {
    name: String,
}

impl TestHandle {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[derive(Clone, Copy)]
enum Edge {
    Dependency,
    Teardown,
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Active,
    Done,
}

/// Registered tests plus the ledger of their outcomes for one suite run.
pub struct Registry<C> {
    tests: Vec<TestCase<C>>,
    index: HashMap<String, usize>,
    ledger: Ledger,
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self {
            tests: Vec::new(),
            index: HashMap::new(),
            ledger: Ledger::new(),
        }
    }
}

impl<C> Registry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, case: TestCase<C>) -> Result<TestHandle, HarnessError> {
        if self.index.contains_key(&case.name) {
            return Err(HarnessError::DuplicateTest(case.name));
        }
        debug!(
            "registry.register: name={} deps={:?} teardowns={:?}",
            case.name, case.dependencies, case.teardowns
        );
        self.index.insert(case.name.clone(), self.tests.len());
        self.ledger.insert(&case.name);
        let handle = TestHandle {
            name: case.name.clone(),
        };
        self.tests.push(case);
        Ok(handle)
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn outcome(&self, name: &str) -> Option<Outcome> {
        self.ledger.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.tests.iter().map(|case| case.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    fn case(&self, name: &str) -> Result<&TestCase<C>, HarnessError> {
        self.index
            .get(name)
            .map(|&idx| &self.tests[idx])
            .ok_or_else(|| HarnessError::UnknownTest(name.to_string()))
    }

    /// Runs one test if all of its dependencies have passed.
    ///
    /// Returns `Ok(None)` when the test already has a verdict and nothing was
    /// done. A body that returns an error leaves the test `Failed` and the
    /// error is handed back as [`HarnessError::TestAborted`].
    pub fn run(&mut self, name: &str, ctx: &C) -> Result<Option<Outcome>, HarnessError> {
        let idx = *self
            .index
            .get(name)
            .ok_or_else(|| HarnessError::UnknownTest(name.to_string()))?;
        let case = &self.tests[idx];

        let current = self.ledger.get(name).unwrap_or_default();
        if current.is_resolved() {
            debug!("Test '{}' already {}; skipping.", name, current);
            return Ok(None);
        }

        let mut unmet = Vec::new();
        for dep in &case.dependencies {
            match self.ledger.get(dep) {
                Some(Outcome::Passed) => {}
                Some(_) => unmet.push(dep.as_str()),
                None => {
                    return Err(HarnessError::UnknownDependency {
                        test: name.to_string(),
                        dependency: dep.clone(),
                    })
                }
            }
        }
        if !unmet.is_empty() {
            error!(
                "Test '{}' not run, dependencies '{}' not met!",
                name,
                unmet.join(", ")
            );
            self.ledger.set(name, Outcome::Unresolved);
            return Ok(Some(Outcome::Unresolved));
        }

        info!("Test '{}'.", name);
        // Recorded before the body runs so an abort still counts as a failure.
        self.ledger.set(name, Outcome::Failed);
        match (case.body)(ctx) {
            Ok(Some(passed)) => {
                let outcome = Outcome::from_verdict(passed);
                self.ledger.set(name, outcome);
                debug!("Test '{}' {}.", name, outcome);
                Ok(Some(outcome))
            }
            Ok(None) => {
                warn!("Test '{}' gave no verdict; recording it as failed.", name);
                Ok(Some(Outcome::Failed))
            }
            Err(source) => Err(HarnessError::TestAborted {
                test: name.to_string(),
                source,
            }),
        }
    }

    /// Runs every dependency of `name` that has not been attempted yet,
    /// deepest first, then `name` itself, then any teardowns declared along
    /// the way (each at most once).
    ///
    /// Everything reachable from `name`, teardowns and their prerequisites
    /// included, is checked for cycles before any body runs. A target that
    /// already has a verdict is left alone and its teardowns are not run.
    pub fn run_with_dependencies(
        &mut self,
        name: &str,
        ctx: &C,
    ) -> Result<Option<Outcome>, HarnessError> {
        self.check_reachable(name)?;
        let mut torn_down = HashSet::new();
        self.run_target(name, ctx, &mut torn_down)
    }

    /// Cycle check over every test `name` can pull in, following both
    /// dependency and teardown edges.
    fn check_reachable(&self, name: &str) -> Result<(), HarnessError> {
        let mut pending = vec![name.to_string()];
        let mut seen = HashSet::new();
        while let Some(next) = pending.pop() {
            if !seen.insert(next.clone()) {
                continue;
            }
            self.check_acyclic(&next, Edge::Dependency)?;
            self.check_acyclic(&next, Edge::Teardown)?;
            let case = self.case(&next)?;
            pending.extend(case.dependencies.iter().cloned());
            pending.extend(case.teardowns.iter().cloned());
        }
        Ok(())
    }

    fn run_target(
        &mut self,
        name: &str,
        ctx: &C,
        torn_down: &mut HashSet<String>,
    ) -> Result<Option<Outcome>, HarnessError> {
        self.case(name)?;
        let current = self.ledger.get(name).unwrap_or_default();
        if current.is_resolved() {
            debug!(
                "Test '{}' already {}; not running it or its teardowns.",
                name, current
            );
            return Ok(None);
        }

        let plan = self.plan(name)?;

        let mut teardowns: Vec<String> = Vec::new();
        for step in &plan {
            for teardown in &self.case(step)?.teardowns {
                if !teardowns.contains(teardown) {
                    teardowns.push(teardown.clone());
                }
            }
        }

        for step in plan.iter().filter(|step| step.as_str() != name) {
            self.run(step, ctx)?;
        }
        let outcome = self.run(name, ctx)?;

        for teardown in teardowns {
            if torn_down.insert(teardown.clone()) {
                info!("Running teardown '{}' after '{}'.", teardown, name);
                self.run_target(&teardown, ctx, torn_down)?;
            }
        }
        Ok(outcome)
    }

    /// Not-yet-attempted dependency closure of `target` in post-order,
    /// followed by `target`.
    fn plan(&self, target: &str) -> Result<Vec<String>, HarnessError> {
        let case = self.case(target)?;
        let mut order = Vec::new();
        let mut seen = HashSet::new();
        for dep in &case.dependencies {
            self.collect_pending(&case.name, dep, &mut seen, &mut order)?;
        }
        order.push(case.name.clone());
        Ok(order)
    }

    fn collect_pending(
        &self,
        parent: &str,
        name: &str,
        seen: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> Result<(), HarnessError> {
        let case = self
            .index
            .get(name)
            .map(|&idx| &self.tests[idx])
            .ok_or_else(|| HarnessError::UnknownDependency {
                test: parent.to_string(),
                dependency: name.to_string(),
            })?;
        let attempted = self.ledger.get(name).is_some_and(Outcome::is_attempted);
        if attempted || !seen.insert(name.to_string()) {
            return Ok(());
        }
        for dep in &case.dependencies {
            self.collect_pending(name, dep, seen, order)?;
        }
        order.push(name.to_string());
        Ok(())
    }

    /// Every dependency and teardown refers to a registered test, and neither
    /// the dependency graph nor the teardown graph has a cycle.
    pub fn validate(&self) -> Result<(), HarnessError> {
        for case in &self.tests {
            for next in case.dependencies.iter().chain(&case.teardowns) {
                if !self.index.contains_key(next) {
                    return Err(HarnessError::UnknownDependency {
                        test: case.name.clone(),
                        dependency: next.clone(),
                    });
                }
            }
        }
        for case in &self.tests {
            self.check_acyclic(&case.name, Edge::Dependency)?;
            self.check_acyclic(&case.name, Edge::Teardown)?;
        }
        Ok(())
    }

    fn check_acyclic(&self, root: &str, edge: Edge) -> Result<(), HarnessError> {
        let mut marks = HashMap::new();
        let mut stack = Vec::new();
        self.walk(root, edge, &mut marks, &mut stack)
    }

    fn walk<'a>(
        &'a self,
        name: &str,
        edge: Edge,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Result<(), HarnessError> {
        let case = self.case(name)?;
        let name = case.name.as_str();
        match marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Active) => {
                let start = stack.iter().position(|n| *n == name).unwrap_or(0);
                let mut path: Vec<String> = stack[start..].iter().map(|n| n.to_string()).collect();
                path.push(name.to_string());
                return Err(HarnessError::Cycle { path });
            }
            None => {}
        }

        marks.insert(name, Mark::Active);
        stack.push(name);
        let next = match edge {
            Edge::Dependency => &case.dependencies,
            Edge::Teardown => &case.teardowns,
        };
        for child in next {
            if !self.index.contains_key(child) {
                return Err(HarnessError::UnknownDependency {
                    test: name.to_string(),
                    dependency: child.clone(),
                });
            }
            self.walk(child, edge, marks, stack)?;
        }
        stack.pop();
        marks.insert(name, Mark::Done);
        Ok(())
    }

    /// Runs every registered test once, in registration order.
    pub fn run_all(&mut self, ctx: &C) -> Result<(), HarnessError> {
        let names: Vec<String> = self.tests.iter().map(|case| case.name.clone()).collect();
        for name in names {
            self.run(&name, ctx)?;
        }
        Ok(())
    }

    /// Graphviz DOT rendering of the prerequisite graph. Teardowns are drawn
    /// as dashed edges.
    pub fn dependency_graph(&self) -> String {
        let mut out = String::from("digraph dependencies {\n");
        for case in &self.tests {
            out.push_str(&format!("    \"{}\";\n", case.name));
        }
        for case in &self.tests {
            for dep in &case.dependencies {
                out.push_str(&format!("    \"{}\" -> \"{}\";\n", case.name, dep));
            }
        }
        for case in &self.tests {
            for teardown in &case.teardowns {
                out.push_str(&format!(
                    "    \"{}\" -> \"{}\" [style=dashed];\n",
                    case.name, teardown
                ));
            }
        }
        out.push_str("}\n");
        out
    }
}

impl<C> fmt::Debug for Registry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("tests", &self.tests)
            .field("ledger", &self.ledger)
            .finish()
    }
}
