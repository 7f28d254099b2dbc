use harness::{HarnessError, Outcome, Registry, TestCase};
use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};

#[derive(Default)]
struct Spy {
    calls: RefCell<Vec<&'static str>>,
}

impl Spy {
    fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    fn count(&self, name: &str) -> usize {
        self.calls.borrow().iter().filter(|n| **n == name).count()
    }
}

fn case(name: &'static str, verdict: bool) -> TestCase<Spy> {
    TestCase::new(name, move |spy: &Spy| {
        spy.calls.borrow_mut().push(name);
        Ok(verdict)
    })
}

#[test]
fn test_chain_stops_at_failed_dependency() {
    let mut registry = Registry::new();
    registry.register(case("A", true)).unwrap();
    registry.register(case("B", true).depends_on(["A"])).unwrap();
    registry.register(case("C", false).depends_on(["B"])).unwrap();
    registry.register(case("D", true).depends_on(["C"])).unwrap();

    let spy = Spy::default();
    let outcome = registry.run_with_dependencies("D", &spy).unwrap();

    assert_eq!(spy.calls(), vec!["A", "B", "C"]);
    assert_eq!(outcome, Some(Outcome::Unresolved));
    assert_eq!(registry.outcome("A"), Some(Outcome::Passed));
    assert_eq!(registry.outcome("B"), Some(Outcome::Passed));
    assert_eq!(registry.outcome("C"), Some(Outcome::Failed));
    assert_eq!(registry.outcome("D"), Some(Outcome::Unresolved));
}

#[test]
fn test_run_skips_body_when_dependency_failed() {
    let mut registry = Registry::new();
    registry.register(case("LOGIN", false)).unwrap();
    registry
        .register(case("LOGOUT", true).depends_on(["LOGIN"]))
        .unwrap();

    let spy = Spy::default();
    registry.run("LOGIN", &spy).unwrap();
    let outcome = registry.run("LOGOUT", &spy).unwrap();

    assert_eq!(outcome, Some(Outcome::Unresolved));
    assert_eq!(spy.count("LOGOUT"), 0);
}

#[test]
fn test_run_skips_body_when_dependency_not_run() {
    let mut registry = Registry::new();
    registry.register(case("LOGIN", true)).unwrap();
    registry
        .register(case("LOGOUT", true).depends_on(["LOGIN"]))
        .unwrap();

    let spy = Spy::default();
    let outcome = registry.run("LOGOUT", &spy).unwrap();

    assert_eq!(outcome, Some(Outcome::Unresolved));
    assert!(spy.calls().is_empty());
    assert_eq!(registry.outcome("LOGIN"), Some(Outcome::NotRun));
}

#[test]
fn test_run_skips_body_when_dependency_unresolved() {
    let mut registry = Registry::new();
    registry.register(case("A", true)).unwrap();
    registry.register(case("B", true).depends_on(["A"])).unwrap();
    registry.register(case("C", true).depends_on(["B"])).unwrap();

    let spy = Spy::default();
    registry.run("B", &spy).unwrap();
    assert_eq!(registry.outcome("B"), Some(Outcome::Unresolved));

    registry.run("C", &spy).unwrap();
    assert_eq!(registry.outcome("C"), Some(Outcome::Unresolved));
    assert!(spy.calls().is_empty());
}

#[test]
fn test_unresolved_test_can_run_once_dependencies_pass() {
    let mut registry = Registry::new();
    registry.register(case("A", true)).unwrap();
    registry.register(case("B", true).depends_on(["A"])).unwrap();

    let spy = Spy::default();
    registry.run("B", &spy).unwrap();
    registry.run("A", &spy).unwrap();
    let outcome = registry.run("B", &spy).unwrap();

    assert_eq!(outcome, Some(Outcome::Passed));
    assert_eq!(spy.calls(), vec!["A", "B"]);
}

#[test]
fn test_second_run_is_a_no_op() {
    let mut registry = Registry::new();
    registry.register(case("LOGIN", true)).unwrap();
    registry.register(case("LOGOUT", false)).unwrap();

    let spy = Spy::default();
    assert_eq!(registry.run("LOGIN", &spy).unwrap(), Some(Outcome::Passed));
    assert_eq!(registry.run("LOGIN", &spy).unwrap(), None);
    assert_eq!(registry.run("LOGOUT", &spy).unwrap(), Some(Outcome::Failed));
    assert_eq!(registry.run("LOGOUT", &spy).unwrap(), None);

    assert_eq!(spy.count("LOGIN"), 1);
    assert_eq!(spy.count("LOGOUT"), 1);
}

#[test]
fn test_error_in_body_propagates_and_records_failure() {
    let mut registry: Registry<Spy> = Registry::new();
    registry
        .register(TestCase::new("X", |_: &Spy| -> anyhow::Result<bool> {
            anyhow::bail!("runtime error in test body")
        }))
        .unwrap();

    let err = registry.run("X", &Spy::default()).unwrap_err();

    match err {
        HarnessError::TestAborted { test, source } => {
            assert_eq!(test, "X");
            assert!(source.to_string().contains("runtime error"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(registry.outcome("X"), Some(Outcome::Failed));
}

#[test]
fn test_panic_in_body_leaves_failure_recorded() {
    let mut registry: Registry<Spy> = Registry::new();
    registry
        .register(TestCase::new("X", |_: &Spy| -> anyhow::Result<bool> {
            panic!("element vanished")
        }))
        .unwrap();

    let spy = Spy::default();
    let result = catch_unwind(AssertUnwindSafe(|| registry.run("X", &spy)));

    assert!(result.is_err());
    assert_eq!(registry.outcome("X"), Some(Outcome::Failed));
}

#[test]
fn test_body_without_verdict_is_failed() {
    let mut registry: Registry<Spy> = Registry::new();
    registry
        .register(TestCase::new("UNIT", |_: &Spy| Ok(())))
        .unwrap();
    registry
        .register(TestCase::new("NONE", |_: &Spy| Ok(None::<bool>)))
        .unwrap();
    registry
        .register(TestCase::new("SOME", |_: &Spy| Ok(Some(true))))
        .unwrap();

    let spy = Spy::default();
    assert_eq!(registry.run("UNIT", &spy).unwrap(), Some(Outcome::Failed));
    assert_eq!(registry.run("NONE", &spy).unwrap(), Some(Outcome::Failed));
    assert_eq!(registry.run("SOME", &spy).unwrap(), Some(Outcome::Passed));
    assert_eq!(registry.outcome("UNIT"), Some(Outcome::Failed));
}

#[test]
fn test_duplicate_registration_rejected() {
    let mut registry = Registry::new();
    let handle = registry.register(case("LOGIN", true)).unwrap();
    assert_eq!(handle.name(), "LOGIN");

    let err = registry.register(case("LOGIN", false)).unwrap_err();
    assert!(matches!(err, HarnessError::DuplicateTest(name) if name == "LOGIN"));
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_unknown_test_is_an_error() {
    let mut registry: Registry<Spy> = Registry::new();
    let err = registry.run("MISSING", &Spy::default()).unwrap_err();
    assert!(matches!(err, HarnessError::UnknownTest(name) if name == "MISSING"));
}

#[test]
fn test_unknown_dependency_is_fatal_and_body_not_run() {
    let mut registry = Registry::new();
    registry
        .register(case("SIGNUP", true).depends_on(["LOGIN"]))
        .unwrap();

    let spy = Spy::default();
    let err = registry.run("SIGNUP", &spy).unwrap_err();
    assert!(matches!(
        err,
        HarnessError::UnknownDependency { ref test, ref dependency }
            if test == "SIGNUP" && dependency == "LOGIN"
    ));
    assert!(spy.calls().is_empty());
    assert_eq!(registry.outcome("SIGNUP"), Some(Outcome::NotRun));

    let err = registry.run_with_dependencies("SIGNUP", &spy).unwrap_err();
    assert!(matches!(err, HarnessError::UnknownDependency { .. }));
}

#[test]
fn test_run_all_follows_registration_order() {
    let mut registry = Registry::new();
    registry.register(case("ZULU", true)).unwrap();
    registry.register(case("ALPHA", true).depends_on(["ZULU"])).unwrap();
    registry.register(case("MIKE", false)).unwrap();
    registry.register(case("BRAVO", true).depends_on(["MIKE"])).unwrap();

    let spy = Spy::default();
    registry.run_all(&spy).unwrap();

    assert_eq!(spy.calls(), vec!["ZULU", "ALPHA", "MIKE"]);
    assert_eq!(registry.outcome("BRAVO"), Some(Outcome::Unresolved));
    assert_eq!(
        registry.names().collect::<Vec<_>>(),
        vec!["ZULU", "ALPHA", "MIKE", "BRAVO"]
    );
}
