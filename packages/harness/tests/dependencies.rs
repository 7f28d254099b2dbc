use harness::{HarnessError, Outcome, Registry, TestCase};
use std::cell::RefCell;

#[derive(Default)]
struct Spy {
    calls: RefCell<Vec<&'static str>>,
}

impl Spy {
    fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }
}

fn case(name: &'static str, verdict: bool) -> TestCase<Spy> {
    TestCase::new(name, move |spy: &Spy| {
        spy.calls.borrow_mut().push(name);
        Ok(verdict)
    })
}

fn position(calls: &[&str], name: &str) -> usize {
    calls
        .iter()
        .position(|n| *n == name)
        .unwrap_or_else(|| panic!("{name} was not called"))
}

#[test]
fn test_diamond_runs_each_dependency_once_in_topological_order() {
    let mut registry = Registry::new();
    registry.register(case("LOGIN", true)).unwrap();
    registry
        .register(case("GLOBAL_NAV", true).depends_on(["LOGIN"]))
        .unwrap();
    registry
        .register(case("LOGOUT", true).depends_on(["LOGIN", "GLOBAL_NAV"]))
        .unwrap();
    registry
        .register(case("SIGNUP", true).depends_on(["LOGIN", "LOGOUT"]))
        .unwrap();

    let spy = Spy::default();
    let outcome = registry.run_with_dependencies("SIGNUP", &spy).unwrap();

    let calls = spy.calls();
    assert_eq!(outcome, Some(Outcome::Passed));
    assert_eq!(calls.len(), 4);
    assert!(position(&calls, "LOGIN") < position(&calls, "GLOBAL_NAV"));
    assert!(position(&calls, "GLOBAL_NAV") < position(&calls, "LOGOUT"));
    assert!(position(&calls, "LOGOUT") < position(&calls, "SIGNUP"));
}

#[test]
fn test_attempted_dependencies_are_not_rerun() {
    let mut registry = Registry::new();
    registry.register(case("LOGIN", true)).unwrap();
    registry
        .register(case("LOGIN_THROTTLE", false).depends_on(["LOGIN"]))
        .unwrap();
    registry
        .register(case("LOGIN_TIMEOUT", true).depends_on(["LOGIN_THROTTLE"]))
        .unwrap();

    let spy = Spy::default();
    registry.run("LOGIN", &spy).unwrap();
    registry.run("LOGIN_THROTTLE", &spy).unwrap();
    let outcome = registry
        .run_with_dependencies("LOGIN_TIMEOUT", &spy)
        .unwrap();

    assert_eq!(spy.calls(), vec!["LOGIN", "LOGIN_THROTTLE"]);
    assert_eq!(outcome, Some(Outcome::Unresolved));
}

#[test]
fn test_teardown_runs_after_target() {
    let mut registry = Registry::new();
    registry.register(case("LOGIN", true)).unwrap();
    registry
        .register(
            case("SIGNUP", true)
                .depends_on(["LOGIN"])
                .teardown("DELETE_USER"),
        )
        .unwrap();
    registry
        .register(case("WELCOME_EMAIL", true).depends_on(["SIGNUP"]))
        .unwrap();
    registry
        .register(case("DELETE_USER", true).depends_on(["LOGIN", "SIGNUP"]))
        .unwrap();

    let spy = Spy::default();
    registry
        .run_with_dependencies("WELCOME_EMAIL", &spy)
        .unwrap();

    assert_eq!(
        spy.calls(),
        vec!["LOGIN", "SIGNUP", "WELCOME_EMAIL", "DELETE_USER"]
    );
    assert_eq!(registry.outcome("DELETE_USER"), Some(Outcome::Passed));
}

#[test]
fn test_teardown_runs_once_for_shared_owner() {
    let mut registry = Registry::new();
    registry
        .register(case("A", true).teardown("CLEAN"))
        .unwrap();
    registry
        .register(case("B", true).depends_on(["A"]).teardown("CLEAN"))
        .unwrap();
    registry.register(case("CLEAN", true)).unwrap();

    let spy = Spy::default();
    registry.run_with_dependencies("B", &spy).unwrap();

    assert_eq!(spy.calls(), vec!["A", "B", "CLEAN"]);
}

#[test]
fn test_teardown_of_failed_target_still_runs() {
    let mut registry = Registry::new();
    registry.register(case("LOGIN", true)).unwrap();
    registry
        .register(
            case("SIGNUP", false)
                .depends_on(["LOGIN"])
                .teardown("CLEANUP"),
        )
        .unwrap();
    registry.register(case("CLEANUP", true)).unwrap();

    let spy = Spy::default();
    registry.run_with_dependencies("SIGNUP", &spy).unwrap();

    assert_eq!(spy.calls(), vec!["LOGIN", "SIGNUP", "CLEANUP"]);
}

#[test]
fn test_teardown_with_unmet_dependency_is_unresolved() {
    let mut registry = Registry::new();
    registry.register(case("LOGIN", true)).unwrap();
    registry
        .register(
            case("SIGNUP", false)
                .depends_on(["LOGIN"])
                .teardown("DELETE_USER"),
        )
        .unwrap();
    registry
        .register(case("DELETE_USER", true).depends_on(["LOGIN", "SIGNUP"]))
        .unwrap();

    let spy = Spy::default();
    registry.run_with_dependencies("SIGNUP", &spy).unwrap();

    assert_eq!(spy.calls(), vec!["LOGIN", "SIGNUP"]);
    assert_eq!(registry.outcome("DELETE_USER"), Some(Outcome::Unresolved));
}

#[test]
fn test_cycle_is_rejected_before_any_body_runs() {
    let mut registry = Registry::new();
    registry.register(case("A", true).depends_on(["C"])).unwrap();
    registry.register(case("B", true).depends_on(["A"])).unwrap();
    registry.register(case("C", true).depends_on(["B"])).unwrap();
    registry.register(case("D", true).depends_on(["C"])).unwrap();

    let spy = Spy::default();
    let err = registry.run_with_dependencies("D", &spy).unwrap_err();

    match err {
        HarnessError::Cycle { path } => {
            assert_eq!(path.first(), path.last());
            assert_eq!(path.len(), 4);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(spy.calls().is_empty());
    assert_eq!(registry.outcome("D"), Some(Outcome::NotRun));
}

#[test]
fn test_cycle_behind_a_teardown_is_rejected_before_any_body_runs() {
    let mut registry = Registry::new();
    registry
        .register(case("SIGNUP", true).teardown("DELETE_USER"))
        .unwrap();
    registry
        .register(case("DELETE_USER", true).depends_on(["ADMIN_LOGIN"]))
        .unwrap();
    registry
        .register(case("ADMIN_LOGIN", true).depends_on(["DELETE_USER"]))
        .unwrap();

    let spy = Spy::default();
    let err = registry.run_with_dependencies("SIGNUP", &spy).unwrap_err();

    match err {
        HarnessError::Cycle { path } => {
            assert_eq!(path.first(), path.last());
            assert!(path.contains(&"DELETE_USER".to_string()));
            assert!(path.contains(&"ADMIN_LOGIN".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(spy.calls().is_empty());
    assert_eq!(registry.outcome("SIGNUP"), Some(Outcome::NotRun));
}

#[test]
fn test_resolved_target_does_not_trigger_teardowns() {
    let mut registry = Registry::new();
    registry
        .register(case("SIGNUP", true).teardown("DELETE_USER"))
        .unwrap();
    registry.register(case("DELETE_USER", true)).unwrap();

    let spy = Spy::default();
    registry.run("SIGNUP", &spy).unwrap();
    let outcome = registry.run_with_dependencies("SIGNUP", &spy).unwrap();

    assert_eq!(outcome, None);
    assert_eq!(spy.calls(), vec!["SIGNUP"]);
    assert_eq!(registry.outcome("DELETE_USER"), Some(Outcome::NotRun));
}

#[test]
fn test_validate_reports_cycle_and_unknown_names() {
    let mut registry = Registry::new();
    registry.register(case("A", true).depends_on(["B"])).unwrap();
    registry.register(case("B", true).depends_on(["A"])).unwrap();
    assert!(matches!(
        registry.validate(),
        Err(HarnessError::Cycle { .. })
    ));

    let mut registry = Registry::new();
    registry
        .register(case("A", true).teardown("MISSING"))
        .unwrap();
    assert!(matches!(
        registry.validate(),
        Err(HarnessError::UnknownDependency { ref dependency, .. }) if dependency == "MISSING"
    ));
}

#[test]
fn test_teardown_depending_on_its_owner_is_valid() {
    let mut registry = Registry::new();
    registry.register(case("LOGIN", true)).unwrap();
    registry
        .register(case("SIGNUP", true).teardown("DELETE_USER"))
        .unwrap();
    registry
        .register(case("DELETE_USER", true).depends_on(["LOGIN", "SIGNUP"]))
        .unwrap();

    assert!(registry.validate().is_ok());
}

#[test]
fn test_dependency_graph_lists_nodes_and_edges_once() {
    let mut registry = Registry::new();
    registry.register(case("LOGIN", true)).unwrap();
    registry
        .register(
            case("SIGNUP", true)
                .depends_on(["LOGIN", "LOGIN"])
                .teardown("DELETE_USER"),
        )
        .unwrap();
    registry
        .register(case("DELETE_USER", true).depends_on(["LOGIN", "SIGNUP"]))
        .unwrap();

    let dot = registry.dependency_graph();

    assert!(dot.starts_with("digraph dependencies {"));
    assert!(dot.trim_end().ends_with('}'));
    assert_eq!(dot.matches("\"SIGNUP\" -> \"LOGIN\";").count(), 1);
    assert_eq!(dot.matches("\"DELETE_USER\" -> \"SIGNUP\";").count(), 1);
    assert_eq!(
        dot.matches("\"SIGNUP\" -> \"DELETE_USER\" [style=dashed];")
            .count(),
        1
    );
    let solid_edges = dot
        .lines()
        .filter(|line| line.contains("->") && !line.contains("dashed"))
        .count();
    assert_eq!(solid_edges, 3);
    let nodes = dot
        .lines()
        .filter(|line| line.trim_end().ends_with("\";") && !line.contains("->"))
        .count();
    assert_eq!(nodes, 3);
}
