use crate::config::RunnerConfig;
use anyhow::{anyhow, Context, Result};
use harness::{HarnessError, Ledger, Registry, RunStatus};
use isaac::{suite, Artifacts, ChromeDriver, SuiteContext, TempAccount, TestUsers, User};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{info, warn};

/// What to run: the whole suite or one test with its prerequisites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    Single(String),
}

/// The ledger as the session left it, and why it stopped early if it did.
#[derive(Debug)]
pub struct SessionResult {
    pub ledger: Ledger,
    pub status: RunStatus,
    pub failure: Option<anyhow::Error>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs `body` against `registry`, turning an error or a panic into an
/// aborted result. The ledger is kept either way.
pub fn guarded<C>(
    registry: &mut Registry<C>,
    body: impl FnOnce(&mut Registry<C>) -> Result<()>,
) -> SessionResult {
    let failure = match panic::catch_unwind(AssertUnwindSafe(|| body(&mut *registry))) {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e),
        Err(payload) => Some(anyhow!("suite panicked: {}", panic_message(payload.as_ref()))),
    };
    SessionResult {
        ledger: registry.ledger().clone(),
        status: if failure.is_some() {
            RunStatus::Aborted
        } else {
            RunStatus::Finished
        },
        failure,
    }
}

/// Checks `target` names a registered test, then runs it.
pub fn execute<C>(registry: &mut Registry<C>, ctx: &C, target: &Target) -> Result<()> {
    match target {
        Target::All => registry.run_all(ctx)?,
        Target::Single(name) => {
            registry.run_with_dependencies(name, ctx)?;
        }
    }
    Ok(())
}

fn check_target<C>(registry: &Registry<C>, target: &Target) -> Result<(), HarnessError> {
    match target {
        Target::Single(name) if !registry.contains(name) => {
            Err(HarnessError::UnknownTest(name.clone()))
        }
        _ => Ok(()),
    }
}

fn start(config: &RunnerConfig) -> Result<SuiteContext> {
    let users = TestUsers::load(&config.users_file)?;
    let temp = TempAccount::new(
        User::new(&config.temp_email, "Temp", "Test", &config.temp_password),
        config.temp_new_email.clone(),
        config.temp_new_password.clone(),
    );
    info!("Launching Chrome (headless={}).", config.headless);
    let driver = ChromeDriver::launch(&config.launch_config()).context("launching Chrome")?;
    SuiteContext::start(
        Box::new(driver),
        config.suite_settings(),
        users,
        temp,
        Artifacts::new(config.output_dir.clone()),
    )
}

/// The result of a run that never reached the browser: every registered
/// test is still `NotRun`.
pub fn not_started(failure: anyhow::Error) -> SessionResult {
    let mut registry: Registry<SuiteContext> = Registry::new();
    if let Err(e) = suite::register_all(&mut registry) {
        warn!("Couldn't list the suite for the report: {}", e);
    }
    SessionResult {
        ledger: registry.ledger().clone(),
        status: RunStatus::Aborted,
        failure: Some(failure),
    }
}

/// One full browser session. Blocks until the suite is done; call it from
/// `spawn_blocking`.
pub fn run(config: &RunnerConfig, target: &Target) -> SessionResult {
    let mut registry = Registry::new();
    guarded(&mut registry, |registry| {
        suite::register_all(registry)?;
        registry.validate()?;
        check_target(registry, target)?;
        let ctx = start(config)?;
        let result = execute(registry, &ctx, target);
        info!("Closing the browser.");
        drop(ctx);
        result
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use harness::{Outcome, TestCase};

    fn registry() -> Registry<()> {
        let mut registry = Registry::new();
        registry
            .register(TestCase::new("LOGIN", |_: &()| Ok(true)))
            .unwrap();
        registry
            .register(
                TestCase::new("CRASH", |_: &()| -> Result<bool> { panic!("tab went away") })
                    .depends_on(["LOGIN"]),
            )
            .unwrap();
        registry
            .register(TestCase::new("LOGOUT", |_: &()| Ok(true)).depends_on(["LOGIN"]))
            .unwrap();
        registry
    }

    #[test]
    fn test_finished_run() {
        let mut registry = registry();
        let result = guarded(&mut registry, |registry| {
            execute(registry, &(), &Target::Single("LOGOUT".into()))
        });
        assert_eq!(result.status, RunStatus::Finished);
        assert!(result.failure.is_none());
        assert_eq!(result.ledger.get("LOGOUT"), Some(Outcome::Passed));
        assert_eq!(result.ledger.get("CRASH"), Some(Outcome::NotRun));
    }

    #[test]
    fn test_panic_aborts_but_keeps_ledger() {
        let mut registry = registry();
        let result = guarded(&mut registry, |registry| execute(registry, &(), &Target::All));
        assert_eq!(result.status, RunStatus::Aborted);
        let failure = result.failure.unwrap().to_string();
        assert!(failure.contains("tab went away"), "{failure}");
        assert_eq!(result.ledger.get("LOGIN"), Some(Outcome::Passed));
        assert_eq!(result.ledger.get("CRASH"), Some(Outcome::Failed));
        assert_eq!(result.ledger.get("LOGOUT"), Some(Outcome::NotRun));
    }

    #[test]
    fn test_error_aborts() {
        let mut registry = registry();
        let result = guarded(&mut registry, |registry| {
            check_target(registry, &Target::Single("SIGNUP".into()))?;
            Ok(())
        });
        assert_eq!(result.status, RunStatus::Aborted);
        assert!(result.failure.unwrap().to_string().contains("SIGNUP"));
    }

    #[test]
    fn test_not_started_lists_every_test_as_not_run() {
        let result = not_started(anyhow!("https://staging.isaacphysics.org is not responding"));
        assert_eq!(result.status, RunStatus::Aborted);
        assert!(result.failure.unwrap().to_string().contains("not responding"));
        assert!(!result.ledger.is_empty());
        assert!(result.ledger.iter().all(|(_, outcome)| outcome == Outcome::NotRun));
    }

    #[test]
    fn test_missing_users_file_aborts_before_browser() {
        let mut config = RunnerConfig::from_lookup(|_| None).unwrap();
        config.users_file = "/nonexistent/TestUsers.json".into();
        let result = run(&config, &Target::All);
        assert_eq!(result.status, RunStatus::Aborted);
        assert_eq!(result.ledger.len(), not_started(anyhow!("unused")).ledger.len());
        assert!(result.ledger.iter().all(|(_, outcome)| outcome == Outcome::NotRun));
    }
}
