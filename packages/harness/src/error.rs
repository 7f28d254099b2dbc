use thiserror::Error;

/// Fatal problems with how the suite is wired together, or a test body that
/// bailed out with an error instead of a verdict.
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("no test registered under the name '{0}'")]
    UnknownTest(String),

    #[error("test '{test}' depends on '{dependency}', which is not registered")]
    UnknownDependency { test: String, dependency: String },

    #[error("a test named '{0}' is already registered")]
    DuplicateTest(String),

    #[error("dependency cycle: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("test '{test}' aborted: {source:#}")]
    TestAborted {
        test: String,
        #[source]
        source: anyhow::Error,
    },
}
