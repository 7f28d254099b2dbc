//! Dependency-aware registry and runner for named regression tests.
//!
//! Tests are registered into an explicit [`Registry`] together with the names
//! of the tests they depend on. Running a test checks its dependencies in the
//! [`Ledger`] first and records every outcome there.

pub mod error;
pub mod ledger;
pub mod registry;
pub mod report;

pub use error::HarnessError;
pub use ledger::{Ledger, Outcome};
pub use registry::{IntoVerdict, Registry, TestCase, TestHandle};
pub use report::{RunStatus, Summary};
