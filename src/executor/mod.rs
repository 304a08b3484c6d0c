//! Test-run execution
//!
//! Sequential orchestration of repository, build and runner collaborators.

mod orchestrator;

pub use orchestrator::{RunConfiguration, TestRun, Timeouts};
