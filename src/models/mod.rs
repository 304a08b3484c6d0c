//! Data models for test-runs
//!
//! Binaries under test and the results collected for them.

mod binary;
mod run_result;

pub use binary::{is_installer, BinaryEntry};
#[cfg(test)]
pub use binary::BinaryKind;
pub use run_result::{BinaryOutcome, BinaryStatus, RunReport, Stage};
