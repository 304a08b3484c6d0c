//! Error types for test-runs
//!
//! Failures before the per-binary loop abort the run. Everything raised
//! inside the loop is recorded against the binary and the run continues.

use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias using RunError
pub type Result<T> = std::result::Result<T, RunError>;

/// Test-run error
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Path '{}' cannot be found", .0.display())]
    PathNotFound(PathBuf),

    #[error("Failure in setting up the test repository: {0}")]
    RepositoryProvisioning(String),

    #[error("Failed to select test branch: {0}")]
    BranchSelection(String),

    #[error("Failed to provision build '{}': {reason}", .path.display())]
    BuildProvisioning { path: PathBuf, reason: String },

    #[error("No application binary found in '{}'", .0.display())]
    ApplicationNotFound(PathBuf),

    #[error("Test execution failed: {0}")]
    Execution(String),

    #[error("{operation} timed out after {limit:?}")]
    Timeout { operation: String, limit: Duration },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl RunError {
    pub fn build_provisioning(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        RunError::BuildProvisioning {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
