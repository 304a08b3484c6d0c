//! Results storage module
//!
//! Provides persistent storage for test-run reports.

mod storage;

pub use storage::{ExportFormat, ReportStorage, StoredRun};
