//! Test-run result models
//!
//! Per-binary outcomes and the report returned by a test-run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::binary::{BinaryEntry, BinaryKind};

/// Step of a per-binary iteration
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Provision,
    SelectBranch,
    Execute,
    Cleanup,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Provision => "provision",
            Stage::SelectBranch => "select-branch",
            Stage::Execute => "execute",
            Stage::Cleanup => "cleanup",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Final status of one binary
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryStatus {
    Passed,
    Failed,
}

impl BinaryStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryStatus::Passed => "✓",
            BinaryStatus::Failed => "✗",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, BinaryStatus::Passed)
    }
}

impl fmt::Display for BinaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryStatus::Passed => write!(f, "PASS"),
            BinaryStatus::Failed => write!(f, "FAIL"),
        }
    }
}

/// Outcome of testing a single binary
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BinaryOutcome {
    pub binary: PathBuf,
    pub kind: BinaryKind,
    pub status: BinaryStatus,
    /// Step that failed, if any
    pub stage: Option<Stage>,
    pub message: Option<String>,
    /// Test-suite branch the binary ran against
    pub branch: Option<String>,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
}

impl BinaryOutcome {
    pub fn passed(entry: &BinaryEntry, duration_ms: u64) -> Self {
        Self {
            binary: entry.path().to_path_buf(),
            kind: entry.kind(),
            status: BinaryStatus::Passed,
            stage: None,
            message: None,
            branch: None,
            exit_code: None,
            duration_ms,
        }
    }

    pub fn failed(
        entry: &BinaryEntry,
        stage: Stage,
        duration_ms: u64,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status: BinaryStatus::Failed,
            stage: Some(stage),
            message: Some(message.into()),
            ..Self::passed(entry, duration_ms)
        }
    }

    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }

    pub fn name(&self) -> String {
        self.binary
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.binary.display().to_string())
    }
}

impl fmt::Display for BinaryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.status.symbol(),
            self.binary.display(),
            self.duration_ms
        )?;
        if let Some(stage) = self.stage {
            write!(f, " ({stage})")?;
        }
        if let Some(msg) = &self.message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

/// Ordered report of a whole test-run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub repository_url: String,
    pub mode: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub total_duration_ms: u64,
    pub outcomes: Vec<BinaryOutcome>,
}

impl RunReport {
    pub fn new(
        repository_url: impl Into<String>,
        mode: impl Into<String>,
        started_at: DateTime<Utc>,
        outcomes: Vec<BinaryOutcome>,
    ) -> Self {
        let total = outcomes.len();
        let passed = outcomes
            .iter()
            .filter(|o| o.status == BinaryStatus::Passed)
            .count();
        let total_duration_ms = outcomes.iter().map(|o| o.duration_ms).sum();

        Self {
            repository_url: repository_url.into(),
            mode: mode.into(),
            started_at,
            completed_at: Utc::now(),
            total,
            passed,
            failed: total - passed,
            total_duration_ms,
            outcomes,
        }
    }

    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.passed as f64 / self.total as f64) * 100.0
        }
    }

    pub fn is_all_passed(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &BinaryOutcome> {
        self.outcomes.iter().filter(|o| !o.status.is_success())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Test-run ({}) against {}", self.mode, self.repository_url)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for outcome in &self.outcomes {
            writeln!(f, "  {outcome}")?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Duration: {}ms",
            self.total, self.passed, self.failed, self.total_duration_ms
        )
    }
}
