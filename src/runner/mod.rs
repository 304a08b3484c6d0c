//! Test runner module
//!
//! Drives the external Mozmill command line for one build at a time.

mod options;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use tokio::process::Command;
use tracing::{debug, info};

pub use options::RunnerOptions;

/// Which Mozmill front-end runs the tests
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunnerMode {
    /// Single application session
    #[default]
    Standard,
    /// Restarts the application between test phases
    Restart,
}

impl RunnerMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "standard" | "default" => Some(RunnerMode::Standard),
            "restart" => Some(RunnerMode::Restart),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RunnerMode::Standard => "standard",
            RunnerMode::Restart => "restart",
        }
    }
}

impl fmt::Display for RunnerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of one runner invocation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunnerOutput {
    /// Exit code, `None` when terminated by a signal
    pub exit_code: Option<i32>,
    pub success: bool,
    pub duration_ms: u64,
}

/// Runs the tests for one build
#[async_trait]
pub trait RunnerAdapter: Send + Sync {
    fn mode(&self) -> RunnerMode;

    /// Run with fully resolved options and wait for completion
    async fn execute(&self, options: &RunnerOptions) -> Result<RunnerOutput>;
}

/// Shared invocation of a Mozmill executable
#[derive(Clone, Debug)]
struct MozmillCommand {
    program: String,
}

impl MozmillCommand {
    async fn execute(&self, options: &RunnerOptions) -> Result<RunnerOutput> {
        let args = options.to_args();
        debug!("Running {} {:?}", self.program, args);

        let start = Instant::now();
        // Output goes straight to our stdout/stderr
        let status = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .status()
            .await
            .with_context(|| format!("Failed to start {}", self.program))?;

        let output = RunnerOutput {
            exit_code: status.code(),
            success: status.success(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "{} finished with {} in {}ms",
            self.program, status, output.duration_ms
        );
        Ok(output)
    }
}

/// Standard single-session Mozmill run
#[derive(Clone, Debug)]
pub struct StandardRunner {
    command: MozmillCommand,
}

impl StandardRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            command: MozmillCommand {
                program: program.into(),
            },
        }
    }
}

impl Default for StandardRunner {
    fn default() -> Self {
        Self::new("mozmill")
    }
}

#[async_trait]
impl RunnerAdapter for StandardRunner {
    fn mode(&self) -> RunnerMode {
        RunnerMode::Standard
    }

    async fn execute(&self, options: &RunnerOptions) -> Result<RunnerOutput> {
        self.command.execute(options).await
    }
}

/// Mozmill run that restarts the application between tests
#[derive(Clone, Debug)]
pub struct RestartRunner {
    command: MozmillCommand,
}

impl RestartRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            command: MozmillCommand {
                program: program.into(),
            },
        }
    }
}

impl Default for RestartRunner {
    fn default() -> Self {
        Self::new("mozmill-restart")
    }
}

#[async_trait]
impl RunnerAdapter for RestartRunner {
    fn mode(&self) -> RunnerMode {
        RunnerMode::Restart
    }

    async fn execute(&self, options: &RunnerOptions) -> Result<RunnerOutput> {
        self.command.execute(options).await
    }
}

/// Create the adapter for `mode` using the given executables
pub fn adapter_for(mode: RunnerMode, standard: &str, restart: &str) -> Box<dyn RunnerAdapter> {
    match mode {
        RunnerMode::Standard => Box::new(StandardRunner::new(standard)),
        RunnerMode::Restart => Box::new(RestartRunner::new(restart)),
    }
}
