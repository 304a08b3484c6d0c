//! Test-run orchestration
//!
//! Clones the test repository once, then provisions, tests and cleans up
//! each binary in turn. A failing binary is recorded in the report and the
//! run moves on to the next one. The checkout is always removed at the end.

use chrono::Utc;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::build::{BuildProvisioner, ProvisionedBuild};
use crate::error::{Result, RunError};
use crate::models::{BinaryEntry, BinaryOutcome, RunReport, Stage};
use crate::repository::{BranchConvention, RepositoryProvisioner, Vcs, DEFAULT_REPOSITORY_URL};
use crate::runner::{RunnerAdapter, RunnerOptions};
use crate::utils::{bounded, Timer};

/// Time limits for collaborator calls, `None` waits forever
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Timeouts {
    pub clone: Option<Duration>,
    pub update: Option<Duration>,
    pub install: Option<Duration>,
    pub run: Option<Duration>,
}

/// Everything a single test-run needs to know
#[derive(Clone, Debug)]
pub struct RunConfiguration {
    /// Binaries in execution order
    pub binaries: Vec<BinaryEntry>,
    pub repository_url: String,
    /// Test location relative to the repository checkout
    pub test_path: PathBuf,
    pub report_url: Option<String>,
    /// Pass-through options for every runner invocation
    pub runner_options: RunnerOptions,
    pub branch_convention: BranchConvention,
    pub temp_root: Option<PathBuf>,
    pub timeouts: Timeouts,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            binaries: Vec::new(),
            repository_url: DEFAULT_REPOSITORY_URL.to_string(),
            test_path: PathBuf::new(),
            report_url: None,
            runner_options: RunnerOptions::default(),
            branch_convention: BranchConvention::default(),
            temp_root: None,
            timeouts: Timeouts::default(),
        }
    }
}

impl RunConfiguration {
    pub fn new(binaries: Vec<BinaryEntry>) -> Self {
        Self {
            binaries,
            ..Default::default()
        }
    }

    pub fn repository_url(mut self, url: impl Into<String>) -> Self {
        self.repository_url = url.into();
        self
    }

    pub fn test_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.test_path = path.into();
        self
    }

    pub fn report_url(mut self, url: Option<String>) -> Self {
        self.report_url = url;
        self
    }

    pub fn runner_options(mut self, options: RunnerOptions) -> Self {
        self.runner_options = options;
        self
    }

    pub fn branch_convention(mut self, convention: BranchConvention) -> Self {
        self.branch_convention = convention;
        self
    }

    pub fn temp_root(mut self, root: Option<PathBuf>) -> Self {
        self.temp_root = root;
        self
    }

    pub fn timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

/// Orchestrator state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Idle,
    RepoCloned,
    BuildProvisioned,
    BranchSelected,
    Running,
    BuildCleaned,
    RepoCleaned,
    Done,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::RepoCloned => "repo-cloned",
            RunState::BuildProvisioned => "build-provisioned",
            RunState::BranchSelected => "branch-selected",
            RunState::Running => "running",
            RunState::BuildCleaned => "build-cleaned",
            RunState::RepoCleaned => "repo-cleaned",
            RunState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Failure of one step of a binary's iteration
#[derive(Debug)]
struct StepFailure {
    stage: Stage,
    error: RunError,
}

fn at(stage: Stage) -> impl Fn(RunError) -> StepFailure {
    move |error| StepFailure { stage, error }
}

/// Per-binary scratch state
#[derive(Default)]
struct Iteration {
    build: Option<ProvisionedBuild>,
    branch: Option<String>,
    exit_code: Option<i32>,
}

/// Drives a complete test-run
pub struct TestRun {
    config: RunConfiguration,
    repository: RepositoryProvisioner,
    builds: BuildProvisioner,
    runner: Box<dyn RunnerAdapter>,
    state: RunState,
    history: Vec<RunState>,
}

impl TestRun {
    pub fn new(
        config: RunConfiguration,
        vcs: Arc<dyn Vcs>,
        builds: BuildProvisioner,
        runner: Box<dyn RunnerAdapter>,
    ) -> Self {
        let repository = RepositoryProvisioner::new(vcs, config.repository_url.clone())
            .with_convention(config.branch_convention.clone())
            .with_temp_root(config.temp_root.clone())
            .with_timeouts(config.timeouts.clone, config.timeouts.update);
        let builds = builds
            .with_temp_root(config.temp_root.clone())
            .with_timeout(config.timeouts.install);

        Self {
            config,
            repository,
            builds,
            runner,
            state: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Every state entered so far, in order
    #[cfg(test)]
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    #[cfg(test)]
    pub fn config(&self) -> &RunConfiguration {
        &self.config
    }

    /// Run the tests for all binaries.
    ///
    /// Only a failed clone is returned as an error. Per-binary failures are
    /// part of the returned report.
    pub async fn run(&mut self) -> Result<RunReport> {
        let started_at = Utc::now();
        let timer = Timer::start("Test-run");
        info!(
            "Starting {} test-run for {} binaries",
            self.runner.mode(),
            self.config.binaries.len()
        );

        let checkout = match self.repository.clone().await {
            Ok(path) => path.to_path_buf(),
            Err(e) => {
                error!("{}", e);
                return Err(e);
            }
        };
        self.transition(RunState::RepoCloned);

        let test_path = checkout.join(&self.config.test_path);
        let binaries = self.config.binaries.clone();
        let mut outcomes = Vec::with_capacity(binaries.len());

        for (index, entry) in binaries.iter().enumerate() {
            info!("=== Binary {}/{}: {} ===", index + 1, binaries.len(), entry);
            outcomes.push(self.run_binary(entry, &test_path).await);
        }

        if let Err(e) = self.repository.remove() {
            warn!("Failed to remove test repository: {}", e);
        }
        self.transition(RunState::RepoCleaned);

        let report = RunReport::new(
            self.config.repository_url.clone(),
            self.runner.mode().name(),
            started_at,
            outcomes,
        );
        self.transition(RunState::Done);

        info!(
            "Test-run completed in {}ms - Pass: {}/{}",
            timer.stop().as_millis(),
            report.passed,
            report.total
        );
        Ok(report)
    }

    async fn run_binary(&mut self, entry: &BinaryEntry, test_path: &Path) -> BinaryOutcome {
        let timer = Timer::start(entry.name());
        let mut iteration = Iteration::default();

        let result = self.exercise(entry, test_path, &mut iteration).await;

        let cleanup = match iteration.build.take() {
            Some(build) => self.builds.uninstall(build).await,
            None => Ok(()),
        };
        self.transition(RunState::BuildCleaned);

        let duration_ms = timer.stop().as_millis() as u64;

        let outcome = match (result, cleanup) {
            (Ok(()), Ok(())) => {
                info!("{} passed", entry.name());
                BinaryOutcome::passed(entry, duration_ms)
            }
            (Err(failure), cleanup) => {
                if let Err(e) = cleanup {
                    warn!("Cleanup of {} failed: {}", entry.name(), e);
                }
                error!("{} failed during {}: {}", entry.name(), failure.stage, failure.error);
                BinaryOutcome::failed(entry, failure.stage, duration_ms, failure.error.to_string())
            }
            (Ok(()), Err(e)) => {
                error!("Cleanup of {} failed: {}", entry.name(), e);
                BinaryOutcome::failed(entry, Stage::Cleanup, duration_ms, e.to_string())
            }
        };

        outcome
            .with_branch(iteration.branch)
            .with_exit_code(iteration.exit_code)
    }

    async fn exercise(
        &mut self,
        entry: &BinaryEntry,
        test_path: &Path,
        iteration: &mut Iteration,
    ) -> std::result::Result<(), StepFailure> {
        let build = self
            .builds
            .install(entry)
            .await
            .map_err(at(Stage::Provision))?;
        let folder = build.folder().to_path_buf();
        iteration.build = Some(build);

        let executable = self
            .builds
            .resolve_executable(&folder)
            .map_err(at(Stage::Provision))?;
        self.transition(RunState::BuildProvisioned);

        let ini = self
            .builds
            .layout()
            .read_ini(&folder)
            .map_err(|e| RunError::BranchSelection(format!("{e:#}")))
            .map_err(at(Stage::SelectBranch))?;
        let source = ini
            .source_repository()
            .ok_or_else(|| {
                RunError::BranchSelection(format!(
                    "no SourceRepository in application.ini of {}",
                    folder.display()
                ))
            })
            .map_err(at(Stage::SelectBranch))?;
        let branch = self
            .repository
            .select_branch(source)
            .await
            .map_err(at(Stage::SelectBranch))?;
        iteration.branch = Some(branch);
        self.transition(RunState::BranchSelected);

        let options = self.config.runner_options.for_build(
            executable,
            test_path,
            self.config.report_url.clone(),
        );
        self.transition(RunState::Running);

        let runner = &self.runner;
        let output = bounded("Test execution", self.config.timeouts.run, async {
            runner
                .execute(&options)
                .await
                .map_err(|e| RunError::Execution(format!("{e:#}")))
        })
        .await
        .map_err(at(Stage::Execute))?;
        iteration.exit_code = output.exit_code;

        if !output.success {
            let status = output
                .exit_code
                .map(|c| format!("exit code {c}"))
                .unwrap_or_else(|| "a signal".to_string());
            return Err(StepFailure {
                stage: Stage::Execute,
                error: RunError::Execution(format!("runner terminated with {status}")),
            });
        }

        Ok(())
    }

    fn transition(&mut self, next: RunState) {
        debug!("State {} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }
}
