//! Configuration module
//!
//! Handles loading and managing configuration.

mod env;
mod file;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::build::{ApplicationLayout, Platform};
use crate::executor::Timeouts;
use crate::repository::{BranchConvention, VcsKind, DEFAULT_REPOSITORY_URL};
use crate::runner::{RunnerMode, RunnerOptions};

pub use env::{print_env_help, EnvConfig};
pub use file::load_config;

/// Application configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Test-suite repository settings
    pub repository: RepositoryConfig,

    /// Report server URL
    pub report_url: Option<String>,

    /// Mozmill settings
    pub runner: RunnerConfig,

    /// Build layout settings
    pub application: ApplicationConfig,

    /// Collaborator time limits
    pub timeouts: TimeoutConfig,

    /// Folder for temporary checkouts and installs
    pub temp_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = if is_yaml_file(path) {
            serde_yaml::to_string(self).context("Failed to serialize config")?
        } else {
            serde_json::to_string_pretty(self).context("Failed to serialize config")?
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.repository.url.trim().is_empty() {
            anyhow::bail!("Repository URL must not be empty");
        }
        if self.repository.default_branch.trim().is_empty() {
            anyhow::bail!("Default branch must not be empty");
        }
        if self.application.binary_names.is_empty() {
            anyhow::bail!("At least one application binary name is required");
        }

        let timeouts = [
            ("clone", self.timeouts.clone_secs),
            ("update", self.timeouts.update_secs),
            ("install", self.timeouts.install_secs),
            ("run", self.timeouts.run_secs),
        ];
        for (name, secs) in timeouts {
            if secs == Some(0) {
                anyhow::bail!("Timeout '{name}' must be greater than zero");
            }
        }

        Ok(())
    }

    /// Apply environment overrides
    pub fn apply_env(&mut self, env: &EnvConfig) -> Result<()> {
        if let Some(url) = &env.repository {
            self.repository.url = url.clone();
        }
        if let Some(vcs) = &env.vcs {
            self.repository.vcs = VcsKind::from_str(vcs)
                .with_context(|| format!("Unknown version control system: {vcs}"))?;
        }
        if let Some(branch) = &env.branch {
            self.repository.default_branch = branch.clone();
        }
        if let Some(test_path) = &env.test_path {
            self.repository.test_path = PathBuf::from(test_path);
        }
        if let Some(report) = &env.report {
            self.report_url = Some(report.clone());
        }
        Ok(())
    }

    pub fn branch_convention(&self) -> BranchConvention {
        BranchConvention {
            default_branch: self.repository.default_branch.clone(),
            trunk_repositories: self.repository.trunk_repositories.clone(),
        }
    }

    pub fn layout(&self) -> ApplicationLayout {
        ApplicationLayout::new(Platform::current(), self.application.binary_names.clone())
    }

    pub fn runner_options(&self) -> RunnerOptions {
        let runner = &self.runner;
        let mut options = RunnerOptions::new();
        options.addons = runner.addons.clone();
        options.debug = runner.debug;
        options.log_file = runner.log_file.clone();
        options.port = runner.port;
        options.set_profile(runner.profile.clone());
        options.shell = runner.shell;
        options.show_all = runner.show_all;
        options.show_errors = runner.show_errors;
        options.use_code = runner.use_code;
        options
    }

    pub fn timeouts(&self) -> Timeouts {
        let secs = |s: Option<u64>| s.map(Duration::from_secs);
        Timeouts {
            clone: secs(self.timeouts.clone_secs),
            update: secs(self.timeouts.update_secs),
            install: secs(self.timeouts.install_secs),
            run: secs(self.timeouts.run_secs),
        }
    }
}

/// Test-suite repository configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Remote repository URL
    pub url: String,

    /// Version control system of the repository
    pub vcs: VcsKind,

    /// Branch used when no release branch matches
    pub default_branch: String,

    /// Source repositories tested from the default branch
    pub trunk_repositories: Vec<String>,

    /// Tests to run, relative to the checkout
    pub test_path: PathBuf,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        let convention = BranchConvention::default();
        Self {
            url: DEFAULT_REPOSITORY_URL.to_string(),
            vcs: VcsKind::default(),
            default_branch: convention.default_branch,
            trunk_repositories: convention.trunk_repositories,
            test_path: PathBuf::new(),
        }
    }
}

/// Mozmill configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Runner used by default
    pub mode: RunnerMode,

    /// Executable for standard runs
    pub command: String,

    /// Executable for restart runs
    pub restart_command: String,

    pub addons: Vec<PathBuf>,
    pub debug: bool,
    pub log_file: Option<PathBuf>,
    pub port: Option<u16>,
    pub profile: Option<PathBuf>,
    pub shell: bool,
    pub show_all: bool,
    pub show_errors: bool,
    pub use_code: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            mode: RunnerMode::default(),
            command: "mozmill".to_string(),
            restart_command: "mozmill-restart".to_string(),
            addons: Vec::new(),
            debug: false,
            log_file: None,
            port: None,
            profile: None,
            shell: false,
            show_all: false,
            show_errors: false,
            use_code: false,
        }
    }
}

/// Build layout configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Executable names searched for in a build, in order
    pub binary_names: Vec<String>,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            binary_names: ApplicationLayout::default().binary_names,
        }
    }
}

/// Collaborator time limits in seconds
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub clone_secs: Option<u64>,
    pub update_secs: Option<u64>,
    pub install_secs: Option<u64>,
    pub run_secs: Option<u64>,
}

/// Check if file is YAML based on extension
fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.repository.url, DEFAULT_REPOSITORY_URL);
        assert_eq!(config.repository.vcs, VcsKind::Mercurial);
        assert_eq!(config.repository.default_branch, "default");
        assert_eq!(config.runner.command, "mozmill");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_load_roundtrip_yaml_and_json() {
        let dir = tempdir().unwrap();
        let mut config = AppConfig::default();
        config.report_url = Some("http://reports.example.com/db".to_string());
        config.timeouts.run_secs = Some(3600);

        for name in ["config.yaml", "nested/config.json"] {
            let path = dir.path().join(name);
            config.save(&path).unwrap();
            let loaded = AppConfig::load(&path).unwrap();
            assert_eq!(loaded.report_url, config.report_url);
            assert_eq!(loaded.timeouts.run_secs, Some(3600));
        }
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            "repository:\n  vcs: git\n  url: https://example.com/tests.git\nrunner:\n  mode: restart\n",
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.repository.vcs, VcsKind::Git);
        assert_eq!(config.repository.default_branch, "default");
        assert_eq!(config.runner.mode, RunnerMode::Restart);
        assert_eq!(config.runner.restart_command, "mozmill-restart");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.timeouts.clone_secs = Some(0);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.application.binary_names.clear();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.repository.url = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_apply_env() {
        let mut config = AppConfig::default();
        let env = EnvConfig {
            vcs: Some("git".to_string()),
            report: Some("http://reports.example.com/db".to_string()),
            ..Default::default()
        };
        config.apply_env(&env).unwrap();
        assert_eq!(config.repository.vcs, VcsKind::Git);
        assert_eq!(config.report_url.as_deref(), Some("http://reports.example.com/db"));

        let env = EnvConfig {
            vcs: Some("svn".to_string()),
            ..Default::default()
        };
        assert!(config.apply_env(&env).is_err());
    }

    #[test]
    fn test_runner_options_from_config() {
        let mut config = AppConfig::default();
        config.runner.profile = Some(PathBuf::from("/profiles/qa"));
        config.runner.show_all = true;

        let options = config.runner_options();
        assert!(!options.create_new_profile());
        assert!(options.show_all);

        config.timeouts.install_secs = Some(60);
        assert_eq!(config.timeouts().install, Some(Duration::from_secs(60)));
        assert_eq!(config.timeouts().run, None);
    }
}
