//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "MOZMILL_AUTOMATION";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// Repository URL from MOZMILL_AUTOMATION_REPOSITORY
    pub repository: Option<String>,
    /// Version control system from MOZMILL_AUTOMATION_VCS
    pub vcs: Option<String>,
    /// Default branch from MOZMILL_AUTOMATION_BRANCH
    pub branch: Option<String>,
    /// Test path from MOZMILL_AUTOMATION_TEST_PATH
    pub test_path: Option<String>,
    /// Report URL from MOZMILL_AUTOMATION_REPORT
    pub report: Option<String>,
    /// Config file from MOZMILL_AUTOMATION_CONFIG
    pub config_file: Option<String>,
    /// Log level from MOZMILL_AUTOMATION_LOG
    pub log_level: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            repository: get_env("REPOSITORY"),
            vcs: get_env("VCS"),
            branch: get_env("BRANCH"),
            test_path: get_env("TEST_PATH"),
            report: get_env("REPORT"),
            config_file: get_env("CONFIG"),
            log_level: get_env("LOG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.repository.is_some()
            || self.vcs.is_some()
            || self.branch.is_some()
            || self.test_path.is_some()
            || self.report.is_some()
            || self.config_file.is_some()
            || self.log_level.is_some()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_REPOSITORY: {:?}", ENV_PREFIX, self.repository);
        println!("  {}_VCS:        {:?}", ENV_PREFIX, self.vcs);
        println!("  {}_BRANCH:     {:?}", ENV_PREFIX, self.branch);
        println!("  {}_TEST_PATH:  {:?}", ENV_PREFIX, self.test_path);
        println!("  {}_REPORT:     {:?}", ENV_PREFIX, self.report);
        println!("  {}_CONFIG:     {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_LOG:        {:?}", ENV_PREFIX, self.log_level);
    }
}

/// Get environment variable with prefix, ignoring empty values
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}"))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// Builder for setting environment variables in tests
#[cfg(test)]
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

#[cfg(test)]
impl EnvBuilder {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    pub fn var(mut self, name: &str, value: impl Into<String>) -> Self {
        self.vars.push((format!("{ENV_PREFIX}_{name}"), value.into()));
        self
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        for (key, value) in self.vars {
            env::set_var(key, value);
        }

        EnvGuard { previous }
    }
}

/// Guard that restores environment variables on drop
#[cfg(test)]
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

#[cfg(test)]
impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print all MOZMILL_AUTOMATION environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_REPOSITORY  Test-suite repository URL");
    println!("  {ENV_PREFIX}_VCS         Version control system (hg, git)");
    println!("  {ENV_PREFIX}_BRANCH      Branch used when no release branch matches");
    println!("  {ENV_PREFIX}_TEST_PATH   Tests to run, relative to the checkout");
    println!("  {ENV_PREFIX}_REPORT      Report server URL");
    println!("  {ENV_PREFIX}_CONFIG      Path to configuration file");
    println!("  {ENV_PREFIX}_LOG         Log level (error, warn, info, debug, trace)");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_REPORT=http://reports.example.com/db");
    println!("  mozmill-automation run firefox-3.6.tar.bz2");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.repository.is_none());
        assert!(!config.has_any());
    }

    // Only test in the crate that mutates the process environment.
    #[test]
    fn test_env_builder_overrides() {
        let _guard = EnvBuilder::new()
            .var("VCS", "git")
            .var("TEST_PATH", "tests/endurance")
            .var("BRANCH", " ")
            .apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(config.vcs.as_deref(), Some("git"));
        assert_eq!(config.test_path.as_deref(), Some("tests/endurance"));
        assert!(config.branch.is_none());
        assert!(config.has_any());
    }
}
