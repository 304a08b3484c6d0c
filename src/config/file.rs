//! Configuration file discovery
//!
//! Finds the configuration file in standard locations and loads it.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::AppConfig;

/// Configuration file locations (in order of precedence)
pub const CONFIG_LOCATIONS: &[&str] = &[
    "./mozmill-automation.yaml",
    "./mozmill-automation.yml",
    "./.mozmill-automation.yaml",
    "~/.config/mozmill-automation/config.yaml",
];

/// Find configuration file in standard locations
pub fn find_config() -> Option<PathBuf> {
    CONFIG_LOCATIONS
        .iter()
        .map(|location| expand_path(location))
        .find(|path| path.exists())
}

/// Load the explicit file if given, else the first one found, else defaults.
///
/// Returns the path the configuration was read from, if any.
pub fn load_config(explicit: Option<&Path>) -> Result<(AppConfig, Option<PathBuf>)> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config(),
    };

    match path {
        Some(path) => {
            debug!("Loading configuration from {}", path.display());
            let config = AppConfig::load(&path)?;
            Ok((config, Some(path)))
        }
        None => Ok((AppConfig::default(), None)),
    }
}

/// Expand ~ to home directory
fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_expand_path() {
        let expanded = expand_path("~/test");
        assert!(!expanded.to_string_lossy().starts_with('~'));

        let absolute = expand_path("/absolute/path");
        assert_eq!(absolute, PathBuf::from("/absolute/path"));
    }

    #[test]
    fn test_load_explicit_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.yaml");
        std::fs::write(&path, "report_url: http://reports.example.com/db\n").unwrap();

        let (config, source) = load_config(Some(&path)).unwrap();
        assert_eq!(config.report_url.as_deref(), Some("http://reports.example.com/db"));
        assert_eq!(source, Some(path));
    }

    #[test]
    fn test_load_missing_explicit_config_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.yaml");
        assert!(load_config(Some(&path)).is_err());
    }
}
