//! Version control clients
//!
//! Thin wrappers around the `hg` and `git` command-line tools.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::debug;

/// Version control client used for the test repository
#[async_trait]
pub trait Vcs: Send + Sync {
    fn name(&self) -> &'static str;

    /// Clone `url` into the existing, empty folder `dest`
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;

    /// Branch names known to the checkout
    async fn branches(&self, checkout: &Path) -> Result<Vec<String>>;

    /// Switch the checkout to `branch`, discarding local changes
    async fn update(&self, checkout: &Path, branch: &str) -> Result<()>;
}

/// Supported version control systems
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcsKind {
    #[default]
    Mercurial,
    Git,
}

impl VcsKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "hg" | "mercurial" => Some(VcsKind::Mercurial),
            "git" => Some(VcsKind::Git),
            _ => None,
        }
    }

    /// Create the client for this kind
    pub fn client(self) -> Arc<dyn Vcs> {
        match self {
            VcsKind::Mercurial => Arc::new(Mercurial::new()),
            VcsKind::Git => Arc::new(Git::new()),
        }
    }
}

impl fmt::Display for VcsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VcsKind::Mercurial => write!(f, "hg"),
            VcsKind::Git => write!(f, "git"),
        }
    }
}

/// Mercurial client
#[derive(Clone, Debug)]
pub struct Mercurial {
    command: String,
}

impl Mercurial {
    pub fn new() -> Self {
        Self {
            command: "hg".to_string(),
        }
    }
}

impl Default for Mercurial {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Vcs for Mercurial {
    fn name(&self) -> &'static str {
        "hg"
    }

    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        run(&self.command, None, &["clone", url, &path_str(dest)?]).await?;
        Ok(())
    }

    async fn branches(&self, checkout: &Path) -> Result<Vec<String>> {
        let stdout = run(&self.command, Some(checkout), &["branches", "--quiet"]).await?;
        Ok(parse_lines(&stdout))
    }

    async fn update(&self, checkout: &Path, branch: &str) -> Result<()> {
        run(&self.command, Some(checkout), &["update", "--clean", branch]).await?;
        Ok(())
    }
}

/// Git client
#[derive(Clone, Debug)]
pub struct Git {
    command: String,
}

impl Git {
    pub fn new() -> Self {
        Self {
            command: "git".to_string(),
        }
    }
}

impl Default for Git {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Vcs for Git {
    fn name(&self) -> &'static str {
        "git"
    }

    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        run(&self.command, None, &["clone", "--quiet", url, &path_str(dest)?]).await?;
        Ok(())
    }

    async fn branches(&self, checkout: &Path) -> Result<Vec<String>> {
        let stdout = run(
            &self.command,
            Some(checkout),
            &["branch", "--remotes", "--format=%(refname:lstrip=3)"],
        )
        .await?;

        Ok(parse_lines(&stdout)
            .into_iter()
            .filter(|b| b != "HEAD")
            .collect())
    }

    async fn update(&self, checkout: &Path, branch: &str) -> Result<()> {
        run(&self.command, Some(checkout), &["checkout", "--force", "--quiet", branch]).await?;
        Ok(())
    }
}

async fn run(program: &str, cwd: Option<&Path>, args: &[&str]) -> Result<String> {
    debug!("Running {} {:?}", program, args);

    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);
    if let Some(cwd) = cwd {
        command.current_dir(cwd);
    }

    let output = command
        .output()
        .await
        .with_context(|| format!("Failed to run {program}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{program} {} failed: {}", args.join(" "), stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

fn parse_lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn path_str(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .with_context(|| format!("Path is not valid UTF-8: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vcs_kind_from_str() {
        assert_eq!(VcsKind::from_str("hg"), Some(VcsKind::Mercurial));
        assert_eq!(VcsKind::from_str("Mercurial"), Some(VcsKind::Mercurial));
        assert_eq!(VcsKind::from_str("git"), Some(VcsKind::Git));
        assert_eq!(VcsKind::from_str("svn"), None);
        assert_eq!(VcsKind::default(), VcsKind::Mercurial);
    }

    #[test]
    fn test_client_names() {
        assert_eq!(VcsKind::Mercurial.client().name(), "hg");
        assert_eq!(VcsKind::Git.client().name(), "git");
    }

    #[test]
    fn test_parse_lines() {
        let branches = parse_lines("default\n  mozilla1.9.2 \n\nmozilla2.0\n");
        assert_eq!(branches, vec!["default", "mozilla1.9.2", "mozilla2.0"]);
    }
}
