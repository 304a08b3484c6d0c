//! Test repository provisioning
//!
//! Clones the test-suite repository into a temporary checkout and keeps it
//! on the branch matching the build currently under test.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::vcs::Vcs;
use crate::error::{Result, RunError};
use crate::utils::bounded;

/// Default remote location of the test-suite repository
pub const DEFAULT_REPOSITORY_URL: &str = "http://hg.mozilla.org/qa/mozmill-tests";

/// Prefix of temporary checkout folders
pub const CHECKOUT_PREFIX: &str = "mozmill-tests.";

/// Maps a build's source repository to a test-suite branch
#[derive(Clone, Debug)]
pub struct BranchConvention {
    /// Branch used when no specific branch applies
    pub default_branch: String,
    /// Source repositories that are tested from the default branch
    pub trunk_repositories: Vec<String>,
}

impl Default for BranchConvention {
    fn default() -> Self {
        Self {
            default_branch: "default".to_string(),
            trunk_repositories: vec!["mozilla-central".to_string(), "comm-central".to_string()],
        }
    }
}

impl BranchConvention {
    /// Identify the test-suite branch for a source repository URL.
    ///
    /// `http://hg.mozilla.org/releases/mozilla-1.9.2` maps to `mozilla1.9.2`,
    /// trunk repositories map to the default branch.
    pub fn identify_branch(&self, source_repository: &str) -> String {
        let name = source_repository
            .trim()
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();

        if name.is_empty()
            || name.contains(':')
            || self.trunk_repositories.iter().any(|t| t == name)
        {
            return self.default_branch.clone();
        }

        name.replace('-', "")
    }
}

/// Local checkout of the remote repository
#[derive(Debug)]
pub struct RepositoryHandle {
    url: String,
    checkout: TempDir,
}

impl RepositoryHandle {
    pub fn path(&self) -> &Path {
        self.checkout.path()
    }
}

/// Owns the test-suite checkout for the duration of a run
pub struct RepositoryProvisioner {
    vcs: Arc<dyn Vcs>,
    url: String,
    convention: BranchConvention,
    temp_root: Option<PathBuf>,
    clone_timeout: Option<Duration>,
    update_timeout: Option<Duration>,
    handle: Option<RepositoryHandle>,
}

impl RepositoryProvisioner {
    pub fn new(vcs: Arc<dyn Vcs>, url: impl Into<String>) -> Self {
        Self {
            vcs,
            url: url.into(),
            convention: BranchConvention::default(),
            temp_root: None,
            clone_timeout: None,
            update_timeout: None,
            handle: None,
        }
    }

    pub fn with_convention(mut self, convention: BranchConvention) -> Self {
        self.convention = convention;
        self
    }

    /// Create the checkout below `root` instead of the system temp folder
    pub fn with_temp_root(mut self, root: Option<PathBuf>) -> Self {
        self.temp_root = root;
        self
    }

    /// Bound clone and branch switches
    pub fn with_timeouts(mut self, clone: Option<Duration>, update: Option<Duration>) -> Self {
        self.clone_timeout = clone;
        self.update_timeout = update;
        self
    }

    /// Local checkout, once cloned
    pub fn path(&self) -> Option<&Path> {
        self.handle.as_ref().map(RepositoryHandle::path)
    }

    #[cfg(test)]
    pub fn is_cloned(&self) -> bool {
        self.handle.is_some()
    }

    /// Clone the remote repository into a fresh temporary folder.
    ///
    /// The folder is removed again if cloning fails.
    pub async fn clone(&mut self) -> Result<&Path> {
        let checkout = self
            .create_checkout_dir()
            .map_err(|e| RunError::RepositoryProvisioning(e.to_string()))?;

        info!(
            "Cloning {} with {} to {}",
            self.url,
            self.vcs.name(),
            checkout.path().display()
        );

        let vcs = Arc::clone(&self.vcs);
        let url = self.url.clone();
        bounded("Repository clone", self.clone_timeout, async {
            vcs.clone_repo(&url, checkout.path())
                .await
                .map_err(|e| RunError::RepositoryProvisioning(format!("{e:#}")))
        })
        .await
        .map_err(|e| match e {
            RunError::Timeout { .. } => RunError::RepositoryProvisioning(e.to_string()),
            other => other,
        })?;

        let handle = self.handle.insert(RepositoryHandle { url, checkout });
        Ok(handle.path())
    }

    /// Switch the checkout to the branch matching `source_repository`.
    ///
    /// Falls back to the default branch when the checkout has no branch of
    /// that name. Returns the branch that was checked out.
    pub async fn select_branch(&self, source_repository: &str) -> Result<String> {
        let checkout = self
            .path()
            .ok_or_else(|| RunError::BranchSelection("repository has not been cloned".into()))?;

        let wanted = self.convention.identify_branch(source_repository);

        let branch = bounded("Branch selection", self.update_timeout, async {
            let branches = self
                .vcs
                .branches(checkout)
                .await
                .map_err(|e| RunError::BranchSelection(format!("{e:#}")))?;

            let branch = if branches.iter().any(|b| *b == wanted) {
                wanted.clone()
            } else {
                warn!(
                    "No test branch '{}' for {}, using '{}'",
                    wanted, source_repository, self.convention.default_branch
                );
                self.convention.default_branch.clone()
            };

            self.vcs
                .update(checkout, &branch)
                .await
                .map_err(|e| RunError::BranchSelection(format!("{e:#}")))?;

            Ok(branch)
        })
        .await?;

        info!("Test repository is on branch '{}'", branch);
        Ok(branch)
    }

    /// Delete the local checkout. Calling it again, or before a successful
    /// clone, does nothing.
    pub fn remove(&mut self) -> Result<()> {
        let Some(handle) = self.handle.take() else {
            debug!("No test repository checkout to remove");
            return Ok(());
        };

        let path = handle.path().to_path_buf();
        handle.checkout.close()?;
        info!("Removed checkout of {} at {}", handle.url, path.display());
        Ok(())
    }

    fn create_checkout_dir(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(CHECKOUT_PREFIX);
        match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }
}

#[cfg(test)]
mod fakes {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-memory VCS that records every call
    #[derive(Default)]
    pub struct FakeVcs {
        pub fail_clone: bool,
        pub branches: Vec<String>,
        pub calls: Mutex<Vec<String>>,
    }

    impl FakeVcs {
        pub fn with_branches(branches: &[&str]) -> Self {
            Self {
                branches: branches.iter().map(|b| b.to_string()).collect(),
                ..Default::default()
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Vcs for FakeVcs {
        fn name(&self) -> &'static str {
            "fake"
        }

        async fn clone_repo(&self, url: &str, dest: &Path) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!("clone {url}"));
            if self.fail_clone {
                anyhow::bail!("abort: error: Connection refused");
            }
            std::fs::create_dir_all(dest.join("tests").join("functional"))?;
            Ok(())
        }

        async fn branches(&self, _checkout: &Path) -> anyhow::Result<Vec<String>> {
            Ok(self.branches.clone())
        }

        async fn update(&self, _checkout: &Path, branch: &str) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!("update {branch}"));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::FakeVcs;
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_identify_branch() {
        let convention = BranchConvention::default();
        assert_eq!(
            convention.identify_branch("http://hg.mozilla.org/releases/mozilla-1.9.2"),
            "mozilla1.9.2"
        );
        assert_eq!(
            convention.identify_branch("http://hg.mozilla.org/releases/mozilla-2.0/"),
            "mozilla2.0"
        );
        assert_eq!(
            convention.identify_branch("http://hg.mozilla.org/mozilla-central"),
            "default"
        );
        assert_eq!(convention.identify_branch(""), "default");
        assert_eq!(convention.identify_branch("http:"), "default");
    }

    #[tokio::test]
    async fn test_clone_and_remove() {
        let root = tempdir().unwrap();
        let vcs = Arc::new(FakeVcs::default());
        let mut provisioner = RepositoryProvisioner::new(vcs.clone(), DEFAULT_REPOSITORY_URL)
            .with_temp_root(Some(root.path().to_path_buf()));

        let path = provisioner.clone().await.unwrap().to_path_buf();
        assert!(path.join("tests").is_dir());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(CHECKOUT_PREFIX));
        assert_eq!(vcs.calls(), vec![format!("clone {DEFAULT_REPOSITORY_URL}")]);

        provisioner.remove().unwrap();
        assert!(!path.exists());
        provisioner.remove().unwrap();
        assert!(!provisioner.is_cloned());
    }

    #[tokio::test]
    async fn test_clone_failure_is_fatal_and_clean() {
        let root = tempdir().unwrap();
        let vcs = Arc::new(FakeVcs {
            fail_clone: true,
            ..Default::default()
        });
        let mut provisioner = RepositoryProvisioner::new(vcs, "http://example.com/tests")
            .with_temp_root(Some(root.path().to_path_buf()));

        let err = provisioner.clone().await.unwrap_err();
        assert!(matches!(err, RunError::RepositoryProvisioning(_)));
        assert!(err.to_string().contains("Connection refused"));
        assert!(!provisioner.is_cloned());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);

        provisioner.remove().unwrap();
    }

    #[tokio::test]
    async fn test_select_branch_with_fallback() {
        let root = tempdir().unwrap();
        let vcs = Arc::new(FakeVcs::with_branches(&["default", "mozilla1.9.2"]));
        let mut provisioner = RepositoryProvisioner::new(vcs.clone(), DEFAULT_REPOSITORY_URL)
            .with_temp_root(Some(root.path().to_path_buf()));
        provisioner.clone().await.unwrap();

        let branch = provisioner
            .select_branch("http://hg.mozilla.org/releases/mozilla-1.9.2")
            .await
            .unwrap();
        assert_eq!(branch, "mozilla1.9.2");

        let branch = provisioner
            .select_branch("http://hg.mozilla.org/releases/mozilla-5.0")
            .await
            .unwrap();
        assert_eq!(branch, "default");

        let calls = vcs.calls();
        assert_eq!(calls[1..], ["update mozilla1.9.2", "update default"]);
        provisioner.remove().unwrap();
    }

    #[tokio::test]
    async fn test_select_branch_before_clone() {
        let vcs = Arc::new(FakeVcs::default());
        let provisioner = RepositoryProvisioner::new(vcs, DEFAULT_REPOSITORY_URL);
        let err = provisioner
            .select_branch("http://hg.mozilla.org/mozilla-central")
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::BranchSelection(_)));
    }
}
