//! Build provisioning
//!
//! Turns a binary entry into an application folder ready for testing and
//! tears it down again once the binary has been tested.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

use super::application::ApplicationLayout;
use super::installer::Installer;
use crate::error::{Result, RunError};
use crate::models::BinaryEntry;
use crate::utils::bounded;

/// Prefix of temporary install folders
pub const BUILD_DIR_PREFIX: &str = "mozmill-build.";

/// A build that is ready to be tested
#[derive(Debug)]
pub struct ProvisionedBuild {
    entry: BinaryEntry,
    folder: PathBuf,
    install_dir: Option<TempDir>,
}

impl ProvisionedBuild {
    /// Application folder of the build
    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Temporary folder the build was installed to, if it was installed
    #[cfg(test)]
    pub fn install_dir(&self) -> Option<&Path> {
        self.install_dir.as_ref().map(TempDir::path)
    }
}

/// Installs builds for testing
pub struct BuildProvisioner {
    installer: Arc<dyn Installer>,
    layout: ApplicationLayout,
    temp_root: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl BuildProvisioner {
    pub fn new(installer: Arc<dyn Installer>, layout: ApplicationLayout) -> Self {
        Self {
            installer,
            layout,
            temp_root: None,
            timeout: None,
        }
    }

    /// Create install folders below `root` instead of the system temp folder
    pub fn with_temp_root(mut self, root: Option<PathBuf>) -> Self {
        self.temp_root = root;
        self
    }

    /// Bound installer calls
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn layout(&self) -> &ApplicationLayout {
        &self.layout
    }

    /// Provision a binary.
    ///
    /// Installers are installed into a fresh temporary folder which is removed
    /// again if installation fails. Application trees are used in place.
    pub async fn install(&self, entry: &BinaryEntry) -> Result<ProvisionedBuild> {
        if !entry.is_installer() {
            let path = entry.path();
            let folder = if path.is_dir() {
                path.to_path_buf()
            } else {
                path.parent().map(Path::to_path_buf).unwrap_or_default()
            };
            debug!("Using application tree {}", folder.display());

            return Ok(ProvisionedBuild {
                entry: entry.clone(),
                folder,
                install_dir: None,
            });
        }

        let install_dir = self
            .create_install_dir()
            .map_err(|e| RunError::build_provisioning(entry.path(), e))?;

        let folder = bounded(
            "Installation",
            self.timeout,
            async {
                self.installer
                    .install(entry.path(), install_dir.path())
                    .await
                    .map_err(|e| RunError::build_provisioning(entry.path(), format!("{e:#}")))
            },
        )
        .await?;

        info!("Installed {} to {}", entry.name(), folder.display());

        Ok(ProvisionedBuild {
            entry: entry.clone(),
            folder,
            install_dir: Some(install_dir),
        })
    }

    /// Locate the executable of a provisioned build
    pub fn resolve_executable(&self, folder: &Path) -> Result<PathBuf> {
        self.layout
            .locate_binary(folder)
            .ok_or_else(|| RunError::ApplicationNotFound(folder.to_path_buf()))
    }

    /// Remove a build that was installed by `install`.
    ///
    /// Application trees belong to the caller and are left untouched.
    pub async fn uninstall(&self, build: ProvisionedBuild) -> Result<()> {
        let Some(install_dir) = build.install_dir else {
            debug!("Leaving application tree {} in place", build.folder.display());
            return Ok(());
        };

        let uninstalled = bounded("Uninstallation", self.timeout, async {
            self.installer
                .uninstall(&build.folder)
                .await
                .map_err(|e| RunError::build_provisioning(build.entry.path(), format!("{e:#}")))
        })
        .await;

        let path = install_dir.path().to_path_buf();
        install_dir.close()?;
        info!("Removed build folder {}", path.display());

        uninstalled
    }

    fn create_install_dir(&self) -> std::io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(BUILD_DIR_PREFIX);
        match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }
}
