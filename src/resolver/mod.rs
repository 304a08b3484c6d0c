//! Binary resolution
//!
//! Expands user supplied paths into the ordered list of builds to test.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::build::ApplicationLayout;
use crate::error::{Result, RunError};
use crate::models::{is_installer, BinaryEntry};

/// Files written by operating systems that are never builds
const OS_METADATA_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

/// Classifies paths and expands folders into installer files
#[derive(Clone, Debug, Default)]
pub struct BinaryResolver {
    layout: ApplicationLayout,
}

impl BinaryResolver {
    pub fn new(layout: ApplicationLayout) -> Self {
        Self { layout }
    }

    /// Resolve `paths` in order.
    ///
    /// Fails on the first path that does not exist. Installers and
    /// application folders are taken as they are, any other folder is
    /// searched for installers.
    pub fn resolve<P: AsRef<Path>>(&self, paths: &[P]) -> Result<Vec<BinaryEntry>> {
        let mut binaries = Vec::new();

        for path in paths {
            let path = path.as_ref();
            if !path.exists() {
                return Err(RunError::PathNotFound(path.to_path_buf()));
            }
            let path = absolute(path)?;

            if is_installer(&path) {
                binaries.push(BinaryEntry::installer(path));
            } else if self.layout.is_app_folder(&path) {
                binaries.push(BinaryEntry::application_tree(path));
            } else if path.is_dir() {
                let before = binaries.len();
                collect_installers(&path, &mut binaries)?;
                debug!(
                    "Found {} installers in {}",
                    binaries.len() - before,
                    path.display()
                );
            } else {
                debug!("Ignoring {}: neither a build nor a folder", path.display());
            }
        }

        Ok(binaries)
    }
}

/// Walk `dir` depth-first: its files first, then each subfolder, both by name
fn collect_installers(dir: &Path, binaries: &mut Vec<BinaryEntry>) -> Result<()> {
    let mut files = Vec::new();
    let mut dirs = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            dirs.push(entry.path());
        } else if file_type.is_file() || (file_type.is_symlink() && entry.path().is_file()) {
            files.push(entry.path());
        }
    }

    files.sort();
    dirs.sort();

    binaries.extend(
        files
            .into_iter()
            .filter(|f| !is_os_metadata(f) && is_installer(f))
            .map(BinaryEntry::installer),
    );

    for sub in dirs {
        collect_installers(&sub, binaries)?;
    }

    Ok(())
}

fn is_os_metadata(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|name| OS_METADATA_FILES.contains(&name) || name.starts_with("._"))
        .unwrap_or(false)
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}
