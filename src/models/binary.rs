//! Binary entry models
//!
//! Describes a build under test and how it was classified.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// File extensions recognized as installer packages
pub const INSTALLER_EXTENSIONS: &[&str] = &["bz2", "dmg", "exe", "zip"];

/// How a binary path is provisioned
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BinaryKind {
    /// Archive or installer that has to be installed first
    Installer,
    /// Already built application folder
    ApplicationTree,
}

impl BinaryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryKind::Installer => "installer",
            BinaryKind::ApplicationTree => "application-tree",
        }
    }
}

impl fmt::Display for BinaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved binary to test
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryEntry {
    path: PathBuf,
    kind: BinaryKind,
}

impl BinaryEntry {
    pub fn new(path: impl Into<PathBuf>, kind: BinaryKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn installer(path: impl Into<PathBuf>) -> Self {
        Self::new(path, BinaryKind::Installer)
    }

    pub fn application_tree(path: impl Into<PathBuf>) -> Self {
        Self::new(path, BinaryKind::ApplicationTree)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> BinaryKind {
        self.kind
    }

    pub fn is_installer(&self) -> bool {
        self.kind == BinaryKind::Installer
    }

    /// File or folder name for display
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

impl fmt::Display for BinaryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.path.display(), self.kind)
    }
}

/// Check if a path names an installer package
pub fn is_installer(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| INSTALLER_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}
