//! Application metadata
//!
//! Locates the executable inside a build folder and reads the
//! `application.ini` descriptor shipped with every build.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the application descriptor
pub const APPLICATION_INI: &str = "application.ini";

/// Target platform layout
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Mac,
    Windows,
}

impl Platform {
    /// Platform this tool was built for
    pub fn current() -> Self {
        if cfg!(target_os = "macos") {
            Platform::Mac
        } else if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Linux
        }
    }

    fn executable_suffix(&self) -> &'static str {
        match self {
            Platform::Windows => ".exe",
            _ => "",
        }
    }
}

/// How builds are laid out on disk
#[derive(Clone, Debug)]
pub struct ApplicationLayout {
    pub platform: Platform,
    /// Executable names to look for, in order of preference
    pub binary_names: Vec<String>,
}

impl Default for ApplicationLayout {
    fn default() -> Self {
        Self {
            platform: Platform::current(),
            binary_names: vec!["firefox".to_string(), "thunderbird".to_string()],
        }
    }
}

impl ApplicationLayout {
    pub fn new(platform: Platform, binary_names: Vec<String>) -> Self {
        Self {
            platform,
            binary_names,
        }
    }

    /// Folder holding the executable and the descriptor
    pub fn bin_folder(&self, app_folder: &Path) -> PathBuf {
        match self.platform {
            Platform::Mac => app_folder.join("Contents").join("MacOS"),
            _ => app_folder.to_path_buf(),
        }
    }

    /// Check if a path is the root of an installed application
    pub fn is_app_folder(&self, path: &Path) -> bool {
        path.is_dir() && self.bin_folder(path).join(APPLICATION_INI).is_file()
    }

    /// Find the application executable inside a build folder
    pub fn locate_binary(&self, app_folder: &Path) -> Option<PathBuf> {
        let bin_folder = self.bin_folder(app_folder);
        let suffix = self.platform.executable_suffix();

        self.binary_names
            .iter()
            .map(|name| bin_folder.join(format!("{name}{suffix}")))
            .find(|candidate| candidate.is_file())
    }

    /// Find the application folder at or directly below `root`
    pub fn find_app_folder(&self, root: &Path) -> Option<PathBuf> {
        if self.is_app_folder(root) {
            return Some(root.to_path_buf());
        }

        let mut children: Vec<PathBuf> = fs::read_dir(root)
            .ok()?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        children.sort();

        children.into_iter().find(|child| self.is_app_folder(child))
    }

    /// Read the descriptor of an application folder
    pub fn read_ini(&self, app_folder: &Path) -> Result<ApplicationIni> {
        ApplicationIni::load(self.bin_folder(app_folder).join(APPLICATION_INI))
    }
}

/// Parsed `application.ini`
#[derive(Clone, Debug, Default)]
pub struct ApplicationIni {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl ApplicationIni {
    /// Load a descriptor from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    /// Parse descriptor content. Keys outside any section are ignored.
    pub fn parse(content: &str) -> Self {
        let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut current: Option<String> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                let name = name.trim().to_string();
                sections.entry(name.clone()).or_default();
                current = Some(name);
                continue;
            }

            if let (Some(section), Some((key, value))) = (&current, line.split_once('=')) {
                sections
                    .entry(section.clone())
                    .or_default()
                    .insert(key.trim().to_string(), value.trim().to_string());
            }
        }

        Self { sections }
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.get(key))
            .map(String::as_str)
    }

    /// URL of the repository the build was made from
    pub fn source_repository(&self) -> Option<&str> {
        self.get("App", "SourceRepository").filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// Lay out a minimal Linux build below `folder`
    pub fn write_linux_build(folder: &Path, source_repository: &str) {
        fs::create_dir_all(folder).unwrap();
        fs::write(
            folder.join(APPLICATION_INI),
            format!("[App]\nVendor=Mozilla\nName=Firefox\nSourceRepository={source_repository}\n"),
        )
        .unwrap();
        fs::write(folder.join("firefox"), "#!/bin/sh\n").unwrap();
    }

    pub fn linux_layout() -> ApplicationLayout {
        ApplicationLayout::new(Platform::Linux, vec!["firefox".to_string()])
    }
}
