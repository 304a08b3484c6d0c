//! Runner options
//!
//! Configuration handed to the Mozmill command line for one build.

use serde::Serialize;
use std::path::PathBuf;

/// Options of a single Mozmill invocation
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunnerOptions {
    /// Application executable to test
    pub binary: Option<PathBuf>,
    /// Test file or folder
    pub test: Option<PathBuf>,
    /// Report server URL
    pub report: Option<String>,
    /// Add-ons installed into the profile
    pub addons: Vec<PathBuf>,
    pub debug: bool,
    pub log_file: Option<PathBuf>,
    /// TCP port of the JS bridge
    pub port: Option<u16>,
    profile: Option<PathBuf>,
    create_new_profile: bool,
    /// Start a Python shell instead of running tests
    pub shell: bool,
    pub show_all: bool,
    pub show_errors: bool,
    /// Use the code module
    pub use_code: bool,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            binary: None,
            test: None,
            report: None,
            addons: Vec::new(),
            debug: false,
            log_file: None,
            port: None,
            profile: None,
            create_new_profile: true,
            shell: false,
            show_all: false,
            show_errors: false,
            use_code: false,
        }
    }
}

impl RunnerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn profile(&self) -> Option<&std::path::Path> {
        self.profile.as_deref()
    }

    /// Whether a fresh profile is created for the run
    #[cfg(test)]
    pub fn create_new_profile(&self) -> bool {
        self.create_new_profile
    }

    /// Use an existing profile. An absent or empty path requests a new one.
    pub fn set_profile(&mut self, profile: Option<PathBuf>) {
        let profile = profile.filter(|p| !p.as_os_str().is_empty());
        self.create_new_profile = profile.is_none();
        self.profile = profile;
    }

    /// Copy of these options bound to one build and test location
    pub fn for_build(
        &self,
        binary: impl Into<PathBuf>,
        test: impl Into<PathBuf>,
        report: Option<String>,
    ) -> Self {
        Self {
            binary: Some(binary.into()),
            test: Some(test.into()),
            report,
            ..self.clone()
        }
    }

    /// Command-line arguments for these options
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if let Some(binary) = &self.binary {
            args.push("--binary".to_string());
            args.push(binary.display().to_string());
        }
        if let Some(test) = &self.test {
            args.push("--test".to_string());
            args.push(test.display().to_string());
        }
        if let Some(report) = &self.report {
            args.push("--report".to_string());
            args.push(report.clone());
        }
        for addon in &self.addons {
            args.push("--addons".to_string());
            args.push(addon.display().to_string());
        }
        if let Some(log_file) = &self.log_file {
            args.push("--logfile".to_string());
            args.push(log_file.display().to_string());
        }
        if let Some(port) = self.port {
            args.push("--port".to_string());
            args.push(port.to_string());
        }
        if let (false, Some(profile)) = (self.create_new_profile, &self.profile) {
            args.push("--profile".to_string());
            args.push(profile.display().to_string());
        }

        let flags = [
            (self.debug, "--debug"),
            (self.shell, "--shell"),
            (self.show_all, "--show-all"),
            (self.show_errors, "--show-errors"),
            (self.use_code, "--usecode"),
        ];
        args.extend(
            flags
                .into_iter()
                .filter(|(enabled, _)| *enabled)
                .map(|(_, flag)| flag.to_string()),
        );

        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_profile_toggles_create_new() {
        let mut options = RunnerOptions::new();
        assert!(options.create_new_profile());

        options.set_profile(Some(PathBuf::from("/profiles/qa")));
        assert!(!options.create_new_profile());
        assert_eq!(options.profile(), Some(Path::new("/profiles/qa")));

        options.set_profile(Some(PathBuf::new()));
        assert!(options.create_new_profile());
        assert_eq!(options.profile(), None);

        options.set_profile(Some(PathBuf::from("/profiles/qa")));
        options.set_profile(None);
        assert!(options.create_new_profile());
    }

    #[test]
    fn test_for_build_keeps_pass_through_options() {
        let mut base = RunnerOptions::new();
        base.debug = true;
        base.port = Some(24242);

        let options = base.for_build(
            "/tmp/firefox/firefox",
            "/tmp/tests/functional",
            Some("http://reports.example.com/db".to_string()),
        );

        assert_eq!(options.binary, Some(PathBuf::from("/tmp/firefox/firefox")));
        assert_eq!(options.test, Some(PathBuf::from("/tmp/tests/functional")));
        assert!(options.debug);
        assert_eq!(options.port, Some(24242));
    }

    #[test]
    fn test_to_args() {
        let mut options = RunnerOptions::new().for_build("/app/firefox", "/repo/tests", None);
        options.show_errors = true;
        options.set_profile(Some(PathBuf::from("/profiles/qa")));

        assert_eq!(
            options.to_args(),
            vec![
                "--binary",
                "/app/firefox",
                "--test",
                "/repo/tests",
                "--profile",
                "/profiles/qa",
                "--show-errors",
            ]
        );
    }
}
