//! Build provisioning module
//!
//! Installs builds under test, locates their executables and reads their
//! application metadata.

mod application;
mod installer;
mod provisioner;

pub use application::{ApplicationLayout, Platform};
pub use installer::ArchiveInstaller;
pub use provisioner::{BuildProvisioner, ProvisionedBuild};

#[cfg(test)]
pub(crate) use application::fixtures;
#[cfg(test)]
pub(crate) use installer::Installer;
