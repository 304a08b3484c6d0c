//! Test repository module
//!
//! Cloning, branch selection and removal of the test-suite checkout.

mod provisioner;
mod vcs;

pub use provisioner::{BranchConvention, RepositoryProvisioner, DEFAULT_REPOSITORY_URL};
pub use vcs::{Vcs, VcsKind};
