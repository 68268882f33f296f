//! Version-control capability consumed by the snapshot store.
//!
//! The store only ever asks a working tree which branch it is on, whether it
//! has uncommitted changes, and (for branch-specific backups) to switch
//! branches. Git is driven through its CLI; directories without a `.git`
//! marker get the [`Unversioned`] fallback.

mod git;

use std::path::Path;

use crate::error::{StoreError, StoreResult};

pub use git::GitScm;

/// Branch name used when no version control is available
pub const DEFAULT_BRANCH: &str = "main";

/// Narrow interface to a working tree's version control.
pub trait VersionControl: Send + Sync {
    /// Get the current branch name.
    fn current_branch(&self) -> StoreResult<String>;

    /// Check if there are uncommitted changes.
    fn has_changes(&self) -> StoreResult<bool>;

    /// Check out another branch.
    fn switch_branch(&self, branch: &str) -> StoreResult<()>;
}

/// Fallback for directories that are not under version control.
#[derive(Debug, Clone, Default)]
pub struct Unversioned;

impl VersionControl for Unversioned {
    fn current_branch(&self) -> StoreResult<String> {
        Ok(DEFAULT_BRANCH.to_string())
    }

    fn has_changes(&self) -> StoreResult<bool> {
        Ok(false)
    }

    fn switch_branch(&self, branch: &str) -> StoreResult<()> {
        Err(StoreError::Vcs(format!(
            "cannot switch to branch '{branch}': directory is not under version control"
        )))
    }
}

/// Check if a directory is a Git repository.
pub fn is_repo(path: &Path) -> bool {
    path.join(".git").exists()
}

/// Pick the version-control backend for a working tree.
pub fn detect(path: &Path) -> Box<dyn VersionControl> {
    if is_repo(path) {
        match GitScm::open(path) {
            Ok(git) => return Box::new(git),
            Err(e) => log::warn!("Ignoring git metadata at {}: {}", path.display(), e),
        }
    }
    Box::new(Unversioned)
}
