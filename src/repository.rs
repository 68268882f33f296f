//! Working trees whose configuration gets snapshotted.

use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};
use crate::scm::{self, VersionControl, DEFAULT_BRANCH};

/// A working tree identified by its directory name and current branch
pub struct Repository {
    root: PathBuf,
    name: String,
    branch: String,
    vcs: Box<dyn VersionControl>,
}

impl Repository {
    /// Open a working tree, detecting its version control.
    pub fn open(root: &Path) -> StoreResult<Self> {
        Self::with_vcs(root, scm::detect(root))
    }

    /// Open a working tree with an explicit version-control backend.
    pub fn with_vcs(root: &Path, vcs: Box<dyn VersionControl>) -> StoreResult<Self> {
        if !root.is_dir() {
            return Err(StoreError::not_found(format!(
                "repository directory '{}'",
                root.display()
            )));
        }

        let root = root.canonicalize().map_err(|e| StoreError::io(root, e))?;
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| StoreError::not_found(format!("name for '{}'", root.display())))?;
        let branch = read_branch(vcs.as_ref());

        Ok(Repository {
            root,
            name,
            branch,
            vcs,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    pub fn has_changes(&self) -> StoreResult<bool> {
        self.vcs.has_changes()
    }

    /// Check out `branch` unless it is already current.
    pub fn switch_branch(&mut self, branch: &str) -> StoreResult<()> {
        if self.branch == branch {
            return Ok(());
        }
        self.vcs.switch_branch(branch)?;
        self.branch = read_branch(self.vcs.as_ref());
        log::info!("Switched {} to branch {}", self.name, self.branch);
        Ok(())
    }
}

fn read_branch(vcs: &dyn VersionControl) -> String {
    match vcs.current_branch() {
        Ok(branch) if !branch.is_empty() => branch,
        Ok(_) => DEFAULT_BRANCH.to_string(),
        Err(e) => {
            log::debug!("Falling back to branch '{DEFAULT_BRANCH}': {e}");
            DEFAULT_BRANCH.to_string()
        }
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .field("name", &self.name)
            .field("branch", &self.branch)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scm::Unversioned;
    use tempfile::TempDir;

    struct FixedBranch(&'static str);

    impl VersionControl for FixedBranch {
        fn current_branch(&self) -> StoreResult<String> {
            Ok(self.0.to_string())
        }
        fn has_changes(&self) -> StoreResult<bool> {
            Ok(true)
        }
        fn switch_branch(&self, _branch: &str) -> StoreResult<()> {
            Ok(())
        }
    }

    struct Broken;

    impl VersionControl for Broken {
        fn current_branch(&self) -> StoreResult<String> {
            Err(StoreError::Vcs("no HEAD".to_string()))
        }
        fn has_changes(&self) -> StoreResult<bool> {
            Err(StoreError::Vcs("no HEAD".to_string()))
        }
        fn switch_branch(&self, _branch: &str) -> StoreResult<()> {
            Err(StoreError::Vcs("no HEAD".to_string()))
        }
    }

    #[test]
    fn test_name_from_directory() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("harmonyhub");
        std::fs::create_dir(&root).unwrap();

        let repo = Repository::with_vcs(&root, Box::new(Unversioned)).unwrap();
        assert_eq!(repo.name(), "harmonyhub");
        assert_eq!(repo.branch(), DEFAULT_BRANCH);
    }

    #[test]
    fn test_branch_from_vcs() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::with_vcs(temp.path(), Box::new(FixedBranch("develop"))).unwrap();
        assert_eq!(repo.branch(), "develop");
        assert!(repo.has_changes().unwrap());
    }

    #[test]
    fn test_branch_falls_back_when_vcs_fails() {
        let temp = TempDir::new().unwrap();
        let repo = Repository::with_vcs(temp.path(), Box::new(Broken)).unwrap();
        assert_eq!(repo.branch(), DEFAULT_BRANCH);
    }

    #[test]
    fn test_missing_directory() {
        let temp = TempDir::new().unwrap();
        let err = Repository::open(&temp.path().join("absent")).unwrap_err();
        assert!(err.is_not_found());
    }
}
