//! Git backend using CLI commands.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::VersionControl;
use crate::error::{StoreError, StoreResult};

/// Git implementation using the git CLI.
pub struct GitScm {
    workdir: PathBuf,
}

impl GitScm {
    /// Open an existing Git repository.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if !path.join(".git").exists() {
            return Err(StoreError::Vcs(format!(
                "Not a git repository: '{}' (no .git directory)",
                path.display()
            )));
        }

        Ok(Self { workdir: path })
    }

    /// Initialize a new Git repository with a local identity.
    ///
    /// Repository setup for tests; not part of the backup capability.
    #[doc(hidden)]
    pub fn init(path: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(path).map_err(|e| StoreError::io(path, e))?;

        let output = Command::new("git")
            .args(["init"])
            .current_dir(path)
            .output()
            .map_err(|e| StoreError::Vcs(format!("Failed to run 'git init': {e}")))?;

        if !output.status.success() {
            return Err(StoreError::Vcs(format!(
                "git init failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        // Configure user name and email if not set
        let _ = Command::new("git")
            .args(["config", "user.name", "Dotfiles"])
            .current_dir(path)
            .output();
        let _ = Command::new("git")
            .args(["config", "user.email", "dotfiles@local"])
            .current_dir(path)
            .output();

        Self::open(path)
    }

    /// Check whether the git executable can be run at all.
    pub fn is_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Stage all changes (add and remove). Test setup only.
    #[doc(hidden)]
    pub fn stage_all(&self) -> StoreResult<()> {
        self.run_git(&["add", "-A"]).map(|_| ())
    }

    /// Commit staged changes with a message. Test setup only.
    #[doc(hidden)]
    pub fn commit(&self, message: &str) -> StoreResult<()> {
        self.run_git(&["commit", "-m", message]).map(|_| ())
    }

    /// Create a branch and check it out. Test setup only.
    #[doc(hidden)]
    pub fn create_branch(&self, branch: &str) -> StoreResult<()> {
        self.run_git(&["checkout", "-b", branch]).map(|_| ())
    }

    /// Run a git command and return stdout as a string.
    fn run_git(&self, args: &[&str]) -> StoreResult<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .map_err(|e| StoreError::Vcs(format!("Failed to run 'git {}': {e}", args.join(" "))))?;

        if !output.status.success() {
            return Err(StoreError::Vcs(format!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl VersionControl for GitScm {
    fn current_branch(&self) -> StoreResult<String> {
        let branch = self.run_git(&["branch", "--show-current"])?;
        if branch.is_empty() {
            return Err(StoreError::Vcs("HEAD is detached".to_string()));
        }
        Ok(branch)
    }

    fn has_changes(&self) -> StoreResult<bool> {
        let output = self.run_git(&["status", "--porcelain"])?;
        Ok(!output.is_empty())
    }

    fn switch_branch(&self, branch: &str) -> StoreResult<()> {
        if self.has_changes()? {
            return Err(StoreError::Vcs(format!(
                "cannot switch to '{branch}': working tree has uncommitted changes"
            )));
        }
        self.run_git(&["checkout", branch]).map(|_| ())
    }
}
