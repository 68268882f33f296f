//! Error types for snapshot store operations.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for snapshot store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Coarse classification of a [`StoreError`].
///
/// Callers use this to tell "nothing to do" apart from "something broke"
/// without matching on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    IoFailure,
    ValidationMismatch,
    Config,
    Vcs,
    InvalidSelector,
}

/// Errors that can occur while backing up, restoring or migrating snapshots.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No snapshot, program, repository or branch matches a selector.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The target already holds an entry the snapshot would overwrite.
    #[error("Conflict: '{}' already exists (snapshot entry '{}')", target.display(), snapshot.display())]
    Conflict { target: PathBuf, snapshot: PathBuf },

    /// A filesystem operation failed.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Restored content differs from the snapshot.
    #[error("Validation failed for {failed} entries")]
    ValidationMismatch { failed: usize },

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The version-control capability failed or refused an operation.
    #[error("Version control error: {0}")]
    Vcs(String),

    /// A branch/date selector could not be interpreted.
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

impl StoreError {
    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Wrap an I/O error together with the path it happened on.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::Conflict { .. } => ErrorKind::Conflict,
            StoreError::Io { .. } => ErrorKind::IoFailure,
            StoreError::ValidationMismatch { .. } => ErrorKind::ValidationMismatch,
            StoreError::Config(_) => ErrorKind::Config,
            StoreError::Vcs(_) => ErrorKind::Vcs,
            StoreError::InvalidSelector(_) => ErrorKind::InvalidSelector,
        }
    }

    /// True when the error only means there was nothing to act on.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Extension trait attaching a path to `std::io::Result` values.
pub(crate) trait IoResultExt<T> {
    fn at_path(self, path: impl AsRef<Path>) -> StoreResult<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at_path(self, path: impl AsRef<Path>) -> StoreResult<T> {
        self.map_err(|e| StoreError::io(path, e))
    }
}

/// A single entry that could not be processed.
///
/// Recorded in operation reports instead of aborting the whole operation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EntryFailure {
    pub path: PathBuf,
    pub error: String,
}

impl EntryFailure {
    pub fn new(path: impl Into<PathBuf>, error: impl std::fmt::Display) -> Self {
        Self {
            path: path.into(),
            error: error.to_string(),
        }
    }
}
