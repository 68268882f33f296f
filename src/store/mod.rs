//! Snapshot store layout and lookup.
//!
//! Snapshots live at `<root>/<repository>/<branch>/<timestamp>/<program>/...`.
//! The store computes those paths, lists and finds snapshots, and removes
//! them on request. It never writes snapshot content itself.

mod selector;
mod timestamp;

use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, StoreResult};
use crate::repository::Repository;

pub use selector::BackupSelector;
pub use timestamp::{Timestamp, TimestampClock};

/// Suffix marking a migrated legacy snapshot
pub const LEGACY_SUFFIX: &str = ".legacy";

/// One snapshot directory, described by its position in the layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    pub repository: String,
    pub branch: String,
    pub timestamp: Timestamp,
    pub path: PathBuf,
    pub programs: Vec<String>,
    /// Per-program file listing, filled by [`with_contents`](Self::with_contents)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub contents: Vec<ProgramContents>,
}

impl SnapshotInfo {
    /// Describe a snapshot path of the form `.../<repo>/<branch>/<timestamp>`.
    pub fn from_path(path: &Path) -> Option<Self> {
        let timestamp = Timestamp::parse(&file_name(path)?)?;
        let branch_dir = path.parent()?;
        let branch = file_name(branch_dir)?;
        let repository = file_name(branch_dir.parent()?)?;

        Some(SnapshotInfo {
            repository,
            branch,
            timestamp,
            path: path.to_path_buf(),
            programs: program_dirs(path),
            contents: Vec::new(),
        })
    }

    /// Scan every program subtree for its files.
    pub fn with_contents(mut self) -> Self {
        self.contents = self
            .programs
            .iter()
            .map(|program| ProgramContents::scan(program, &self.path.join(program)))
            .collect();
        self
    }
}

/// Files stored for one program inside a snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgramContents {
    pub program: String,
    /// Paths relative to the program directory, sorted
    pub files: Vec<PathBuf>,
    pub bytes: u64,
}

impl ProgramContents {
    fn scan(program: &str, dir: &Path) -> Self {
        let mut files = Vec::new();
        let mut bytes = 0;
        for entry in walkdir::WalkDir::new(dir).follow_links(false).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::debug!("Skipping unreadable entry under {}: {}", dir.display(), e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(dir) {
                bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
                files.push(relative.to_path_buf());
            }
        }
        Self {
            program: program.to_string(),
            files,
            bytes,
        }
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }
}

/// Filesystem-backed snapshot store rooted at the backups directory
#[derive(Debug)]
pub struct SnapshotStore {
    root: PathBuf,
    clock: TimestampClock,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            clock: TimestampClock::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn repo_dir(&self, repository: &str) -> PathBuf {
        self.root.join(repository)
    }

    pub fn branch_dir(&self, repository: &str, branch: &str) -> PathBuf {
        self.repo_dir(repository).join(branch_dir_name(branch))
    }

    /// A fresh, strictly increasing timestamp.
    pub fn next_timestamp(&self) -> Timestamp {
        self.clock.next()
    }

    /// Where a new snapshot of `repository` on its current branch goes.
    ///
    /// The directory is not created.
    pub fn backup_path(&self, repository: &Repository) -> PathBuf {
        self.new_snapshot_path(repository.name(), repository.branch())
    }

    /// Where a new snapshot for an explicit repository name and branch goes.
    pub fn new_snapshot_path(&self, repository: &str, branch: &str) -> PathBuf {
        let timestamp = self.next_timestamp();
        self.branch_dir(repository, branch).join(timestamp.as_str())
    }

    /// All snapshots, newest first, optionally for one repository only.
    ///
    /// A missing backups root or repository yields an empty list.
    pub fn list_backups(&self, repository: Option<&str>) -> Vec<PathBuf> {
        let repo_dirs = match repository {
            Some(name) => vec![self.repo_dir(name)],
            None => subdirs(&self.root)
                .into_iter()
                .filter(|dir| {
                    file_name(dir).is_some_and(|name| !name.ends_with(LEGACY_SUFFIX))
                })
                .collect(),
        };

        let mut snapshots: Vec<(Timestamp, PathBuf)> = repo_dirs
            .iter()
            .flat_map(|repo_dir| subdirs(repo_dir))
            .flat_map(|branch_dir| timestamp_dirs(&branch_dir))
            .collect();

        sort_newest_first(&mut snapshots);
        snapshots.into_iter().map(|(_, path)| path).collect()
    }

    /// The newest snapshot of every repository/branch pair, newest first.
    pub fn latest_per_branch(&self, repository: Option<&str>) -> Vec<PathBuf> {
        let mut seen = BTreeSet::new();
        self.list_backups(repository)
            .into_iter()
            .filter(|snapshot| {
                snapshot
                    .parent()
                    .is_some_and(|branch_dir| seen.insert(branch_dir.to_path_buf()))
            })
            .collect()
    }

    /// Like [`list_backups`](Self::list_backups), with layout details.
    pub fn snapshots(&self, repository: Option<&str>) -> Vec<SnapshotInfo> {
        self.list_backups(repository)
            .iter()
            .filter_map(|path| SnapshotInfo::from_path(path))
            .collect()
    }

    /// Like [`latest_per_branch`](Self::latest_per_branch), with layout details.
    pub fn latest_snapshots(&self, repository: Option<&str>) -> Vec<SnapshotInfo> {
        self.latest_per_branch(repository)
            .iter()
            .filter_map(|path| SnapshotInfo::from_path(path))
            .collect()
    }

    /// Find one snapshot of `repository` matching `selector`.
    ///
    /// Returns `Ok(None)` when nothing matches; errors only on a malformed
    /// date selector.
    pub fn find_backup(
        &self,
        repository: &str,
        selector: &BackupSelector,
    ) -> StoreResult<Option<PathBuf>> {
        let date_filter = selector.date_filter()?;

        let mut candidates = match &selector.branch {
            Some(branch) => timestamp_dirs(&self.branch_dir(repository, branch)),
            None => subdirs(&self.repo_dir(repository))
                .iter()
                .flat_map(|branch_dir| timestamp_dirs(branch_dir))
                .collect(),
        };
        sort_newest_first(&mut candidates);

        let found = candidates
            .into_iter()
            .find(|(ts, _)| date_filter.as_ref().is_none_or(|filter| filter.matches(ts)))
            .map(|(_, path)| path);

        match &found {
            Some(path) => log::debug!("Selected snapshot {}", path.display()),
            None => log::debug!("No snapshot of {} matches {:?}", repository, selector),
        }
        Ok(found)
    }

    /// Program subtrees present in a snapshot, sorted.
    pub fn programs_in(&self, snapshot: &Path) -> Vec<String> {
        program_dirs(snapshot)
    }

    /// Delete one snapshot and any branch/repository directory it leaves empty.
    pub fn remove_backup(&self, snapshot: &Path) -> StoreResult<()> {
        fs::remove_dir_all(snapshot).at_path(snapshot)?;
        log::info!("Removed snapshot {}", snapshot.display());
        if let Some(parent) = snapshot.parent() {
            self.prune_empty_parents(parent);
        }
        Ok(())
    }

    /// Remove `dir` and its ancestors while they are empty, stopping at the root.
    pub fn prune_empty_parents(&self, dir: &Path) {
        let mut current = Some(dir);
        while let Some(path) = current {
            if path == self.root || !path.starts_with(&self.root) {
                break;
            }
            let is_empty = fs::read_dir(path)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if !is_empty || fs::remove_dir(path).is_err() {
                break;
            }
            current = path.parent();
        }
    }
}

/// Directory name used for a branch; separators in branch names are flattened.
pub fn branch_dir_name(branch: &str) -> String {
    branch.replace(['/', '\\'], "-")
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_string())
}

/// Immediate subdirectories, sorted. Unreadable directories yield nothing.
pub(crate) fn subdirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    dirs.sort();
    dirs
}

fn timestamp_dirs(branch_dir: &Path) -> Vec<(Timestamp, PathBuf)> {
    subdirs(branch_dir)
        .into_iter()
        .filter_map(|dir| {
            let ts = Timestamp::parse(&file_name(&dir)?)?;
            Some((ts, dir))
        })
        .collect()
}

fn program_dirs(snapshot: &Path) -> Vec<String> {
    subdirs(snapshot)
        .iter()
        .filter_map(|dir| file_name(dir))
        .collect()
}

fn sort_newest_first(snapshots: &mut [(Timestamp, PathBuf)]) {
    snapshots.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
}
