//! Migration of flat, branch-less snapshots into the hierarchical layout.
//!
//! A legacy snapshot keeps program directories directly under
//! `<backups>/<repo>/`. Migration copies them into a new
//! `<repo>/<branch>/<timestamp>/` snapshot and then moves the original
//! content aside to `<backups>/<repo>.legacy`. Either every step succeeds
//! or everything is put back the way it was.

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EntryFailure, IoResultExt, StoreError, StoreResult};
use crate::events::{Event, SharedSink};
use crate::programs::Config;
use crate::restore::copy::{copy_tree, move_entry};
use crate::store::{self, SnapshotStore, Timestamp, LEGACY_SUFFIX};

/// One migrated (or, in a dry run, migratable) legacy snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigratedBackup {
    pub repository: String,
    pub legacy: PathBuf,
    pub snapshot: PathBuf,
    /// Where the original content was moved
    pub archived_to: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationReport {
    pub dry_run: bool,
    pub migrated: Vec<MigratedBackup>,
    pub failed: Vec<EntryFailure>,
}

impl MigrationReport {
    /// True when nothing needed migrating or every attempt succeeded.
    pub fn succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Entries moved out of the repository directory, for rollback
struct MovedEntries {
    moves: Vec<(PathBuf, PathBuf)>,
}

impl MovedEntries {
    fn rollback(self) {
        for (from, to) in self.moves.into_iter().rev() {
            if let Err(e) = move_entry(&to, &from) {
                log::error!(
                    "Could not move {} back to {}: {}",
                    to.display(),
                    from.display(),
                    e
                );
            }
        }
    }
}

pub struct MigrationEngine<'a> {
    config: &'a Config,
    store: &'a SnapshotStore,
    sink: SharedSink,
}

impl<'a> MigrationEngine<'a> {
    pub fn new(config: &'a Config, store: &'a SnapshotStore, sink: SharedSink) -> Self {
        Self { config, store, sink }
    }

    /// True for a directory that directly holds at least one configured
    /// program directory and is not already marked `.legacy`.
    pub fn is_legacy_backup(&self, dir: &Path) -> bool {
        let marked = dir
            .file_name()
            .is_some_and(|n| n.to_string_lossy().ends_with(LEGACY_SUFFIX));
        !marked && !self.program_dirs(dir).is_empty()
    }

    /// Repository directories under the backups root still in the flat layout.
    pub fn get_legacy_backups(&self) -> Vec<PathBuf> {
        store::subdirs(self.store.root())
            .into_iter()
            .filter(|dir| self.is_legacy_backup(dir))
            .collect()
    }

    /// Migrate one legacy snapshot onto `branch`.
    ///
    /// In a dry run the planned locations are returned and nothing is
    /// touched. On failure the new snapshot is deleted and the legacy
    /// directory is left as it was.
    pub fn migrate_backup(&self, legacy: &Path, branch: &str, dry_run: bool) -> StoreResult<MigratedBackup> {
        let repository = legacy
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| StoreError::not_found(format!("repository name of '{}'", legacy.display())))?;

        let branch_dir = store::branch_dir_name(branch);
        if self.config.has_program(&branch_dir) {
            return Err(StoreError::Config(format!(
                "branch '{branch}' clashes with a program of the same name"
            )));
        }

        let snapshot = self.store.new_snapshot_path(&repository, branch);
        let archived_to = self.archive_path(&repository, &snapshot);
        let migrated = MigratedBackup {
            repository,
            legacy: legacy.to_path_buf(),
            snapshot,
            archived_to,
        };

        if dry_run {
            self.sink.emit(Event::WouldMigrate {
                from: migrated.legacy.clone(),
                to: migrated.snapshot.clone(),
            });
            return Ok(migrated);
        }

        let mut moved = MovedEntries { moves: Vec::new() };
        match self.apply(&migrated, &branch_dir, &mut moved) {
            Ok(()) => {
                log::info!(
                    "Migrated {} to {}",
                    migrated.legacy.display(),
                    migrated.snapshot.display()
                );
                self.sink.emit(Event::Migrated {
                    from: migrated.legacy.clone(),
                    to: migrated.snapshot.clone(),
                });
                Ok(migrated)
            }
            Err(e) => {
                log::error!("Migration of {} failed: {}", migrated.legacy.display(), e);
                moved.rollback();
                if migrated.snapshot.exists() {
                    if let Err(cleanup) = fs::remove_dir_all(&migrated.snapshot) {
                        log::error!("Could not remove {}: {}", migrated.snapshot.display(), cleanup);
                    }
                }
                if let Some(parent) = migrated.snapshot.parent() {
                    self.store.prune_empty_parents(parent);
                }
                if let Err(cleanup) = fs::remove_dir(&migrated.archived_to) {
                    log::debug!("Left {} in place: {}", migrated.archived_to.display(), cleanup);
                }
                Err(e)
            }
        }
    }

    fn apply(&self, migrated: &MigratedBackup, branch_dir: &str, moved: &mut MovedEntries) -> StoreResult<()> {
        fs::create_dir_all(&migrated.snapshot).at_path(&migrated.snapshot)?;
        for program_dir in self.program_dirs(&migrated.legacy) {
            let Some(name) = program_dir.file_name() else {
                continue;
            };
            copy_tree(&program_dir, &migrated.snapshot.join(name))?;
        }

        fs::create_dir_all(&migrated.archived_to).at_path(&migrated.archived_to)?;
        let entries = fs::read_dir(&migrated.legacy)
            .at_path(&migrated.legacy)?
            .collect::<Result<Vec<_>, _>>()
            .at_path(&migrated.legacy)?;
        for entry in entries {
            let path = entry.path();
            if self.is_branch_dir(&path, branch_dir) {
                continue;
            }
            let dest = migrated.archived_to.join(entry.file_name());
            move_entry(&path, &dest)?;
            moved.moves.push((path, dest));
        }
        Ok(())
    }

    /// Migrate every legacy snapshot, optionally only for `repos`.
    ///
    /// One repository's failure does not stop the others.
    pub fn migrate(&self, repos: &[String], branch: &str, dry_run: bool) -> MigrationReport {
        let mut report = MigrationReport {
            dry_run,
            ..Default::default()
        };

        let legacy: Vec<PathBuf> = self
            .get_legacy_backups()
            .into_iter()
            .filter(|dir| {
                repos.is_empty()
                    || dir
                        .file_name()
                        .is_some_and(|n| repos.iter().any(|r| *r == n.to_string_lossy()))
            })
            .collect();

        if legacy.is_empty() {
            self.sink.emit(Event::Note("No legacy backups found".to_string()));
            return report;
        }

        for dir in legacy {
            match self.migrate_backup(&dir, branch, dry_run) {
                Ok(migrated) => report.migrated.push(migrated),
                Err(e) => {
                    self.sink.emit(Event::Failed {
                        path: dir.clone(),
                        error: e.to_string(),
                    });
                    report.failed.push(EntryFailure::new(dir, e));
                }
            }
        }
        report
    }

    fn program_dirs(&self, dir: &Path) -> Vec<PathBuf> {
        store::subdirs(dir)
            .into_iter()
            .filter(|d| {
                d.file_name()
                    .is_some_and(|n| self.config.has_program(&n.to_string_lossy()))
            })
            .collect()
    }

    /// Branch directories of the new layout stay where they are.
    fn is_branch_dir(&self, path: &Path, migration_branch: &str) -> bool {
        if !path.is_dir() {
            return false;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
            return false;
        };
        if name == migration_branch {
            return true;
        }
        if self.config.has_program(&name) {
            return false;
        }
        let Ok(entries) = fs::read_dir(path) else {
            return false;
        };
        entries.filter_map(|e| e.ok()).all(|e| {
            e.file_type().map(|t| t.is_dir()).unwrap_or(false)
                && Timestamp::parse(&e.file_name().to_string_lossy()).is_some()
        })
    }

    fn archive_path(&self, repository: &str, snapshot: &Path) -> PathBuf {
        let preferred = self.store.root().join(format!("{repository}{LEGACY_SUFFIX}"));
        if !preferred.exists() {
            return preferred;
        }
        let stamp = snapshot
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.store
            .root()
            .join(format!("{repository}.{stamp}{LEGACY_SUFFIX}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn legacy_fixture() -> (TempDir, SnapshotStore) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("backups");
        write(&root, "repo/cursor/.cursor/.cursorrules", "x");
        write(&root, "repo/vscode/.vscode/settings.json", "{}");
        write(&root, "repo/notes.txt", "stray");
        write(&root, "current/main/20250101-000000/cursor/.cursorrules", "y");
        (temp, SnapshotStore::new(root))
    }

    #[test]
    fn test_detects_only_flat_layouts() {
        let (_temp, store) = legacy_fixture();
        let config = Config::default();
        let engine = MigrationEngine::new(&config, &store, RecordingSink::new());

        assert_eq!(engine.get_legacy_backups(), vec![store.root().join("repo")]);
        assert!(!engine.is_legacy_backup(&store.root().join("current")));
    }

    #[test]
    fn test_migrate_moves_original_aside() {
        let (_temp, store) = legacy_fixture();
        let config = Config::default();
        let engine = MigrationEngine::new(&config, &store, RecordingSink::new());
        let legacy = store.root().join("repo");

        let migrated = engine.migrate_backup(&legacy, "main", false).unwrap();

        assert!(migrated.snapshot.starts_with(legacy.join("main")));
        assert_eq!(
            fs::read_to_string(migrated.snapshot.join("cursor/.cursor/.cursorrules")).unwrap(),
            "x"
        );
        assert!(!legacy.join("cursor").exists());
        assert!(!legacy.join("notes.txt").exists());
        assert_eq!(migrated.archived_to, store.root().join("repo.legacy"));
        assert!(migrated.archived_to.join("cursor/.cursor/.cursorrules").exists());
        assert!(migrated.archived_to.join("notes.txt").exists());
        assert!(engine.get_legacy_backups().is_empty());
        assert_eq!(store.list_backups(Some("repo")), vec![migrated.snapshot]);
    }

    #[test]
    fn test_dry_run_plans_only() {
        let (_temp, store) = legacy_fixture();
        let config = Config::default();
        let engine = MigrationEngine::new(&config, &store, RecordingSink::new());

        let report = engine.migrate(&[], "main", true);

        assert!(report.succeeded());
        assert_eq!(report.migrated.len(), 1);
        assert!(!report.migrated[0].snapshot.exists());
        assert!(store.root().join("repo/cursor").exists());
        assert!(!store.root().join("repo.legacy").exists());
    }

    #[test]
    fn test_existing_legacy_name_gets_timestamp() {
        let (_temp, store) = legacy_fixture();
        fs::create_dir_all(store.root().join("repo.legacy")).unwrap();
        let config = Config::default();
        let engine = MigrationEngine::new(&config, &store, RecordingSink::new());

        let migrated = engine.migrate_backup(&store.root().join("repo"), "main", false).unwrap();

        let name = migrated.archived_to.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("repo.") && name.ends_with(".legacy"));
        assert_ne!(name, "repo.legacy");
    }

    #[test]
    fn test_filter_by_repository() {
        let (_temp, store) = legacy_fixture();
        let config = Config::default();
        let engine = MigrationEngine::new(&config, &store, RecordingSink::new());

        let report = engine.migrate(&["other".to_string()], "main", false);

        assert!(report.succeeded());
        assert!(report.migrated.is_empty());
        assert!(store.root().join("repo/cursor").exists());
    }

    #[test]
    fn test_branch_named_like_program_is_refused() {
        let (_temp, store) = legacy_fixture();
        let config = Config::default();
        let engine = MigrationEngine::new(&config, &store, RecordingSink::new());
        let legacy = store.root().join("repo");

        assert!(engine.migrate_backup(&legacy, "cursor", false).is_err());
        assert!(legacy.join("cursor/.cursor/.cursorrules").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_rolls_back() {
        let (_temp, store) = legacy_fixture();
        let legacy = store.root().join("repo");
        let dangling = legacy.join("vscode/.vscode/gone.json");
        std::os::unix::fs::symlink(legacy.join("vscode/.vscode/missing"), &dangling).unwrap();

        let config = Config::default();
        let sink = RecordingSink::new();
        let engine = MigrationEngine::new(&config, &store, sink.clone());
        let report = engine.migrate(&[], "main", false);

        assert!(!report.succeeded());
        assert_eq!(report.failed.len(), 1);
        assert!(report.migrated.is_empty());
        assert!(legacy.join("cursor/.cursor/.cursorrules").exists());
        assert!(legacy.join("vscode/.vscode/settings.json").exists());
        assert!(fs::symlink_metadata(&dangling).is_ok());
        assert!(legacy.join("notes.txt").exists());
        assert!(!legacy.join("main").exists());
        assert!(!store.root().join("repo.legacy").exists());
        assert!(sink.events().iter().all(|e| !matches!(e, Event::Migrated { .. })));
        assert_eq!(engine.get_legacy_backups(), vec![legacy]);
    }
}
