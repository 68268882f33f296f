//! Snapshot creation.
//!
//! A backup resolves every selected program against the repository root
//! and copies each entry to `<snapshot>/<program>/<relative path>`. A
//! snapshot that ends up empty is removed again.

use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{EntryFailure, IoResultExt, StoreError, StoreResult};
use crate::events::{Event, SharedSink};
use crate::programs::{Config, ProgramSpec};
use crate::repository::Repository;
use crate::resolver::PathResolver;
use crate::restore::copy::copy_file;
use crate::store::SnapshotStore;

#[derive(Debug, Clone, Default)]
pub struct BackupOptions {
    /// Programs to back up; empty means every configured program
    pub programs: Vec<String>,
    /// Branch to switch to before backing up
    pub branch: Option<String>,
    pub dry_run: bool,
    /// Also write `<snapshot>.zip`
    pub zip_export: bool,
}

/// Outcome of backing up one program
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProgramBackup {
    pub program: String,
    /// Backed up (or, in a dry run, backup-able) paths relative to the repository
    pub entries: Vec<PathBuf>,
    pub failed: Vec<EntryFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BackupReport {
    pub repository: String,
    pub branch: String,
    pub snapshot: PathBuf,
    pub dry_run: bool,
    pub programs: Vec<ProgramBackup>,
    /// Zip archive written next to the snapshot
    pub archive: Option<PathBuf>,
}

impl BackupReport {
    pub fn entry_count(&self) -> usize {
        self.programs.iter().map(|p| p.entries.len()).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntryFailure> {
        self.programs.iter().flat_map(|p| p.failed.iter())
    }

    /// True when something was (or would be) backed up.
    pub fn succeeded(&self) -> bool {
        self.entry_count() > 0
    }
}

/// Creates snapshots of a repository's program files
pub struct BackupManager<'a> {
    config: &'a Config,
    store: &'a SnapshotStore,
    resolver: PathResolver,
    sink: SharedSink,
}

impl<'a> BackupManager<'a> {
    pub fn new(config: &'a Config, store: &'a SnapshotStore, sink: SharedSink) -> Self {
        Self {
            config,
            store,
            resolver: PathResolver::new(),
            sink,
        }
    }

    /// Back up `repository` into a fresh snapshot.
    ///
    /// Switching branches is refused while the working tree has uncommitted
    /// changes. Unknown program names fail with `NotFound` before anything
    /// is written.
    pub fn backup(&self, repository: &mut Repository, options: &BackupOptions) -> StoreResult<BackupReport> {
        let programs: Vec<&ProgramSpec> = if options.programs.is_empty() {
            self.config.programs().collect()
        } else {
            self.config.select(&options.programs)?
        };

        if let Some(branch) = options.branch.as_deref() {
            if branch != repository.branch() {
                if repository.has_changes()? {
                    return Err(StoreError::Vcs(format!(
                        "cannot switch {} to '{}': working tree has uncommitted changes",
                        repository.name(),
                        branch
                    )));
                }
                repository.switch_branch(branch)?;
            }
        }

        let snapshot = self.store.backup_path(repository);
        log::info!(
            "Backing up {} ({}) to {}",
            repository.name(),
            repository.branch(),
            snapshot.display()
        );

        let programs: Vec<ProgramBackup> = programs
            .into_iter()
            .map(|program| self.backup_program(program, repository.root(), &snapshot, options.dry_run))
            .collect();

        let mut report = BackupReport {
            repository: repository.name().to_string(),
            branch: repository.branch().to_string(),
            snapshot,
            dry_run: options.dry_run,
            programs,
            archive: None,
        };

        if options.dry_run {
            return Ok(report);
        }

        if !report.succeeded() {
            self.discard_empty(&report.snapshot);
            self.sink.emit(Event::Warning(format!(
                "Nothing to back up in {}",
                repository.root().display()
            )));
            return Ok(report);
        }

        if options.zip_export {
            match export_zip(&report.snapshot) {
                Ok(archive) => {
                    self.sink.emit(Event::Note(format!("Created zip archive {}", archive.display())));
                    report.archive = Some(archive);
                }
                // The snapshot itself is complete; a missing archive is only a warning
                Err(e) => self
                    .sink
                    .emit(Event::Warning(format!("Backup succeeded but zip creation failed: {e}"))),
            }
        }

        Ok(report)
    }

    /// Copy one program's resolved entries into `snapshot`.
    pub fn backup_program(
        &self,
        program: &ProgramSpec,
        repo_root: &Path,
        snapshot: &Path,
        dry_run: bool,
    ) -> ProgramBackup {
        let mut outcome = ProgramBackup {
            program: program.key.clone(),
            ..Default::default()
        };
        let program_dir = snapshot.join(&program.key);

        for entry in self.resolver.resolve(repo_root, &program.paths) {
            if dry_run {
                self.sink.emit(Event::WouldBackUp {
                    program: program.key.clone(),
                    path: entry.relative.clone(),
                });
                outcome.entries.push(entry.relative);
                continue;
            }

            match copy_file(&entry.absolute, &program_dir.join(&entry.relative)) {
                Ok(_) => {
                    self.sink.emit(Event::BackedUp {
                        program: program.key.clone(),
                        path: entry.relative.clone(),
                    });
                    outcome.entries.push(entry.relative);
                }
                Err(e) => {
                    log::warn!("Failed to back up {}: {}", entry.absolute.display(), e);
                    self.sink.emit(Event::Failed {
                        path: entry.absolute.clone(),
                        error: e.to_string(),
                    });
                    outcome.failed.push(EntryFailure::new(entry.relative, e));
                }
            }
        }

        if outcome.entries.is_empty() {
            self.sink.emit(Event::Note(format!("No files found for {}", program.name)));
        }
        outcome
    }

    fn discard_empty(&self, snapshot: &Path) {
        if snapshot.exists() {
            if let Err(e) = self.store.remove_backup(snapshot) {
                log::warn!("Could not remove empty snapshot: {e}");
            }
        } else if let Some(branch_dir) = snapshot.parent() {
            self.store.prune_empty_parents(branch_dir);
        }
    }
}

/// Archive a snapshot as `<snapshot>.zip`, paths relative to the snapshot.
///
/// A partially written archive is deleted on failure.
pub fn export_zip(snapshot: &Path) -> StoreResult<PathBuf> {
    if !snapshot.is_dir() {
        return Err(StoreError::not_found(format!("snapshot '{}'", snapshot.display())));
    }
    let archive = snapshot.with_extension("zip");

    let result = write_zip(snapshot, &archive);
    if result.is_err() && archive.exists() {
        if let Err(e) = fs::remove_file(&archive) {
            log::debug!("Could not remove partial archive {}: {}", archive.display(), e);
        }
    }
    result.map(|_| archive)
}

fn write_zip(snapshot: &Path, archive: &Path) -> StoreResult<()> {
    let file = File::create(archive).at_path(archive)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let zip_err = |e: zip::result::ZipError| StoreError::io(archive, io::Error::other(e));

    for entry in WalkDir::new(snapshot).sort_by_file_name() {
        let entry = entry.map_err(|e| StoreError::io(snapshot, io::Error::other(e)))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(snapshot) else {
            continue;
        };
        let name = relative.to_string_lossy().replace('\\', "/");

        writer.start_file(name, options).map_err(zip_err)?;
        let content = fs::read(entry.path()).at_path(entry.path())?;
        writer.write_all(&content).at_path(archive)?;
    }

    writer.finish().map_err(zip_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use crate::scm::Unversioned;
    use std::io::Read;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn setup() -> (TempDir, Repository, SnapshotStore) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("repo");
        write(&root, ".cursor/.cursorrules", "x");
        write(&root, ".vscode/settings.json", "{}");
        write(&root, ".windsurfrules", "");
        let repo = Repository::with_vcs(&root, Box::new(Unversioned)).unwrap();
        let store = SnapshotStore::new(temp.path().join("backups"));
        (temp, repo, store)
    }

    #[test]
    fn test_backup_preserves_relative_paths() {
        let (_temp, mut repo, store) = setup();
        let config = Config::default();
        let manager = BackupManager::new(&config, &store, RecordingSink::new());

        let report = manager.backup(&mut repo, &BackupOptions::default()).unwrap();

        assert!(report.succeeded());
        assert!(report.snapshot.starts_with(store.root().join("repo").join("main")));
        assert_eq!(
            fs::read_to_string(report.snapshot.join("cursor/.cursor/.cursorrules")).unwrap(),
            "x"
        );
        assert_eq!(
            fs::read_to_string(report.snapshot.join("vscode/.vscode/settings.json")).unwrap(),
            "{}"
        );
        // Zero-byte files and programs without entries leave no trace
        assert!(!report.snapshot.join("windsurf").exists());
        assert!(!report.snapshot.join("git").exists());
    }

    #[test]
    fn test_empty_snapshot_is_removed() {
        let (_temp, mut repo, store) = setup();
        let config = Config::default();
        let manager = BackupManager::new(&config, &store, RecordingSink::new());
        let options = BackupOptions {
            programs: vec!["git".to_string()],
            ..Default::default()
        };

        let report = manager.backup(&mut repo, &options).unwrap();

        assert!(!report.succeeded());
        assert!(!report.snapshot.exists());
        assert!(store.list_backups(Some("repo")).is_empty());
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let (_temp, mut repo, store) = setup();
        let config = Config::default();
        let sink = RecordingSink::new();
        let manager = BackupManager::new(&config, &store, sink.clone());
        let options = BackupOptions {
            dry_run: true,
            ..Default::default()
        };

        let report = manager.backup(&mut repo, &options).unwrap();

        assert!(report.succeeded());
        assert!(!store.root().exists());
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, Event::WouldBackUp { program, .. } if program == "cursor")));
    }

    #[test]
    fn test_unknown_program() {
        let (_temp, mut repo, store) = setup();
        let config = Config::default();
        let manager = BackupManager::new(&config, &store, RecordingSink::new());
        let options = BackupOptions {
            programs: vec!["emacs".to_string()],
            ..Default::default()
        };

        let err = manager.backup(&mut repo, &options).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_branch_switch_without_vcs_fails() {
        let (_temp, mut repo, store) = setup();
        let config = Config::default();
        let manager = BackupManager::new(&config, &store, RecordingSink::new());
        let options = BackupOptions {
            branch: Some("develop".to_string()),
            ..Default::default()
        };

        assert!(manager.backup(&mut repo, &options).is_err());
        assert!(!store.root().exists());
    }

    #[test]
    fn test_zip_export() {
        let (_temp, mut repo, store) = setup();
        let config = Config::default();
        let manager = BackupManager::new(&config, &store, RecordingSink::new());
        let options = BackupOptions {
            zip_export: true,
            ..Default::default()
        };

        let report = manager.backup(&mut repo, &options).unwrap();
        let archive = report.archive.clone().unwrap();
        assert_eq!(archive, report.snapshot.with_extension("zip"));

        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut content = String::new();
        zip.by_name("cursor/.cursor/.cursorrules")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "x");

        // The archive sits beside the snapshot and is not listed as one
        assert_eq!(store.list_backups(Some("repo")), vec![report.snapshot]);
    }
}
