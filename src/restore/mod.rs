//! Restoring snapshot content into a working tree.
//!
//! A restore first plans every entry of every selected program (see
//! [`plan_program`]), then copies entry by entry. An entry whose
//! destination already exists is skipped unless `force` is set, in which
//! case the destination is removed first so no stale files survive.
//! Per-entry I/O failures are recorded and the restore carries on.

pub(crate) mod copy;
mod plan;

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{EntryFailure, StoreError, StoreResult};
use crate::events::{Event, SharedSink};
use crate::programs::{Config, PatternKind, ProgramSpec};
use crate::resolver::PathResolver;
use crate::store::{BackupSelector, SnapshotStore};

pub use plan::{plan_program, PlannedEntry};

/// Options for a top-level restore
#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Programs to restore; empty means every configured program in the snapshot
    pub programs: Vec<String>,
    pub selector: BackupSelector,
    pub force: bool,
    pub dry_run: bool,
}

/// Outcome of restoring one program
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProgramRestore {
    pub program: String,
    /// Restored (or, in a dry run, restorable) entries, relative to the target
    pub restored: Vec<PathBuf>,
    /// Entries left alone because the target already had them
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<EntryFailure>,
}

impl ProgramRestore {
    fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            ..Default::default()
        }
    }

    pub fn any_restored(&self) -> bool {
        !self.restored.is_empty()
    }
}

/// Outcome of a top-level restore
#[derive(Debug, Clone, Serialize)]
pub struct RestoreReport {
    pub snapshot: PathBuf,
    pub target: PathBuf,
    pub dry_run: bool,
    pub programs: Vec<ProgramRestore>,
}

impl RestoreReport {
    /// True when anything was restored, anything was deliberately skipped,
    /// or this was a dry run.
    pub fn succeeded(&self) -> bool {
        self.dry_run
            || self
                .programs
                .iter()
                .any(|p| p.any_restored() || !p.skipped.is_empty())
    }

    pub fn restored_count(&self) -> usize {
        self.programs.iter().map(|p| p.restored.len()).sum()
    }

    pub fn skipped_count(&self) -> usize {
        self.programs.iter().map(|p| p.skipped.len()).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntryFailure> {
        self.programs.iter().flat_map(|p| p.failed.iter())
    }

    pub fn program_keys(&self) -> Vec<String> {
        self.programs.iter().map(|p| p.program.clone()).collect()
    }
}

/// Copies snapshot content into target trees
pub struct Restorer<'a> {
    config: &'a Config,
    store: &'a SnapshotStore,
    resolver: PathResolver,
    sink: SharedSink,
}

impl<'a> Restorer<'a> {
    pub fn new(config: &'a Config, store: &'a SnapshotStore, sink: SharedSink) -> Self {
        Self {
            config,
            store,
            resolver: PathResolver::new(),
            sink,
        }
    }

    /// Restore one program from `snapshot` into `target_dir`.
    pub fn restore_program(
        &self,
        program: &ProgramSpec,
        snapshot: &Path,
        target_dir: &Path,
        force: bool,
        dry_run: bool,
    ) -> ProgramRestore {
        let mut outcome = ProgramRestore::new(&program.key);

        for entry in plan_program(&self.resolver, program, snapshot, target_dir) {
            if entry.existed && !force {
                self.sink.emit(Event::Skipped {
                    program: program.key.clone(),
                    path: entry.target.clone(),
                    reason: "already exists, use --force to overwrite".to_string(),
                });
                outcome.skipped.push(entry.relative);
                continue;
            }

            if dry_run {
                self.sink.emit(Event::WouldRestore {
                    program: program.key.clone(),
                    path: entry.target.clone(),
                });
                outcome.restored.push(entry.relative);
                continue;
            }

            match self.apply(&entry) {
                Ok(()) => {
                    self.sink.emit(Event::Restored {
                        program: program.key.clone(),
                        path: entry.target.clone(),
                    });
                    outcome.restored.push(entry.relative);
                }
                Err(e) => {
                    log::warn!("Failed to restore {}: {}", entry.target.display(), e);
                    self.sink.emit(Event::Failed {
                        path: entry.target.clone(),
                        error: e.to_string(),
                    });
                    outcome.failed.push(EntryFailure::new(entry.relative, e));
                }
            }
        }

        outcome
    }

    fn apply(&self, entry: &PlannedEntry) -> StoreResult<()> {
        if entry.existed {
            copy::remove_entry(&entry.target)?;
            self.sink.emit(Event::Removed {
                path: entry.target.clone(),
            });
        }
        match entry.kind {
            PatternKind::Directory => {
                copy::copy_dir(&self.resolver, &entry.source, &entry.target).map(|_| ())
            }
            PatternKind::File => copy::copy_file(&entry.source, &entry.target).map(|_| ()),
        }
    }

    /// Find a snapshot of `repository` and restore it into `target_dir`.
    ///
    /// Fails with `NotFound` when no snapshot matches the selector or a
    /// requested program is not configured.
    pub fn restore(
        &self,
        repository: &str,
        target_dir: &Path,
        options: &RestoreOptions,
    ) -> StoreResult<RestoreReport> {
        let snapshot = self
            .store
            .find_backup(repository, &options.selector)?
            .ok_or_else(|| {
                StoreError::not_found(format!("no snapshot of '{repository}' matches the selection"))
            })?;
        log::info!("Restoring {} into {}", snapshot.display(), target_dir.display());

        let programs = self.programs_to_restore(&snapshot, &options.programs)?;

        if !options.dry_run && !target_dir.exists() {
            fs::create_dir_all(target_dir).map_err(|e| StoreError::io(target_dir, e))?;
        }

        let programs = programs
            .into_iter()
            .map(|program| {
                self.restore_program(program, &snapshot, target_dir, options.force, options.dry_run)
            })
            .collect();

        let report = RestoreReport {
            snapshot,
            target: target_dir.to_path_buf(),
            dry_run: options.dry_run,
            programs,
        };
        log::info!(
            "Restore finished: {} restored, {} skipped",
            report.restored_count(),
            report.skipped_count()
        );
        Ok(report)
    }

    fn programs_to_restore(
        &self,
        snapshot: &Path,
        requested: &[String],
    ) -> StoreResult<Vec<&'a ProgramSpec>> {
        let present = self.store.programs_in(snapshot);

        if !requested.is_empty() {
            let selected = self.config.select(requested)?;
            for program in &selected {
                if !present.contains(&program.key) {
                    self.sink.emit(Event::Note(format!(
                        "{} has no entries in this snapshot",
                        program.name
                    )));
                }
            }
            return Ok(selected);
        }

        let mut selected = Vec::new();
        for key in present {
            match self.config.program(&key) {
                Some(program) => selected.push(program),
                None => self.sink.emit(Event::Warning(format!(
                    "Snapshot contains '{key}', which is not a configured program"
                ))),
            }
        }
        Ok(selected)
    }
}
