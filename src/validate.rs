//! Post-restore validation.
//!
//! Checks that every entry a restore would write from a snapshot is present
//! in the target with identical content. Mismatches are data, not errors:
//! callers that want an error use [`ValidationReport::into_result`].

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};
use crate::events::{Event, SharedSink};
use crate::programs::{PatternKind, ProgramSpec};
use crate::resolver::PathResolver;
use crate::restore::{plan_program, PlannedEntry};

/// Names listed per category before the rest is summarised
const MAX_LISTED: usize = 3;

/// Why an entry failed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureReason {
    Missing {
        kind: PatternKind,
    },
    WrongType {
        expected: PatternKind,
    },
    ContentMismatch {
        snapshot_size: u64,
        target_size: u64,
    },
    DirectoryMismatch {
        different: Vec<String>,
        snapshot_only: Vec<String>,
        target_only: Vec<String>,
    },
    Unreadable {
        error: String,
    },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Missing { kind } => {
                let what = match kind {
                    PatternKind::File => "File",
                    PatternKind::Directory => "Directory",
                };
                write!(f, "{what} does not exist in target")
            }
            FailureReason::WrongType { expected } => match expected {
                PatternKind::File => write!(f, "Target is not a file"),
                PatternKind::Directory => write!(f, "Target is not a directory"),
            },
            FailureReason::ContentMismatch {
                snapshot_size,
                target_size,
            } => write!(
                f,
                "Content mismatch (backup: {snapshot_size} bytes, target: {target_size} bytes)"
            ),
            FailureReason::DirectoryMismatch {
                different,
                snapshot_only,
                target_only,
            } => {
                let parts: Vec<String> = [
                    ("Different files", different),
                    ("Files only in backup", snapshot_only),
                    ("Files only in target", target_only),
                ]
                .into_iter()
                .filter(|(_, names)| !names.is_empty())
                .map(|(label, names)| format!("{label}: {}", summarise(names)))
                .collect();
                write!(f, "{}", parts.join("; "))
            }
            FailureReason::Unreadable { error } => write!(f, "Could not read: {error}"),
        }
    }
}

fn summarise(names: &[String]) -> String {
    let listed = names
        .iter()
        .take(MAX_LISTED)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ");
    if names.len() > MAX_LISTED {
        format!("{listed} and more")
    } else {
        listed
    }
}

/// A target entry that does not match the snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    pub path: PathBuf,
    pub reason: FailureReason,
    pub message: String,
}

impl ValidationFailure {
    fn new(path: PathBuf, reason: FailureReason) -> Self {
        let message = reason.to_string();
        Self {
            path,
            reason,
            message,
        }
    }
}

/// Per-program validation outcome
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgramValidation {
    pub passed: Vec<PathBuf>,
    pub failed: Vec<ValidationFailure>,
}

impl ProgramValidation {
    pub fn is_valid(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub all_valid: bool,
    pub programs: BTreeMap<String, ProgramValidation>,
}

impl ValidationReport {
    pub fn failure_count(&self) -> usize {
        self.programs.values().map(|p| p.failed.len()).sum()
    }

    pub fn passed_count(&self) -> usize {
        self.programs.values().map(|p| p.passed.len()).sum()
    }

    /// Turn a failed validation into `StoreError::ValidationMismatch`.
    pub fn into_result(self) -> StoreResult<Self> {
        if self.all_valid {
            Ok(self)
        } else {
            Err(StoreError::ValidationMismatch {
                failed: self.failure_count(),
            })
        }
    }
}

/// Compares restored targets against snapshots
pub struct Validator {
    resolver: PathResolver,
    sink: SharedSink,
}

impl Validator {
    pub fn new(sink: SharedSink) -> Self {
        Self {
            resolver: PathResolver::new(),
            sink,
        }
    }

    /// Validate `programs` restored from `snapshot` into `target_dir`.
    ///
    /// Entries absent from the snapshot are not checked. Programs without a
    /// subtree in the snapshot are left out of the report.
    pub fn validate_restore(
        &self,
        snapshot: &Path,
        target_dir: &Path,
        programs: &[&ProgramSpec],
    ) -> ValidationReport {
        let mut results = BTreeMap::new();

        for program in programs {
            if !snapshot.join(&program.key).is_dir() {
                log::warn!("{} is not in snapshot {}", program.key, snapshot.display());
                continue;
            }

            let mut outcome = ProgramValidation::default();
            for entry in plan_program(&self.resolver, program, snapshot, target_dir) {
                match self.check(&entry) {
                    None => outcome.passed.push(entry.target),
                    Some(reason) => {
                        log::warn!("Validation failed for {}: {}", entry.target.display(), reason);
                        outcome.failed.push(ValidationFailure::new(entry.target, reason));
                    }
                }
            }

            self.sink.emit(Event::Note(format!(
                "Validated {}: {} passed, {} failed",
                program.key,
                outcome.passed.len(),
                outcome.failed.len()
            )));
            results.insert(program.key.clone(), outcome);
        }

        let all_valid = results.values().all(ProgramValidation::is_valid);
        if all_valid {
            log::info!("All entries validated against {}", snapshot.display());
        }
        ValidationReport {
            all_valid,
            programs: results,
        }
    }

    fn check(&self, entry: &PlannedEntry) -> Option<FailureReason> {
        let Ok(metadata) = fs::metadata(&entry.target) else {
            return Some(FailureReason::Missing { kind: entry.kind });
        };

        match entry.kind {
            PatternKind::File if !metadata.is_file() => Some(FailureReason::WrongType {
                expected: PatternKind::File,
            }),
            PatternKind::Directory if !metadata.is_dir() => Some(FailureReason::WrongType {
                expected: PatternKind::Directory,
            }),
            PatternKind::File => compare_files(&entry.source, &entry.target),
            PatternKind::Directory => self.compare_dirs(&entry.source, &entry.target),
        }
    }

    fn compare_dirs(&self, snapshot_dir: &Path, target_dir: &Path) -> Option<FailureReason> {
        let snapshot_files = self.relative_files(snapshot_dir);
        let target_files = self.relative_files(target_dir);

        let mut different = Vec::new();
        for name in snapshot_files.intersection(&target_files) {
            if compare_files(&snapshot_dir.join(name), &target_dir.join(name)).is_some() {
                different.push(display_name(name));
            }
        }
        let snapshot_only: Vec<String> = snapshot_files
            .difference(&target_files)
            .map(|p| display_name(p))
            .collect();
        let target_only: Vec<String> = target_files
            .difference(&snapshot_files)
            .map(|p| display_name(p))
            .collect();

        if different.is_empty() && snapshot_only.is_empty() && target_only.is_empty() {
            None
        } else {
            Some(FailureReason::DirectoryMismatch {
                different,
                snapshot_only,
                target_only,
            })
        }
    }

    /// Files below `dir` that a restore would copy, relative to `dir`.
    fn relative_files(&self, dir: &Path) -> BTreeSet<PathBuf> {
        self.resolver
            .files_under(dir, dir)
            .into_iter()
            .map(|entry| entry.relative)
            .collect()
    }
}

fn display_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

/// Byte-for-byte comparison; `None` when identical.
fn compare_files(snapshot_file: &Path, target_file: &Path) -> Option<FailureReason> {
    let read = |path: &Path| {
        fs::read(path).map_err(|e| FailureReason::Unreadable {
            error: format!("{}: {}", path.display(), e),
        })
    };
    let snapshot_bytes = match read(snapshot_file) {
        Ok(bytes) => bytes,
        Err(reason) => return Some(reason),
    };
    let target_bytes = match read(target_file) {
        Ok(bytes) => bytes,
        Err(reason) => return Some(reason),
    };

    if snapshot_bytes == target_bytes {
        None
    } else {
        Some(FailureReason::ContentMismatch {
            snapshot_size: snapshot_bytes.len() as u64,
            target_size: target_bytes.len() as u64,
        })
    }
}
