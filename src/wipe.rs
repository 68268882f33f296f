//! Removal of program entries from a working tree.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::{EntryFailure, StoreResult};
use crate::events::{Event, SharedSink};
use crate::programs::{Config, ProgramSpec};
use crate::repository::Repository;
use crate::resolver::PathResolver;
use crate::restore::copy::remove_entry;

#[derive(Debug, Clone, Default, Serialize)]
pub struct WipeReport {
    pub dry_run: bool,
    /// Removed (or, in a dry run, removable) paths relative to the repository
    pub removed: Vec<PathBuf>,
    pub failed: Vec<EntryFailure>,
}

impl WipeReport {
    pub fn succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Deletes every configured entry of selected programs from a working tree
pub struct Wiper<'a> {
    config: &'a Config,
    resolver: PathResolver,
    sink: SharedSink,
}

impl<'a> Wiper<'a> {
    pub fn new(config: &'a Config, sink: SharedSink) -> Self {
        Self {
            config,
            resolver: PathResolver::new(),
            sink,
        }
    }

    /// Remove program entries from `repository`, deepest paths first.
    ///
    /// Every matching entry goes, including empty files and OS artifacts.
    /// Failures are recorded per entry.
    pub fn wipe(&self, repository: &Repository, programs: &[String], dry_run: bool) -> StoreResult<WipeReport> {
        let selected: Vec<&ProgramSpec> = if programs.is_empty() {
            self.config.programs().collect()
        } else {
            self.config.select(programs)?
        };

        let root = repository.root();
        let mut targets = BTreeSet::new();
        for program in selected {
            for pattern in &program.paths {
                targets.extend(self.resolver.expand(root, pattern));
            }
        }
        // Entries inside another target go with it
        let covered: Vec<PathBuf> = targets
            .iter()
            .filter(|path| {
                path.ancestors()
                    .skip(1)
                    .any(|ancestor| targets.contains(ancestor))
            })
            .cloned()
            .collect();
        for path in covered {
            targets.remove(&path);
        }

        let mut ordered: Vec<PathBuf> = targets.into_iter().collect();
        ordered.sort_by(|a, b| {
            b.components()
                .count()
                .cmp(&a.components().count())
                .then_with(|| a.cmp(b))
        });

        let mut report = WipeReport {
            dry_run,
            ..Default::default()
        };
        for path in ordered {
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
            if dry_run {
                self.sink.emit(Event::WouldRemove { path: path.clone() });
                report.removed.push(relative);
                continue;
            }
            match remove_entry(&path) {
                Ok(()) => {
                    self.sink.emit(Event::Removed { path: path.clone() });
                    report.removed.push(relative);
                }
                Err(e) => {
                    self.sink.emit(Event::Failed {
                        path: path.clone(),
                        error: e.to_string(),
                    });
                    report.failed.push(EntryFailure::new(relative, e));
                }
            }
        }

        log::info!(
            "Wiped {} entries from {}",
            report.removed.len(),
            root.display()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingSink;
    use crate::scm::Unversioned;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn repo() -> (TempDir, Repository) {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, ".cursor/.cursorrules", "x");
        write(root, ".cursor/rules/a.mdc", "a");
        write(root, ".windsurfrules", "");
        write(root, ".gitignore", "target/");
        write(root, "src/main.rs", "fn main() {}");
        let repo = Repository::with_vcs(root, Box::new(Unversioned)).unwrap();
        (temp, repo)
    }

    #[test]
    fn test_wipe_all_programs() {
        let (temp, repo) = repo();
        let config = Config::default();
        let report = Wiper::new(&config, RecordingSink::new())
            .wipe(&repo, &[], false)
            .unwrap();

        assert!(report.succeeded());
        assert!(!temp.path().join(".cursor").exists());
        assert!(!temp.path().join(".windsurfrules").exists());
        assert!(!temp.path().join(".gitignore").exists());
        assert!(temp.path().join("src/main.rs").exists());
        // .cursor covers its own files
        assert_eq!(report.removed.len(), 3);
    }

    #[test]
    fn test_wipe_selected_program_dry_run() {
        let (temp, repo) = repo();
        let config = Config::default();
        let sink = RecordingSink::new();
        let report = Wiper::new(&config, sink.clone())
            .wipe(&repo, &["git".to_string()], true)
            .unwrap();

        assert_eq!(report.removed, vec![PathBuf::from(".gitignore")]);
        assert!(temp.path().join(".gitignore").exists());
        assert!(matches!(sink.events()[0], Event::WouldRemove { .. }));
    }

    #[test]
    fn test_wipe_unknown_program() {
        let (_temp, repo) = repo();
        let config = Config::default();
        let err = Wiper::new(&config, RecordingSink::new())
            .wipe(&repo, &["emacs".to_string()], false)
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
