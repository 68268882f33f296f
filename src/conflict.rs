use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::programs::{Config, PatternKind};
use crate::resolver::PathResolver;
use crate::restore::plan_program;

/// A target entry that a restore would overwrite
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Conflict {
    pub target: PathBuf,
    pub snapshot: PathBuf,
    pub program: String,
    pub kind: PatternKind,
}

impl Conflict {
    /// Get a human-readable description of the conflict
    pub fn description(&self) -> String {
        let what = match self.kind {
            PatternKind::File => "file",
            PatternKind::Directory => "directory",
        };
        format!(
            "[{}] {} {} already exists (snapshot: {})",
            self.program,
            what,
            self.target.display(),
            self.snapshot.display()
        )
    }

    pub fn into_error(self) -> StoreError {
        StoreError::Conflict {
            target: self.target,
            snapshot: self.snapshot,
        }
    }
}

impl From<Conflict> for StoreError {
    fn from(conflict: Conflict) -> Self {
        conflict.into_error()
    }
}

/// Finds snapshot entries that already exist in a restore target
pub struct ConflictDetector {
    resolver: PathResolver,
    conflicts: Vec<Conflict>,
}

impl ConflictDetector {
    pub fn new() -> Self {
        ConflictDetector {
            resolver: PathResolver::new(),
            conflicts: Vec::new(),
        }
    }

    /// Compare `snapshot` against `target_dir` for every configured program
    /// present in the snapshot.
    ///
    /// Paths are those a restore would touch, by pattern. Results are sorted
    /// and replace any earlier detection.
    pub fn detect(&mut self, config: &Config, snapshot: &Path, target_dir: &Path) -> &[Conflict] {
        let mut conflicts: Vec<Conflict> = config
            .programs()
            .flat_map(|program| {
                plan_program(&self.resolver, program, snapshot, target_dir)
                    .into_iter()
                    .filter(|entry| entry.existed)
                    .map(|entry| Conflict {
                        target: entry.target,
                        snapshot: entry.source,
                        program: program.key.clone(),
                        kind: entry.kind,
                    })
            })
            .collect();
        conflicts.sort();
        conflicts.dedup();

        log::debug!(
            "{} conflicts between {} and {}",
            conflicts.len(),
            snapshot.display(),
            target_dir.display()
        );
        self.conflicts = conflicts;
        &self.conflicts
    }

    /// Get all detected conflicts
    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }

    /// The first conflict as an error, if there is one.
    pub fn ensure_none(&self) -> Result<(), StoreError> {
        match self.conflicts.first() {
            Some(conflict) => Err(conflict.clone().into_error()),
            None => Ok(()),
        }
    }
}

impl Default for ConflictDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::programs::ProgramSpec;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn config() -> Config {
        Config::with_programs(
            None,
            vec![
                ProgramSpec::from_lists("windsurf", "Windsurf", &[".windsurfrules"], &[]),
                ProgramSpec::from_lists("git", "Git", &[".gitignore", ".gitconfig"], &[]),
                ProgramSpec::from_lists("vscode", "VS Code", &[], &[".vscode"]),
            ],
        )
    }

    #[test]
    fn test_conflict_detection() {
        let temp = TempDir::new().unwrap();
        let snapshot = temp.path().join("snap");
        write(&snapshot, "windsurf/.windsurfrules", "new");
        write(&snapshot, "git/.gitignore", "target/");
        write(&snapshot, "vscode/.vscode/settings.json", "{}");

        let target = temp.path().join("target");
        write(&target, ".windsurfrules", "old");
        write(&target, ".vscode/other.json", "{}");
        // Present in the target but not in the snapshot
        write(&target, ".gitconfig", "[user]");

        let mut detector = ConflictDetector::new();
        let conflicts = detector.detect(&config(), &snapshot, &target).to_vec();

        assert_eq!(conflicts.len(), 2);
        assert_eq!(conflicts[0].target, target.join(".vscode"));
        assert_eq!(conflicts[0].kind, PatternKind::Directory);
        assert_eq!(conflicts[1].target, target.join(".windsurfrules"));
        assert_eq!(conflicts[1].snapshot, snapshot.join("windsurf/.windsurfrules"));
        assert!(detector.has_conflicts());
        assert!(conflicts[1].description().contains("windsurf"));
    }

    #[test]
    fn test_no_conflict_for_empty_target() {
        let temp = TempDir::new().unwrap();
        let snapshot = temp.path().join("snap");
        write(&snapshot, "windsurf/.windsurfrules", "new");

        let mut detector = ConflictDetector::new();
        detector.detect(&config(), &snapshot, &temp.path().join("empty"));

        assert!(!detector.has_conflicts());
        assert_eq!(detector.conflict_count(), 0);
        assert!(detector.ensure_none().is_ok());
    }

    #[test]
    fn test_conflict_as_error() {
        let temp = TempDir::new().unwrap();
        let snapshot = temp.path().join("snap");
        write(&snapshot, "git/.gitignore", "a");
        let target = temp.path().join("target");
        write(&target, ".gitignore", "b");

        let mut detector = ConflictDetector::new();
        detector.detect(&config(), &snapshot, &target);

        let err = detector.ensure_none().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }
}
