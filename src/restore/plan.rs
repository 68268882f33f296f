use std::fs;
use std::path::{Path, PathBuf};

use crate::programs::{PatternKind, ProgramSpec};
use crate::resolver::PathResolver;

/// One snapshot entry and where it lands in the target tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedEntry {
    pub kind: PatternKind,
    /// Path relative to the program subtree and to the target root
    pub relative: PathBuf,
    pub source: PathBuf,
    pub target: PathBuf,
    /// Whether `target` existed before anything was restored
    pub existed: bool,
}

/// Work out what restoring `program` from `snapshot` into `target_dir` touches.
///
/// Directory patterns come first. A file that lies inside a planned
/// directory is covered by it and not listed again. Patterns are matched
/// against the snapshot, never against the target.
pub fn plan_program(
    resolver: &PathResolver,
    program: &ProgramSpec,
    snapshot: &Path,
    target_dir: &Path,
) -> Vec<PlannedEntry> {
    let program_root = snapshot.join(&program.key);
    if !program_root.is_dir() {
        return Vec::new();
    }

    let mut planned: Vec<PlannedEntry> = Vec::new();

    for pattern in program.directories() {
        for source in resolver.expand(&program_root, pattern) {
            if !source.is_dir() || resolver.files_under(&program_root, &source).is_empty() {
                continue;
            }
            let Ok(relative) = source.strip_prefix(&program_root) else {
                continue;
            };
            if planned.iter().any(|p| relative.starts_with(&p.relative)) {
                continue;
            }
            // A broader directory replaces narrower ones already planned
            planned.retain(|p| !p.relative.starts_with(relative));
            planned.push(entry(PatternKind::Directory, relative, &source, target_dir));
        }
    }

    let directories: Vec<PathBuf> = planned.iter().map(|p| p.relative.clone()).collect();
    for file in resolver.resolve(&program_root, program.files()) {
        if directories.iter().any(|dir| file.relative.starts_with(dir)) {
            continue;
        }
        planned.push(entry(PatternKind::File, &file.relative, &file.absolute, target_dir));
    }

    planned
}

fn entry(kind: PatternKind, relative: &Path, source: &Path, target_dir: &Path) -> PlannedEntry {
    let target = target_dir.join(relative);
    let existed = fs::symlink_metadata(&target).is_ok();
    PlannedEntry {
        kind,
        relative: relative.to_path_buf(),
        source: source.to_path_buf(),
        target,
        existed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn cursor() -> ProgramSpec {
        ProgramSpec::from_lists(
            "cursor",
            "Cursor",
            &[".cursor/.cursorrules", ".cursorrules"],
            &[".cursor"],
        )
    }

    #[test]
    fn test_directory_covers_its_files() {
        let temp = TempDir::new().unwrap();
        let snapshot = temp.path().join("snap");
        write(&snapshot, "cursor/.cursor/.cursorrules", "x");
        write(&snapshot, "cursor/.cursorrules", "y");
        let target = temp.path().join("target");

        let plan = plan_program(&PathResolver::new(), &cursor(), &snapshot, &target);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].kind, PatternKind::Directory);
        assert_eq!(plan[0].relative, PathBuf::from(".cursor"));
        assert_eq!(plan[1].kind, PatternKind::File);
        assert_eq!(plan[1].relative, PathBuf::from(".cursorrules"));
        assert!(plan.iter().all(|p| !p.existed));
    }

    #[test]
    fn test_existing_targets_are_flagged() {
        let temp = TempDir::new().unwrap();
        let snapshot = temp.path().join("snap");
        write(&snapshot, "cursor/.cursorrules", "new");
        let target = temp.path().join("target");
        write(&target, ".cursorrules", "old");

        let plan = plan_program(&PathResolver::new(), &cursor(), &snapshot, &target);

        assert_eq!(plan.len(), 1);
        assert!(plan[0].existed);
        assert_eq!(plan[0].target, target.join(".cursorrules"));
    }

    #[test]
    fn test_program_missing_from_snapshot() {
        let temp = TempDir::new().unwrap();
        let plan = plan_program(&PathResolver::new(), &cursor(), temp.path(), temp.path());
        assert!(plan.is_empty());
    }

    #[test]
    fn test_empty_snapshot_directory_is_not_planned() {
        let temp = TempDir::new().unwrap();
        let snapshot = temp.path().join("snap");
        fs::create_dir_all(snapshot.join("cursor/.cursor/empty")).unwrap();

        let plan = plan_program(&PathResolver::new(), &cursor(), &snapshot, temp.path());
        assert!(plan.is_empty());
    }
}
