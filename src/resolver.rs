//! Turns configured path patterns into concrete, existing, non-empty files.

use glob::{MatchOptions, Pattern};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::programs::PathPattern;

/// OS and editor artifacts that are never snapshotted
pub const EXCLUDED_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini", "__pycache__"];

/// A resolved file, with its path relative to the root it was resolved under
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathEntry {
    pub relative: PathBuf,
    pub absolute: PathBuf,
}

/// Resolves patterns against a root directory.
///
/// Read-only. Unreadable paths are skipped with a debug log line.
#[derive(Debug, Clone)]
pub struct PathResolver {
    excluded: Vec<String>,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self {
            excluded: EXCLUDED_FILES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl PathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every pattern and return a sorted, duplicate-free file list.
    pub fn resolve<'a, I>(&self, root: &Path, patterns: I) -> Vec<PathEntry>
    where
        I: IntoIterator<Item = &'a PathPattern>,
    {
        let mut entries = BTreeSet::new();
        for pattern in patterns {
            for path in self.expand(root, pattern) {
                self.collect_files(root, &path, &mut entries);
            }
        }
        entries.into_iter().collect()
    }

    /// Resolve a single pattern.
    pub fn resolve_pattern(&self, root: &Path, pattern: &PathPattern) -> Vec<PathEntry> {
        self.resolve(root, std::iter::once(pattern))
    }

    /// Every qualifying file below `dir`, relative to `root`.
    pub fn files_under(&self, root: &Path, dir: &Path) -> Vec<PathEntry> {
        let mut entries = BTreeSet::new();
        self.collect_files(root, dir, &mut entries);
        entries.into_iter().collect()
    }

    /// Existing filesystem entries a pattern names, before any filtering.
    ///
    /// Wildcard patterns are globbed (`**` recurses); literal patterns are
    /// joined to the root. Results are sorted.
    pub fn expand(&self, root: &Path, pattern: &PathPattern) -> Vec<PathBuf> {
        if !pattern.has_wildcard() {
            let path = root.join(pattern.as_str());
            return if fs::symlink_metadata(&path).is_ok() {
                vec![path]
            } else {
                Vec::new()
            };
        }

        let Some(root_str) = root.to_str() else {
            log::debug!("Skipping glob under non UTF-8 root {}", root.display());
            return Vec::new();
        };
        let full = format!(
            "{}/{}",
            Pattern::escape(root_str.trim_end_matches(['/', '\\'])),
            pattern.as_str()
        );
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        match glob::glob_with(&full, options) {
            Ok(paths) => {
                let mut matched: Vec<PathBuf> = paths
                    .filter_map(|p| match p {
                        Ok(path) => Some(path),
                        Err(e) => {
                            log::debug!("Skipping unreadable glob match: {e}");
                            None
                        }
                    })
                    .collect();
                matched.sort();
                matched
            }
            Err(e) => {
                log::warn!("Invalid pattern '{}': {}", pattern.as_str(), e);
                Vec::new()
            }
        }
    }

    /// True when any component of `relative` is on the exclusion list.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        relative.components().any(|c| {
            let name = c.as_os_str().to_string_lossy();
            self.excluded.iter().any(|e| *e == name)
        })
    }

    fn collect_files(&self, root: &Path, path: &Path, entries: &mut BTreeSet<PathEntry>) {
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) => {
                log::debug!("Skipping {}: {}", path.display(), e);
                return;
            }
        };

        if metadata.is_file() {
            if metadata.len() > 0 {
                self.push_entry(root, path, entries);
            }
            return;
        }

        if metadata.is_dir() {
            for entry in WalkDir::new(path).follow_links(false).sort_by_file_name() {
                let entry = match entry {
                    Ok(e) => e,
                    Err(e) => {
                        log::debug!("Skipping unreadable entry under {}: {}", path.display(), e);
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let non_empty = entry.metadata().map(|m| m.len() > 0).unwrap_or(false);
                if non_empty {
                    self.push_entry(root, entry.path(), entries);
                }
            }
        }
    }

    fn push_entry(&self, root: &Path, path: &Path, entries: &mut BTreeSet<PathEntry>) {
        let Ok(relative) = path.strip_prefix(root) else {
            log::debug!("{} is outside {}", path.display(), root.display());
            return;
        };
        if self.is_excluded(relative) {
            return;
        }
        entries.insert(PathEntry {
            relative: relative.to_path_buf(),
            absolute: path.to_path_buf(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn relatives(entries: &[PathEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| e.relative.to_string_lossy().replace('\\', "/"))
            .collect()
    }

    fn fixture() -> TempDir {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        write(root, ".cursor/.cursorrules", "rules");
        write(root, ".cursor/rules/a.mdc", "a");
        write(root, ".cursor/rules/b.mdc", "b");
        write(root, ".cursor/rules/empty.mdc", "");
        write(root, ".cursor/rules/nested/c.mdc", "c");
        write(root, ".cursor/.DS_Store", "junk");
        write(root, ".cursor/__pycache__/x.pyc", "junk");
        write(root, ".gitignore", "target/");
        fs::create_dir_all(root.join(".vscode/empty-dir")).unwrap();
        temp
    }

    #[test]
    fn test_literal_file() {
        let temp = fixture();
        let entries = PathResolver::new().resolve_pattern(temp.path(), &PathPattern::file(".gitignore"));
        assert_eq!(relatives(&entries), vec![".gitignore"]);
        assert_eq!(entries[0].absolute, temp.path().join(".gitignore"));
    }

    #[rstest]
    #[case::single_level(".cursor/rules/*.mdc", vec![".cursor/rules/a.mdc", ".cursor/rules/b.mdc"])]
    #[case::recursive(".cursor/**/*.mdc", vec![".cursor/rules/a.mdc", ".cursor/rules/b.mdc", ".cursor/rules/nested/c.mdc"])]
    #[case::missing(".nothing/*.txt", vec![])]
    fn test_wildcards(#[case] pattern: &str, #[case] expected: Vec<&str>) {
        let temp = fixture();
        let entries = PathResolver::new().resolve_pattern(temp.path(), &PathPattern::file(pattern));
        assert_eq!(relatives(&entries), expected);
    }

    #[test]
    fn test_directory_recurses_and_filters() {
        let temp = fixture();
        let entries = PathResolver::new().resolve_pattern(temp.path(), &PathPattern::directory(".cursor"));
        assert_eq!(
            relatives(&entries),
            vec![
                ".cursor/.cursorrules",
                ".cursor/rules/a.mdc",
                ".cursor/rules/b.mdc",
                ".cursor/rules/nested/c.mdc",
            ]
        );
    }

    #[test]
    fn test_never_returns_empty_files_or_dirs() {
        let temp = fixture();
        let patterns = vec![
            PathPattern::file(".cursor/rules/empty.mdc"),
            PathPattern::directory(".vscode"),
            PathPattern::directory(".vscode/empty-dir"),
        ];
        let entries = PathResolver::new().resolve(temp.path(), &patterns);
        assert!(entries.is_empty());
    }

    #[test]
    fn test_overlapping_patterns_deduplicated() {
        let temp = fixture();
        let patterns = vec![
            PathPattern::file(".cursor/.cursorrules"),
            PathPattern::file(".cursor/rules/*.mdc"),
            PathPattern::directory(".cursor"),
        ];
        let entries = PathResolver::new().resolve(temp.path(), &patterns);
        let names = relatives(&entries);
        assert_eq!(names.len(), 4);
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_root_with_glob_metacharacters() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("repo[1]");
        write(&root, "conf/a.md", "a");

        let entries = PathResolver::new().resolve_pattern(&root, &PathPattern::file("conf/*.md"));
        assert_eq!(relatives(&entries), vec!["conf/a.md"]);
    }

    #[test]
    fn test_is_excluded() {
        let resolver = PathResolver::new();
        assert!(resolver.is_excluded(Path::new("a/.DS_Store")));
        assert!(resolver.is_excluded(Path::new("__pycache__/mod.pyc")));
        assert!(!resolver.is_excluded(Path::new("a/settings.json")));
    }
}
