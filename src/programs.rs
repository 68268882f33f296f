use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::config::ConfigManager;
use crate::error::{StoreError, StoreResult};

/// Whether a pattern names files or whole directories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    File,
    Directory,
}

/// One configured path pattern, relative to the repository root
///
/// Patterns may contain `*`, `?` or `[...]` (single level) and `**`
/// (recursive). In the unified textual form directories carry a trailing `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathPattern {
    pattern: String,
    kind: PatternKind,
}

impl PathPattern {
    pub fn file(pattern: impl Into<String>) -> Self {
        Self {
            pattern: trim_separators(&pattern.into()),
            kind: PatternKind::File,
        }
    }

    pub fn directory(pattern: impl Into<String>) -> Self {
        Self {
            pattern: trim_separators(&pattern.into()),
            kind: PatternKind::Directory,
        }
    }

    /// Parse the unified form: a trailing separator marks a directory.
    pub fn parse(raw: &str) -> Self {
        if raw.ends_with('/') || raw.ends_with('\\') {
            Self::directory(raw)
        } else {
            Self::file(raw)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.pattern
    }

    pub fn kind(&self) -> PatternKind {
        self.kind
    }

    pub fn is_directory(&self) -> bool {
        self.kind == PatternKind::Directory
    }

    pub fn has_wildcard(&self) -> bool {
        self.pattern.contains(['*', '?', '['])
    }

    /// The unified textual form (`dir/` for directories).
    pub fn canonical(&self) -> String {
        match self.kind {
            PatternKind::File => self.pattern.clone(),
            PatternKind::Directory => format!("{}/", self.pattern),
        }
    }

    /// Describe why this pattern cannot be used, if it cannot.
    fn problem(&self) -> Option<String> {
        if self.pattern.is_empty() {
            return Some("empty pattern".to_string());
        }
        let path = Path::new(&self.pattern);
        if path.is_absolute() || path.has_root() {
            return Some(format!("'{}' must be relative to the repository root", self.pattern));
        }
        if path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
        {
            return Some(format!("'{}' must not leave the repository root", self.pattern));
        }
        None
    }
}

fn trim_separators(raw: &str) -> String {
    raw.trim().trim_end_matches(['/', '\\']).to_string()
}

/// A named configuration unit: the files and directories of one tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramSpec {
    /// Key in the configuration map; also the directory name inside a snapshot
    pub key: String,
    /// Display name
    pub name: String,
    /// Canonical ordered pattern list
    pub paths: Vec<PathPattern>,
}

impl ProgramSpec {
    pub fn new(key: impl Into<String>, name: impl Into<String>, paths: Vec<PathPattern>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            paths,
        }
    }

    /// Build from separate file and directory lists (files first).
    pub fn from_lists(key: &str, name: &str, files: &[&str], directories: &[&str]) -> Self {
        let paths = files
            .iter()
            .map(|f| PathPattern::file(*f))
            .chain(directories.iter().map(|d| PathPattern::directory(*d)))
            .collect();
        Self::new(key, name, paths)
    }

    pub fn files(&self) -> impl Iterator<Item = &PathPattern> {
        self.paths.iter().filter(|p| p.kind() == PatternKind::File)
    }

    pub fn directories(&self) -> impl Iterator<Item = &PathPattern> {
        self.paths.iter().filter(|p| p.is_directory())
    }
}

/// Program configuration as written in config.toml
///
/// Either `files`/`directories` or the unified `paths` list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawProgram {
    #[serde(default)]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    files: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    directories: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    paths: Option<Vec<String>>,
}

impl RawProgram {
    fn into_spec(self, key: &str) -> StoreResult<ProgramSpec> {
        let paths: Vec<PathPattern> = if self.files.is_some() || self.directories.is_some() {
            self.files
                .unwrap_or_default()
                .iter()
                .map(PathPattern::file)
                .chain(
                    self.directories
                        .unwrap_or_default()
                        .iter()
                        .map(PathPattern::directory),
                )
                .collect()
        } else if let Some(paths) = self.paths {
            paths.iter().map(|p| PathPattern::parse(p)).collect()
        } else {
            return Err(StoreError::Config(format!(
                "program '{key}' must have 'files'/'directories' or 'paths'"
            )));
        };

        Ok(ProgramSpec::new(key, self.name, paths))
    }

    fn from_spec(spec: &ProgramSpec) -> Self {
        RawProgram {
            name: spec.name.clone(),
            files: Some(spec.files().map(|p| p.as_str().to_string()).collect()),
            directories: Some(spec.directories().map(|p| p.as_str().to_string()).collect()),
            paths: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    backup_dir: Option<PathBuf>,
    #[serde(default)]
    programs: BTreeMap<String, RawProgram>,
}

/// Loaded configuration: where snapshots live and which programs to snapshot
#[derive(Debug, Clone)]
pub struct Config {
    pub backup_dir: Option<PathBuf>,
    programs: BTreeMap<String, ProgramSpec>,
}

impl Default for Config {
    fn default() -> Self {
        let programs = default_programs()
            .into_iter()
            .map(|p| (p.key.clone(), p))
            .collect();
        Config {
            backup_dir: None,
            programs,
        }
    }
}

/// Built-in program definitions
pub fn default_programs() -> Vec<ProgramSpec> {
    vec![
        ProgramSpec::from_lists(
            "cursor",
            "Cursor",
            &[".cursor/.cursorrules", ".cursor/rules/*.mdc", ".cursor/prompts/*.md"],
            &[".cursor"],
        ),
        ProgramSpec::from_lists("windsurf", "Windsurf", &[".windsurfrules"], &[]),
        ProgramSpec::from_lists(
            "vscode",
            "Visual Studio Code",
            &[".vscode/settings.json", ".vscode/extensions.json"],
            &[".vscode"],
        ),
        ProgramSpec::from_lists("git", "Git", &[".gitconfig", ".gitignore"], &[]),
    ]
}

impl Config {
    /// Configuration with exactly the given programs and backups root.
    pub fn with_programs<I>(backup_dir: Option<PathBuf>, programs: I) -> Self
    where
        I: IntoIterator<Item = ProgramSpec>,
    {
        Config {
            backup_dir,
            programs: programs.into_iter().map(|p| (p.key.clone(), p)).collect(),
        }
    }

    /// Load config.toml from the config directory, falling back to defaults
    pub fn load() -> Result<Self> {
        let config_path = ConfigManager::config_file_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&config_path)
            .with_context(|| format!("Failed to load config file: {}", config_path.display()))
    }

    /// Load a specific config file and merge it over the built-in programs
    pub fn load_from(path: &Path) -> StoreResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> StoreResult<Self> {
        let raw: RawConfig = toml::from_str(content)
            .map_err(|e| StoreError::Config(format!("failed to parse config: {e}")))?;

        let mut config = Self::default();
        config.backup_dir = raw.backup_dir.map(|dir| expand_home(&dir));

        for (key, raw_program) in raw.programs {
            let spec = raw_program.into_spec(&key)?;
            config.programs.insert(key, spec);
        }

        let problems = config.validate();
        if !problems.is_empty() {
            return Err(StoreError::Config(problems.join("; ")));
        }

        Ok(config)
    }

    /// Save configuration to config.toml
    pub fn save(&self) -> Result<()> {
        let config_path = ConfigManager::config_file_path()?;
        self.save_to(&config_path)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let raw = RawConfig {
            backup_dir: self.backup_dir.clone(),
            programs: self
                .programs
                .iter()
                .map(|(key, spec)| (key.clone(), RawProgram::from_spec(spec)))
                .collect(),
        };
        let content = toml::to_string_pretty(&raw).context("Failed to serialize config")?;

        fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Collect every problem with the configuration
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for (key, spec) in &self.programs {
            if key.is_empty()
                || key == "."
                || key == ".."
                || key.contains(['/', '\\'])
            {
                problems.push(format!("program key '{key}' is not a valid directory name"));
            }
            if spec.name.trim().is_empty() {
                problems.push(format!("program '{key}' must have a name"));
            }
            if spec.paths.is_empty() {
                problems.push(format!("program '{key}' has no paths"));
            }
            for pattern in &spec.paths {
                if let Some(problem) = pattern.problem() {
                    problems.push(format!("program '{key}': {problem}"));
                }
            }
        }

        problems
    }

    /// Root directory of the snapshot store
    pub fn backups_root(&self) -> Result<PathBuf> {
        match &self.backup_dir {
            Some(dir) => Ok(dir.clone()),
            None => ConfigManager::default_backups_dir(),
        }
    }

    pub fn program(&self, key: &str) -> Option<&ProgramSpec> {
        self.programs.get(key)
    }

    pub fn programs(&self) -> impl Iterator<Item = &ProgramSpec> {
        self.programs.values()
    }

    pub fn program_keys(&self) -> Vec<String> {
        self.programs.keys().cloned().collect()
    }

    pub fn has_program(&self, key: &str) -> bool {
        self.programs.contains_key(key)
    }

    /// Look up several programs, failing on the first unknown name
    pub fn select(&self, keys: &[String]) -> StoreResult<Vec<&ProgramSpec>> {
        keys.iter()
            .map(|key| {
                self.program(key)
                    .ok_or_else(|| StoreError::not_found(format!("program '{key}' is not configured")))
            })
            .collect()
    }
}

fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
