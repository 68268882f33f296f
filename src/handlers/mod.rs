//! Command handler modules
//!
//! Each handler wires one subcommand to the library and prints the outcome.

pub mod backup;
pub mod config;
pub mod migrate;
pub mod restore;
pub mod wipe;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use dotfiles::events::{ConsoleSink, SharedSink, Verbosity};
use dotfiles::programs::Config;
use dotfiles::store::SnapshotStore;

pub use backup::{handle_backup, handle_list};
pub use config::{handle_config_init, handle_config_show};
pub use migrate::handle_migrate;
pub use restore::{handle_restore, RestoreArgs};
pub use wipe::handle_wipe;

/// Everything a handler needs: configuration, the store and the output sink
pub struct AppContext {
    pub config: Config,
    pub store: SnapshotStore,
    pub sink: SharedSink,
}

impl AppContext {
    pub fn load(config_path: Option<&Path>, backup_dir: Option<PathBuf>, verbosity: Verbosity) -> Result<Self> {
        let mut config = match config_path {
            Some(path) => Config::load_from(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))?,
            None => Config::load()?,
        };
        if backup_dir.is_some() {
            config.backup_dir = backup_dir;
        }

        let root = config.backups_root()?;
        log::debug!("Using backups directory {}", root.display());

        Ok(Self {
            config,
            store: SnapshotStore::new(root),
            sink: ConsoleSink::shared(verbosity),
        })
    }
}
