//! # dotfiles
//!
//! Versioned snapshots of the editor and tool configuration that lives inside
//! a repository working tree (`.cursor/`, `.vscode/`, `.windsurfrules`, ...).
//!
//! ## Overview
//!
//! Snapshots are keyed by repository name, branch and timestamp:
//!
//! ```text
//! <backups>/<repository>/<branch>/<YYYYMMDD-HHMMSS>/<program>/<relative path>
//! ```
//!
//! Every configured *program* contributes its files and directories,
//! stored under their full path relative to the repository root. A snapshot
//! can later be restored into any directory, with conflict detection,
//! optional overwrite and byte-for-byte validation afterwards.
//!
//! ## Architecture
//!
//! - Configuration ([`programs`], [`config`])
//! - Path resolution ([`resolver`])
//! - Snapshot layout and lookup ([`store`])
//! - Operations ([`backup`], [`restore`], [`conflict`], [`validate`], [`migrate`], [`wipe`])
//! - Version control capability ([`scm`], [`repository`])
//! - Output and diagnostics ([`events`], [`report`], [`logger`], [`error`])

/// Snapshot creation and zip export.
pub mod backup;

/// Platform-agnostic configuration directory management.
///
/// Locates the config directory following platform conventions (XDG on
/// Linux, Application Support on macOS, AppData on Windows) and the files
/// kept in it.
pub mod config;

/// Detection of target entries a restore would overwrite.
pub mod conflict;

/// Error types shared by all operations.
pub mod error;

/// Output sink passed to every component.
pub mod events;

/// Logging configuration and utilities.
///
/// Sets up console logging (configurable via `RUST_LOG`) and a persistent
/// log file in the config directory, rotated when it grows too large.
pub mod logger;

/// Migration of flat legacy snapshots.
pub mod migrate;

/// Program definitions and the `config.toml` format.
pub mod programs;

/// Rendering of validation results and snapshot listings.
pub mod report;

/// Working trees and their current branch.
pub mod repository;

/// Pattern resolution against a directory tree.
pub mod resolver;

/// Restoring snapshots into a target directory.
pub mod restore;

/// Version-control capability.
pub mod scm;

/// Snapshot layout, listing and lookup.
pub mod store;

/// Post-restore validation.
pub mod validate;

/// Removal of program entries from a working tree.
pub mod wipe;
