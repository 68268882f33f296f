//! Backup and list command handlers

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::Path;

use dotfiles::backup::{BackupManager, BackupOptions};
use dotfiles::report::{self, ReportFormat};
use dotfiles::repository::Repository;

use super::AppContext;

/// Handle backup command
pub fn handle_backup(
    ctx: &AppContext,
    repo_path: &Path,
    programs: Vec<String>,
    branch: Option<String>,
    dry_run: bool,
    zip_export: bool,
) -> Result<()> {
    let mut repository = Repository::open(repo_path)
        .with_context(|| format!("Cannot open repository at {}", repo_path.display()))?;

    println!(
        "{} {} ({})",
        (if dry_run { "Dry run: backing up" } else { "Backing up" }).cyan().bold(),
        repository.name().bold(),
        repository.branch()
    );

    let options = BackupOptions {
        programs,
        branch,
        dry_run,
        zip_export,
    };
    let manager = BackupManager::new(&ctx.config, &ctx.store, ctx.sink.clone());
    let report = manager.backup(&mut repository, &options)?;

    let failures = report.failures().count();
    if !report.succeeded() {
        bail!("Nothing was backed up from {}", repository.root().display());
    }

    if dry_run {
        println!(
            "\n{} {} entries would be backed up to {}",
            "✓".green(),
            report.entry_count(),
            report.snapshot.display()
        );
    } else {
        println!(
            "\n{} Backed up {} entries to {}",
            "✓".green(),
            report.entry_count(),
            report.snapshot.display().to_string().cyan()
        );
    }
    if failures > 0 {
        println!("{} {} entries could not be copied", "Warning:".yellow().bold(), failures);
    }

    Ok(())
}

/// Handle list command
pub fn handle_list(
    ctx: &AppContext,
    repo_name: Option<&str>,
    latest: bool,
    verbose: bool,
    format: ReportFormat,
) -> Result<()> {
    let mut snapshots = if latest {
        ctx.store.latest_snapshots(repo_name)
    } else {
        ctx.store.snapshots(repo_name)
    };
    if verbose {
        snapshots = snapshots.into_iter().map(|info| info.with_contents()).collect();
    }
    report::render_listing(&snapshots, format)
}
