//! Migrate command handler

use anyhow::{bail, Result};
use colored::Colorize;

use dotfiles::migrate::MigrationEngine;

use super::AppContext;

/// Handle migrate command
pub fn handle_migrate(ctx: &AppContext, repos: &[String], branch: &str, dry_run: bool) -> Result<()> {
    if dry_run {
        println!("{}", "Legacy backup migration (dry run)".cyan().bold());
    } else {
        println!("{}", "Migrating legacy backups...".cyan().bold());
    }

    let engine = MigrationEngine::new(&ctx.config, &ctx.store, ctx.sink.clone());
    let report = engine.migrate(repos, branch, dry_run);

    for migrated in &report.migrated {
        println!(
            "  {} original kept at {}",
            "→".dimmed(),
            migrated.archived_to.display()
        );
    }

    if !report.succeeded() {
        bail!("{} of {} migrations failed", report.failed.len(), report.failed.len() + report.migrated.len());
    }

    if report.migrated.is_empty() {
        println!("{}", "No legacy backups to migrate".dimmed());
    } else if dry_run {
        println!("{} {} backups would be migrated", "✓".green(), report.migrated.len());
    } else {
        println!("{} Migrated {} backups", "✓".green(), report.migrated.len());
    }

    Ok(())
}
