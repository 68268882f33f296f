//! Wipe command handler
//!
//! Asks for confirmation when running interactively; non-interactive runs
//! must pass `--force`.

use anyhow::{bail, Context, Result};
use colored::Colorize;
use inquire::Confirm;
use std::path::Path;

use dotfiles::repository::Repository;
use dotfiles::wipe::Wiper;

use super::AppContext;

fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stdout)
}

/// Handle wipe command
pub fn handle_wipe(ctx: &AppContext, repo_path: &Path, programs: &[String], dry_run: bool, force: bool) -> Result<()> {
    let repository = Repository::open(repo_path)
        .with_context(|| format!("Cannot open repository at {}", repo_path.display()))?;

    if ctx.store.list_backups(Some(repository.name())).is_empty() {
        println!(
            "{} no backup of {} exists; run `dotfiles backup` first to keep a copy",
            "Warning:".yellow().bold(),
            repository.name()
        );
    }

    if !dry_run && !force {
        if !is_interactive() {
            bail!("Refusing to wipe without confirmation; pass --force");
        }
        let confirm = Confirm::new(&format!(
            "Remove configuration files from {}?",
            repository.name()
        ))
        .with_default(false)
        .with_help_message("Files are deleted from the working tree")
        .prompt()
        .context("Failed to get confirmation")?;

        if !confirm {
            println!("\n{}", "Wipe cancelled.".yellow());
            return Ok(());
        }
    }

    let report = Wiper::new(&ctx.config, ctx.sink.clone()).wipe(&repository, programs, dry_run)?;

    if !report.succeeded() {
        bail!("{} entries could not be removed", report.failed.len());
    }
    if report.removed.is_empty() {
        println!("{}", "Nothing to remove".dimmed());
    } else if dry_run {
        println!("{} {} entries would be removed", "✓".green(), report.removed.len());
    } else {
        println!("{} Removed {} entries", "✓".green(), report.removed.len());
    }

    Ok(())
}
