//! Restore command handler
//!
//! Finds the snapshot, shows which existing entries will be kept, restores,
//! then validates the result against the snapshot.

use anyhow::{bail, Result};
use colored::Colorize;
use std::path::{Path, PathBuf};

use dotfiles::conflict::ConflictDetector;
use dotfiles::report::{self, ReportFormat, ValidationSummary};
use dotfiles::restore::{RestoreOptions, Restorer};
use dotfiles::store::BackupSelector;
use dotfiles::validate::Validator;

use super::AppContext;

/// Command-line options of `restore`
pub struct RestoreArgs {
    pub programs: Vec<String>,
    pub branch: Option<String>,
    pub date: Option<String>,
    pub latest: bool,
    pub force: bool,
    pub dry_run: bool,
    pub validate: bool,
    pub format: ReportFormat,
    pub output: Option<PathBuf>,
}

impl RestoreArgs {
    fn selector(&self) -> BackupSelector {
        BackupSelector {
            branch: self.branch.clone(),
            date: self.date.clone(),
            latest: self.latest,
        }
    }
}

/// Handle restore command
pub fn handle_restore(ctx: &AppContext, repo_name: &str, target_dir: &Path, args: RestoreArgs) -> Result<()> {
    let selector = args.selector();
    let Some(snapshot) = ctx.store.find_backup(repo_name, &selector)? else {
        bail!("No backup of '{}' matches the selection", repo_name);
    };

    println!(
        "{} {}",
        (if args.dry_run { "Dry run: restoring from" } else { "Restoring from" }).cyan().bold(),
        snapshot.display()
    );

    if !args.force {
        let mut detector = ConflictDetector::new();
        let conflicts: Vec<_> = detector
            .detect(&ctx.config, &snapshot, target_dir)
            .iter()
            .filter(|c| args.programs.is_empty() || args.programs.contains(&c.program))
            .cloned()
            .collect();
        report::print_conflicts(&conflicts);
    }

    let options = RestoreOptions {
        programs: args.programs.clone(),
        selector,
        force: args.force,
        dry_run: args.dry_run,
    };
    let restorer = Restorer::new(&ctx.config, &ctx.store, ctx.sink.clone());
    let outcome = restorer.restore(repo_name, target_dir, &options)?;

    if !outcome.succeeded() {
        bail!("Nothing in {} could be restored", outcome.snapshot.display());
    }

    println!(
        "\n{} {} restored, {} kept",
        "✓".green(),
        outcome.restored_count(),
        outcome.skipped_count()
    );
    let failures = outcome.failures().count();
    if failures > 0 {
        println!("{} {} entries failed to restore", "Warning:".yellow().bold(), failures);
    }

    if args.dry_run || !args.validate {
        return Ok(());
    }

    let keys = outcome.program_keys();
    let programs = ctx.config.select(&keys)?;
    let validation = Validator::new(ctx.sink.clone()).validate_restore(&outcome.snapshot, target_dir, &programs);
    let summary = ValidationSummary::new(&validation, &outcome.snapshot, target_dir);

    match &args.output {
        Some(path) => summary.save(path, args.format)?,
        None => summary.render(args.format)?,
    }

    Ok(())
}
