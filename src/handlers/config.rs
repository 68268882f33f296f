//! Configuration command handlers

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;

use dotfiles::config::ConfigManager;

use super::AppContext;

/// Print the effective configuration
pub fn handle_config_show(ctx: &AppContext) -> Result<()> {
    println!("{}", "Configuration".cyan().bold());
    println!("{}", "=".repeat(40).cyan());

    let config_file = ConfigManager::config_file_path()?;
    println!("{}: {}", "Config file".bold(), config_file.display());
    println!("{}: {}", "Backups".bold(), ctx.store.root().display());

    for program in ctx.config.programs() {
        println!("\n{} ({})", program.name.bold(), program.key.dimmed());
        for pattern in &program.paths {
            println!("  {}", pattern.canonical());
        }
    }

    let problems = ctx.config.validate();
    if !problems.is_empty() {
        println!();
        for problem in problems {
            println!("{} {}", "Warning:".yellow().bold(), problem);
        }
    }

    Ok(())
}

/// Write the effective configuration to disk
pub fn handle_config_init(ctx: &AppContext, path: Option<&Path>) -> Result<()> {
    let target = match path {
        Some(path) => path.to_path_buf(),
        None => ConfigManager::config_file_path()?,
    };
    ctx.config
        .save_to(&target)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    println!("{} Wrote {}", "✓".green(), target.display());
    Ok(())
}
