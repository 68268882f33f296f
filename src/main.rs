mod handlers;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use dotfiles::events::Verbosity;
use dotfiles::logger;
use dotfiles::report::ReportFormat;

use handlers::AppContext;

#[derive(Parser)]
#[command(name = "dotfiles")]
#[command(about = "Versioned snapshots of per-repository editor and tool configuration", long_about = None)]
#[command(version)]
struct Cli {
    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the backups directory
    #[arg(long, global = true)]
    backup_dir: Option<PathBuf>,

    /// Also show skipped entries and notes
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show failures and summaries
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Snapshot the configuration files of a repository
    Backup {
        /// Repository working tree
        #[arg(default_value = ".")]
        repo: PathBuf,

        /// Programs to back up (default: all configured)
        #[arg(short, long, value_delimiter = ',')]
        programs: Vec<String>,

        /// Switch to this branch before backing up
        #[arg(short, long)]
        branch: Option<String>,

        /// Show what would be backed up without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Also write a zip archive next to the snapshot
        #[arg(long)]
        zip_export: bool,
    },

    /// Restore a snapshot into a directory
    Restore {
        /// Repository name the snapshot was taken from
        repo_name: String,

        /// Directory to restore into (created if missing)
        target_dir: PathBuf,

        /// Programs to restore (default: all in the snapshot)
        #[arg(short, long, value_delimiter = ',')]
        programs: Vec<String>,

        /// Only consider snapshots of this branch
        #[arg(short, long)]
        branch: Option<String>,

        /// Snapshot timestamp (YYYYMMDD-HHMMSS) or day (YYYYMMDD)
        #[arg(short, long)]
        date: Option<String>,

        /// Use the newest snapshot, ignoring --date
        #[arg(short, long)]
        latest: bool,

        /// Overwrite existing entries
        #[arg(short, long)]
        force: bool,

        /// Show what would be restored without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Skip validation after restoring
        #[arg(long)]
        no_validate: bool,

        /// Validation report format
        #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
        format: ReportFormat,

        /// Write the validation report to a file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List snapshots by repository and branch, newest first
    ///
    /// With --verbose, also lists the files stored for each program.
    List {
        /// Only this repository
        repo_name: Option<String>,

        /// Only the newest snapshot of each repository and branch
        #[arg(short, long)]
        latest: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = ReportFormat::Console)]
        format: ReportFormat,
    },

    /// Convert flat legacy snapshots to the branch/timestamp layout
    Migrate {
        /// Only these repositories
        #[arg(short, long, value_delimiter = ',')]
        repos: Vec<String>,

        /// Branch to file migrated snapshots under
        #[arg(short, long, default_value = dotfiles::scm::DEFAULT_BRANCH)]
        branch: String,

        /// Show what would be migrated without touching anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove configured program files from a repository
    Wipe {
        /// Repository working tree
        #[arg(default_value = ".")]
        repo: PathBuf,

        /// Programs to wipe (default: all configured)
        #[arg(short, long, value_delimiter = ',')]
        programs: Vec<String>,

        /// Show what would be removed
        #[arg(long)]
        dry_run: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Show or initialize the configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,

        /// Write the current configuration (defaults included) to the config file
        #[arg(long)]
        init: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logger::init_logger() {
        eprintln!("Warning: logging to file is unavailable: {e}");
    }
    if let Err(e) = logger::rotate_log_if_needed() {
        log::warn!("Log rotation failed: {e:#}");
    }

    let verbosity = if cli.verbose {
        Verbosity::Verbose
    } else if cli.quiet {
        Verbosity::Quiet
    } else {
        Verbosity::Normal
    };
    let ctx = AppContext::load(cli.config.as_deref(), cli.backup_dir, verbosity)?;

    match cli.command {
        Commands::Backup {
            repo,
            programs,
            branch,
            dry_run,
            zip_export,
        } => {
            handlers::handle_backup(&ctx, &repo, programs, branch, dry_run, zip_export)?;
        }
        Commands::Restore {
            repo_name,
            target_dir,
            programs,
            branch,
            date,
            latest,
            force,
            dry_run,
            no_validate,
            format,
            output,
        } => {
            let options = handlers::RestoreArgs {
                programs,
                branch,
                date,
                latest,
                force,
                dry_run,
                validate: !no_validate,
                format,
                output,
            };
            handlers::handle_restore(&ctx, &repo_name, &target_dir, options)?;
        }
        Commands::List {
            repo_name,
            latest,
            format,
        } => {
            handlers::handle_list(&ctx, repo_name.as_deref(), latest, cli.verbose, format)?;
        }
        Commands::Migrate {
            repos,
            branch,
            dry_run,
        } => {
            handlers::handle_migrate(&ctx, &repos, &branch, dry_run)?;
        }
        Commands::Wipe {
            repo,
            programs,
            dry_run,
            force,
        } => {
            handlers::handle_wipe(&ctx, &repo, &programs, dry_run, force)?;
        }
        Commands::Config { show, init } => {
            if init {
                handlers::handle_config_init(&ctx, cli.config.as_deref())?;
            }
            if show || !init {
                handlers::handle_config_show(&ctx)?;
            }
        }
    }

    Ok(())
}
