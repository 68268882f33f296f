use anyhow::{Context, Result};
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::conflict::Conflict;
use crate::programs::PatternKind;
use crate::store::SnapshotInfo;
use crate::validate::ValidationReport;

/// Output format for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Console,
    Json,
    Markdown,
}

impl FromStr for ReportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "console" | "text" => Ok(ReportFormat::Console),
            "json" => Ok(ReportFormat::Json),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            _ => Err(anyhow::anyhow!("Unsupported format: {s}")),
        }
    }
}

/// Validation results of one restore, ready for display
///
/// Paths are rendered as strings so the JSON form is stable across platforms.
#[derive(Debug, Serialize)]
pub struct ValidationSummary {
    /// RFC 3339 time the summary was generated
    pub timestamp: String,
    pub snapshot: String,
    pub target: String,
    pub all_valid: bool,
    pub passed: usize,
    pub failed: usize,
    pub programs: Vec<ProgramSummary>,
}

#[derive(Debug, Serialize)]
pub struct ProgramSummary {
    pub program: String,
    pub passed: Vec<String>,
    pub failed: Vec<FailureDetail>,
}

#[derive(Debug, Serialize)]
pub struct FailureDetail {
    pub path: String,
    pub reason: String,
}

impl ValidationSummary {
    pub fn new(report: &ValidationReport, snapshot: &Path, target: &Path) -> Self {
        let programs = report
            .programs
            .iter()
            .map(|(program, result)| ProgramSummary {
                program: program.clone(),
                passed: result.passed.iter().map(|p| p.display().to_string()).collect(),
                failed: result
                    .failed
                    .iter()
                    .map(|f| FailureDetail {
                        path: f.path.display().to_string(),
                        reason: f.message.clone(),
                    })
                    .collect(),
            })
            .collect();

        ValidationSummary {
            timestamp: chrono::Utc::now().to_rfc3339(),
            snapshot: snapshot.display().to_string(),
            target: target.display().to_string(),
            all_valid: report.all_valid,
            passed: report.passed_count(),
            failed: report.failure_count(),
            programs,
        }
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# Restore Validation Report\n\n");
        output.push_str(&format!("**Generated:** {}\n", self.timestamp));
        output.push_str(&format!("**Snapshot:** `{}`\n", self.snapshot));
        output.push_str(&format!("**Target:** `{}`\n", self.target));
        output.push_str(&format!(
            "**Result:** {} passed, {} failed\n\n",
            self.passed, self.failed
        ));

        if self.programs.is_empty() {
            output.push_str("Nothing to validate.\n");
            return output;
        }

        for program in &self.programs {
            output.push_str(&format!("## {}\n\n", program.program));
            for path in &program.passed {
                output.push_str(&format!("- ✓ `{path}`\n"));
            }
            for failure in &program.failed {
                output.push_str(&format!("- ✗ `{}`: {}\n", failure.path, failure.reason));
            }
            output.push('\n');
        }

        output
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize report to JSON")
    }

    /// Print a colored console summary
    pub fn print_summary(&self) {
        println!("\n{}", "=== Validation ===".bold().cyan());
        for program in &self.programs {
            let status = if program.failed.is_empty() {
                "OK".green()
            } else {
                "FAILED".red()
            };
            println!("{} [{}]", program.program.bold(), status);
            for failure in &program.failed {
                println!("   {} {}: {}", "✗".red(), failure.path, failure.reason);
            }
        }

        if self.all_valid {
            println!("{}", "All restored entries match the snapshot".green());
        } else {
            println!(
                "{} {} of {} entries differ from the snapshot",
                "Warning:".yellow().bold(),
                self.failed,
                self.passed + self.failed
            );
        }
    }

    /// Write the report to a file
    pub fn save(&self, path: &Path, format: ReportFormat) -> Result<()> {
        let content = match format {
            ReportFormat::Json => self.to_json()?,
            ReportFormat::Markdown | ReportFormat::Console => self.to_markdown(),
        };

        fs::write(path, content)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;

        println!(
            "{} {}",
            "Report saved to:".green().bold(),
            path.display().to_string().cyan()
        );

        Ok(())
    }

    /// Print in the requested format
    pub fn render(&self, format: ReportFormat) -> Result<()> {
        match format {
            ReportFormat::Json => println!("{}", self.to_json()?),
            ReportFormat::Markdown => println!("{}", self.to_markdown()),
            ReportFormat::Console => self.print_summary(),
        }
        Ok(())
    }
}

/// Print the conflicts a restore without `--force` will skip
pub fn print_conflicts(conflicts: &[Conflict]) {
    if conflicts.is_empty() {
        return;
    }
    println!(
        "\n{} {} existing entries will be kept (use --force to overwrite):",
        "Conflicts:".yellow().bold(),
        conflicts.len()
    );
    for conflict in conflicts {
        let marker = match conflict.kind {
            PatternKind::Directory => "/",
            PatternKind::File => "",
        };
        println!(
            "  [{}] {}{}",
            conflict.program.cyan(),
            conflict.target.display(),
            marker
        );
    }
}

/// Snapshot listing.
///
/// Console and Markdown output group snapshots by repository and branch,
/// newest first within each group. Snapshots carrying
/// [`contents`](SnapshotInfo::contents) are shown with their files.
pub fn render_listing(snapshots: &[SnapshotInfo], format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Json => {
            let json = serde_json::to_string_pretty(snapshots)
                .context("Failed to serialize snapshot list")?;
            println!("{json}");
        }
        ReportFormat::Markdown => println!("{}", listing_markdown(snapshots)),
        ReportFormat::Console => print_listing(snapshots),
    }
    Ok(())
}

fn print_listing(snapshots: &[SnapshotInfo]) {
    if snapshots.is_empty() {
        println!("{}", "No backups found".yellow());
        return;
    }

    for group in branch_groups(snapshots) {
        let first = group[0];
        println!("\n{} {}", first.repository.bold(), format!("({})", first.branch).dimmed());
        for info in group {
            println!("  {}  {}", info.timestamp.as_str().cyan(), programs_label(info));
            if info.contents.is_empty() {
                continue;
            }
            println!("    {}", info.path.display().to_string().dimmed());
            for program in &info.contents {
                println!("    {}", program.program.magenta().bold());
                for file in &program.files {
                    println!("      {}", file.display());
                }
            }
            println!(
                "    {} dotfiles restore {} TARGET_DIR --branch {} --date {}",
                "Restore:".dimmed(),
                info.repository,
                info.branch,
                info.timestamp
            );
        }
    }
}

/// Snapshots grouped by (repository, branch), newest first within a group.
///
/// Groups keep the order in which they first appear.
fn branch_groups(snapshots: &[SnapshotInfo]) -> Vec<Vec<&SnapshotInfo>> {
    let mut groups: Vec<Vec<&SnapshotInfo>> = Vec::new();
    for info in snapshots {
        let existing = groups
            .iter_mut()
            .find(|g| g[0].repository == info.repository && g[0].branch == info.branch);
        match existing {
            Some(group) => group.push(info),
            None => groups.push(vec![info]),
        }
    }
    for group in &mut groups {
        group.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }
    groups
}

fn programs_label(info: &SnapshotInfo) -> String {
    if info.contents.is_empty() {
        return info.programs.join(", ");
    }
    info.contents
        .iter()
        .map(|p| {
            let noun = if p.file_count() == 1 { "file" } else { "files" };
            format!("{} ({} {}, {} bytes)", p.program, p.file_count(), noun, p.bytes)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn listing_markdown(snapshots: &[SnapshotInfo]) -> String {
    let mut output = String::from("# Backups\n\n");
    if snapshots.is_empty() {
        output.push_str("No backups found.\n");
        return output;
    }
    output.push_str("| Repository | Branch | Timestamp | Programs |\n");
    output.push_str("|---|---|---|---|\n");
    for info in branch_groups(snapshots).into_iter().flatten() {
        output.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            info.repository,
            info.branch,
            info.timestamp,
            programs_label(info)
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ProgramContents;
    use crate::validate::{FailureReason, ProgramValidation, ValidationFailure};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn report() -> ValidationReport {
        let mut programs = BTreeMap::new();
        programs.insert(
            "cursor".to_string(),
            ProgramValidation {
                passed: vec![PathBuf::from("/t/.cursor")],
                failed: vec![ValidationFailure {
                    path: PathBuf::from("/t/.cursorrules"),
                    reason: FailureReason::Missing {
                        kind: PatternKind::File,
                    },
                    message: "File does not exist in target".to_string(),
                }],
            },
        );
        ValidationReport {
            all_valid: false,
            programs,
        }
    }

    #[test]
    fn test_markdown_generation() {
        let summary = ValidationSummary::new(&report(), Path::new("/snap"), Path::new("/t"));
        let markdown = summary.to_markdown();

        assert!(markdown.contains("# Restore Validation Report"));
        assert!(markdown.contains("## cursor"));
        assert!(markdown.contains("File does not exist in target"));
        assert!(markdown.contains("1 passed, 1 failed"));
    }

    #[test]
    fn test_json_generation() {
        let summary = ValidationSummary::new(&report(), Path::new("/snap"), Path::new("/t"));
        let json: serde_json::Value = serde_json::from_str(&summary.to_json().unwrap()).unwrap();

        assert_eq!(json["all_valid"], false);
        assert_eq!(json["programs"][0]["failed"][0]["reason"], "File does not exist in target");
    }

    #[test]
    fn test_empty_listing_markdown() {
        assert!(listing_markdown(&[]).contains("No backups found"));
    }

    fn snapshot(repository: &str, branch: &str, timestamp: &str) -> SnapshotInfo {
        let path = PathBuf::from("/backups").join(repository).join(branch).join(timestamp);
        let mut info = SnapshotInfo::from_path(&path).unwrap();
        info.programs = vec!["cursor".to_string()];
        info
    }

    #[test]
    fn test_listing_groups_interleaved_branches() {
        let snapshots = vec![
            snapshot("repo", "main", "20250401-000000"),
            snapshot("repo", "dev", "20250301-000000"),
            snapshot("repo", "main", "20250201-000000"),
            snapshot("other", "main", "20250115-000000"),
            snapshot("repo", "dev", "20250101-000000"),
        ];

        let groups = branch_groups(&snapshots);
        let keys: Vec<(String, String, Vec<String>)> = groups
            .iter()
            .map(|g| {
                (
                    g[0].repository.clone(),
                    g[0].branch.clone(),
                    g.iter().map(|i| i.timestamp.to_string()).collect(),
                )
            })
            .collect();
        let expected: Vec<(String, String, Vec<String>)> = vec![
            ("repo".into(), "main".into(), vec!["20250401-000000".into(), "20250201-000000".into()]),
            ("repo".into(), "dev".into(), vec!["20250301-000000".into(), "20250101-000000".into()]),
            ("other".into(), "main".into(), vec!["20250115-000000".into()]),
        ];
        assert_eq!(keys, expected);

        let markdown = listing_markdown(&snapshots);
        let main_rows: Vec<usize> = markdown
            .lines()
            .enumerate()
            .filter(|(_, line)| line.starts_with("| repo | main |"))
            .map(|(n, _)| n)
            .collect();
        assert_eq!(main_rows.len(), 2);
        assert_eq!(main_rows[1], main_rows[0] + 1);
    }

    #[test]
    fn test_programs_label_with_contents() {
        let mut info = snapshot("repo", "main", "20250401-000000");
        assert_eq!(programs_label(&info), "cursor");

        info.contents = vec![ProgramContents {
            program: "cursor".to_string(),
            files: vec![PathBuf::from(".cursorrules")],
            bytes: 12,
        }];
        assert_eq!(programs_label(&info), "cursor (1 file, 12 bytes)");

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["contents"][0]["bytes"], 12);
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("md".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert_eq!("JSON".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert!("xml".parse::<ReportFormat>().is_err());
    }
}
