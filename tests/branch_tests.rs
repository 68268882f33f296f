//! Branch-aware backups against a real git working tree.
//!
//! Skipped when git is not installed.

use dotfiles::backup::{BackupManager, BackupOptions};
use dotfiles::events::RecordingSink;
use dotfiles::programs::Config;
use dotfiles::repository::Repository;
use dotfiles::scm::{GitScm, VersionControl};
use dotfiles::store::{BackupSelector, SnapshotStore};
use std::fs;
use tempfile::TempDir;

fn git_repo(temp: &TempDir) -> Option<GitScm> {
    if !GitScm::is_available() {
        eprintln!("Skipping: git not installed");
        return None;
    }
    let root = temp.path().join("project");
    let git = GitScm::init(&root).unwrap();
    fs::write(root.join(".windsurfrules"), "on main").unwrap();
    git.stage_all().unwrap();
    git.commit("Initial commit").unwrap();
    Some(git)
}

#[test]
fn test_snapshot_is_filed_under_current_branch() {
    let temp = TempDir::new().unwrap();
    let Some(git) = git_repo(&temp) else {
        return;
    };
    git.create_branch("feature/login").unwrap();

    let mut repo = Repository::open(git.workdir()).unwrap();
    assert_eq!(repo.branch(), "feature/login");

    let config = Config::default();
    let store = SnapshotStore::new(temp.path().join("backups"));
    let report = BackupManager::new(&config, &store, RecordingSink::new())
        .backup(&mut repo, &BackupOptions::default())
        .unwrap();

    assert!(report
        .snapshot
        .starts_with(temp.path().join("backups/project/feature-login")));
    let found = store
        .find_backup("project", &BackupSelector::newest().branch("feature/login"))
        .unwrap();
    assert_eq!(found, Some(report.snapshot));
}

#[test]
fn test_backup_switches_branch_when_clean() {
    let temp = TempDir::new().unwrap();
    let Some(git) = git_repo(&temp) else {
        return;
    };
    let main = git.current_branch().unwrap();
    git.create_branch("develop").unwrap();
    fs::write(git.workdir().join(".windsurfrules"), "on develop").unwrap();
    git.stage_all().unwrap();
    git.commit("Develop rules").unwrap();

    let mut repo = Repository::open(git.workdir()).unwrap();
    let config = Config::default();
    let store = SnapshotStore::new(temp.path().join("backups"));
    let options = BackupOptions {
        branch: Some(main.clone()),
        ..Default::default()
    };
    let report = BackupManager::new(&config, &store, RecordingSink::new())
        .backup(&mut repo, &options)
        .unwrap();

    assert_eq!(report.branch, main);
    assert_eq!(
        fs::read_to_string(report.snapshot.join("windsurf/.windsurfrules")).unwrap(),
        "on main"
    );
}

#[test]
fn test_backup_refuses_branch_switch_with_changes() {
    let temp = TempDir::new().unwrap();
    let Some(git) = git_repo(&temp) else {
        return;
    };
    git.create_branch("develop").unwrap();
    fs::write(git.workdir().join(".windsurfrules"), "uncommitted").unwrap();

    let mut repo = Repository::open(git.workdir()).unwrap();
    let config = Config::default();
    let store = SnapshotStore::new(temp.path().join("backups"));
    let options = BackupOptions {
        branch: Some("somewhere-else".to_string()),
        ..Default::default()
    };
    let err = BackupManager::new(&config, &store, RecordingSink::new())
        .backup(&mut repo, &options)
        .unwrap_err();

    assert_eq!(err.kind(), dotfiles::error::ErrorKind::Vcs);
    assert_eq!(repo.branch(), "develop");
    assert!(store.list_backups(None).is_empty());
}
