//! Filesystem helpers shared by backup, restore and migration.

use std::fs::{self, File, FileTimes};
use std::path::{Path, PathBuf};

use crate::error::{IoResultExt, StoreResult};
use crate::resolver::PathResolver;

/// Copy one file, creating parent directories and keeping its timestamps.
///
/// Permissions are carried over by `fs::copy`; access and modification
/// times are set afterwards.
pub(crate) fn copy_file(src: &Path, dest: &Path) -> StoreResult<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).at_path(parent)?;
    }
    let bytes = fs::copy(src, dest).at_path(src)?;

    let metadata = fs::metadata(src).at_path(src)?;
    let mut times = FileTimes::new();
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }
    // Read-only files cannot be opened for writing; their times stay as copied
    if let Ok(file) = File::options().write(true).open(dest) {
        if let Err(e) = file.set_times(times) {
            log::debug!("Could not preserve times on {}: {}", dest.display(), e);
        }
    }

    Ok(bytes)
}

/// Copy every qualifying file below `src` to the same relative path under
/// `dest`, file by file.
///
/// Returns the destination paths written. Stops at the first failure.
pub(crate) fn copy_dir(resolver: &PathResolver, src: &Path, dest: &Path) -> StoreResult<Vec<PathBuf>> {
    let mut written = Vec::new();
    for entry in resolver.files_under(src, src) {
        let target = dest.join(&entry.relative);
        copy_file(&entry.absolute, &target)?;
        written.push(target);
    }
    Ok(written)
}

/// Copy a whole tree verbatim, without exclusion filtering.
pub(crate) fn copy_tree(src: &Path, dest: &Path) -> StoreResult<()> {
    for entry in walkdir::WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            let source = e
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("filesystem loop"));
            crate::error::StoreError::io(path, source)
        })?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target).at_path(&target)?;
        } else {
            copy_file(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Remove a file, symlink or directory tree.
pub(crate) fn remove_entry(path: &Path) -> StoreResult<()> {
    let metadata = fs::symlink_metadata(path).at_path(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path).at_path(path)
    } else {
        fs::remove_file(path).at_path(path)
    }
}

/// Move an entry, falling back to copy and delete when rename fails
/// (for example across filesystems).
pub(crate) fn move_entry(src: &Path, dest: &Path) -> StoreResult<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).at_path(parent)?;
    }
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) => {
            log::debug!(
                "Rename {} -> {} failed ({}), copying instead",
                src.display(),
                dest.display(),
                e
            );
            if src.is_dir() {
                copy_tree(src, dest)?;
            } else {
                copy_file(src, dest)?;
            }
            remove_entry(src)
        }
    }
}
