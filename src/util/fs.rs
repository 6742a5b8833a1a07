use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::model::now_millis;

/// Write `contents` to a temp file beside `path` and rename it over the target.
///
/// An existing target is resolved through symlinks first, so the link stays in
/// place and the file it points at is replaced, keeping its permissions.
/// Missing parent directories are created.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let target = if path.exists() {
        fs::canonicalize(path).with_context(|| format!("Failed to resolve {:?}", path))?
    } else {
        path.to_path_buf()
    };
    let permissions = fs::metadata(&target).ok().map(|meta| meta.permissions());

    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .with_context(|| format!("Failed to create directory {:?}", parent))?;

    let mut temp = NamedTempFile::new_in(&parent)
        .with_context(|| format!("Failed to create temp file in {:?}", parent))?;
    temp.write_all(contents.as_bytes())
        .with_context(|| format!("Failed to write temp file for {:?}", path))?;
    if let Some(permissions) = permissions {
        temp.as_file()
            .set_permissions(permissions)
            .with_context(|| format!("Failed to copy permissions of {:?}", target))?;
    }
    temp.as_file()
        .sync_all()
        .with_context(|| format!("Failed to flush temp file for {:?}", path))?;
    temp.persist(&target)
        .map_err(|err| err.error)
        .with_context(|| format!("Failed to replace {:?}", target))?;
    Ok(())
}

/// Sibling backup path: `<path>.backup.<millis>`.
pub fn backup_path(path: &Path, millis: i64) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".backup.{millis}"));
    PathBuf::from(name)
}

/// Copy an existing file to a fresh backup path. Returns `None` if there was
/// nothing to back up.
///
/// Backups are never overwritten: if the timestamped name is taken, the
/// timestamp is advanced until a free name is found.
pub fn backup_existing(path: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }

    let mut millis = now_millis();
    let mut target = backup_path(path, millis);
    while target.exists() {
        millis += 1;
        target = backup_path(path, millis);
    }

    fs::copy(path, &target)
        .with_context(|| format!("Failed to back up {:?} to {:?}", path, target))?;
    debug!(source = %path.display(), backup = %target.display(), "created backup");
    Ok(Some(target))
}

/// All backups of `path`, oldest first.
pub fn list_backups(path: &Path) -> Result<Vec<PathBuf>> {
    let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) else {
        return Ok(Vec::new());
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    let prefix = format!("{}.backup.", file_name.to_string_lossy());

    let mut backups: Vec<(i64, PathBuf)> = Vec::new();
    for entry in fs::read_dir(parent).with_context(|| format!("Failed to read {:?}", parent))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if let Some(stamp) = name.strip_prefix(&prefix) {
            if let Ok(millis) = stamp.parse::<i64>() {
                backups.push((millis, entry.path()));
            }
        }
    }
    backups.sort();
    Ok(backups.into_iter().map(|(_, path)| path).collect())
}
