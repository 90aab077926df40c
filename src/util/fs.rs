//! Filesystem utilities.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Recursively copy a directory.
///
/// Symlinks are recreated rather than followed, so bundle layouts such as
/// `Versions/Current -> A` survive the copy.
pub fn copy_dir_all(src: &Path, dst: &Path) -> Result<()> {
    fs::create_dir_all(dst)
        .with_context(|| format!("failed to create directory: {}", dst.display()))?;

    for entry in fs::read_dir(src)
        .with_context(|| format!("failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let ty = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if ty.is_symlink() {
            copy_symlink(&src_path, &dst_path)?;
        } else if ty.is_dir() {
            copy_dir_all(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path).with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    src_path.display(),
                    dst_path.display()
                )
            })?;
        }
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let target = fs::read_link(src)
        .with_context(|| format!("failed to read link: {}", src.display()))?;
    std::os::unix::fs::symlink(&target, dst)
        .with_context(|| format!("failed to create link: {}", dst.display()))
}

#[cfg(not(unix))]
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    if src.is_dir() {
        copy_dir_all(src, dst)
    } else {
        fs::copy(src, dst)
            .map(|_| ())
            .with_context(|| format!("failed to copy {} to {}", src.display(), dst.display()))
    }
}

/// Remove a directory and all its contents, if it exists.
pub fn remove_dir_all_if_exists(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    Ok(())
}

/// Remove a file or directory tree, if it exists.
pub fn remove_path(path: &Path) -> Result<()> {
    // A link is removed itself, never its target.
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => remove_dir_all_if_exists(path),
        Ok(_) => fs::remove_file(path)
            .with_context(|| format!("failed to remove file: {}", path.display())),
        Err(_) => Ok(()),
    }
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Move a file or directory, replacing anything at the destination.
///
/// Tries a rename first; when that fails (typically across filesystems)
/// the source is copied and then removed.
pub fn move_path(src: &Path, dst: &Path) -> Result<()> {
    if let Some(parent) = dst.parent() {
        ensure_dir(parent)?;
    }
    remove_path(dst)?;

    if fs::rename(src, dst).is_ok() {
        return Ok(());
    }

    if src.is_dir() {
        copy_dir_all(src, dst)?;
        fs::remove_dir_all(src)
            .with_context(|| format!("failed to remove directory: {}", src.display()))?;
    } else {
        fs::copy(src, dst).with_context(|| {
            format!("failed to copy {} to {}", src.display(), dst.display())
        })?;
        fs::remove_file(src)
            .with_context(|| format!("failed to remove file: {}", src.display()))?;
    }
    Ok(())
}

/// Size in bytes of a file, or of every file under a directory.
pub fn path_size(path: &Path) -> Result<u64> {
    let meta = fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?;
    if meta.is_file() {
        return Ok(meta.len());
    }

    let mut total = 0;
    for entry in WalkDir::new(path) {
        let entry = entry.with_context(|| format!("failed to walk {}", path.display()))?;
        if entry.file_type().is_file() {
            total += entry.metadata()?.len();
        }
    }
    Ok(total)
}

/// Remove empty directories below `root` (but never `root` itself).
pub fn remove_empty_dirs(root: &Path) -> Result<()> {
    if !root.is_dir() {
        return Ok(());
    }

    // Deepest first so parents see their children gone.
    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if entry.file_type().is_dir() {
            let is_empty = fs::read_dir(entry.path())
                .map(|mut it| it.next().is_none())
                .unwrap_or(false);
            if is_empty {
                fs::remove_dir(entry.path()).with_context(|| {
                    format!("failed to remove directory: {}", entry.path().display())
                })?;
            }
        }
    }
    Ok(())
}
