//! Compressed archive creation.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::NamedTempFile;
use walkdir::WalkDir;

use crate::util::fs::ensure_dir;

/// Pack `src_dir` into a gzip-compressed tarball at `dest`.
///
/// Entries are stored under `root_name/` in file-name order. The archive is
/// written to a temporary file next to `dest` and renamed into place, so a
/// failed run never leaves a truncated archive behind.
pub fn create_tar_gz(src_dir: &Path, dest: &Path, root_name: &str) -> Result<()> {
    if !src_dir.is_dir() {
        bail!("cannot archive {}: not a directory", src_dir.display());
    }

    let parent = dest
        .parent()
        .with_context(|| format!("invalid archive path: {}", dest.display()))?;
    ensure_dir(parent)?;

    let tmp = NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temporary file in {}", parent.display()))?;

    {
        let encoder = GzEncoder::new(tmp.as_file(), Compression::default());
        let mut builder = tar::Builder::new(encoder);

        for entry in WalkDir::new(src_dir).sort_by_file_name() {
            let entry = entry.with_context(|| format!("failed to walk {}", src_dir.display()))?;
            let rel = entry
                .path()
                .strip_prefix(src_dir)
                .with_context(|| format!("unexpected path {}", entry.path().display()))?;
            let name = Path::new(root_name).join(rel);

            if entry.file_type().is_dir() {
                builder
                    .append_dir(&name, entry.path())
                    .with_context(|| format!("failed to add {}", entry.path().display()))?;
            } else if entry.file_type().is_file() {
                let mut file = fs::File::open(entry.path())
                    .with_context(|| format!("failed to open {}", entry.path().display()))?;
                builder
                    .append_file(&name, &mut file)
                    .with_context(|| format!("failed to add {}", entry.path().display()))?;
            }
        }

        let encoder = builder
            .into_inner()
            .context("failed to finish tar archive")?;
        encoder.finish().context("failed to finish gzip stream")?;
    }

    tmp.persist(dest)
        .with_context(|| format!("failed to write archive {}", dest.display()))?;
    Ok(())
}
