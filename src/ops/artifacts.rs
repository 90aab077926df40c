//! Implementation of `fdawg artifacts`, `fdawg status` and `fdawg clean`.

use std::path::PathBuf;

use anyhow::Result;

use crate::artifact::{ArtifactFilters, ArtifactManager, BuildStatus, CleanupReport};
use crate::core::artifact::BuildArtifact;
use crate::ops::OpsContext;

/// What `clean` did.
#[derive(Debug, Clone)]
pub enum CleanOutcome {
    /// The whole output tree was removed
    All { base_dir: PathBuf, existed: bool },
    /// Only artifacts older than the cutoff were removed
    OlderThan(CleanupReport),
}

fn artifact_manager(ctx: &OpsContext) -> Result<ArtifactManager> {
    let config = ctx.load_config()?;
    let project = ctx.project()?;
    Ok(ArtifactManager::new(project.root(), &config.artifacts))
}

/// Organized artifacts matching `filters`, newest first.
pub fn list(ctx: &OpsContext, filters: &ArtifactFilters) -> Result<Vec<BuildArtifact>> {
    Ok(artifact_manager(ctx)?.list_artifacts(filters)?)
}

pub fn status(ctx: &OpsContext) -> Result<BuildStatus> {
    Ok(artifact_manager(ctx)?.build_status()?)
}

/// Remove the whole output tree, or only artifacts older than `older_than`.
pub fn clean(ctx: &OpsContext, older_than: Option<&str>) -> Result<CleanOutcome> {
    let manager = artifact_manager(ctx)?;

    match older_than {
        Some(expr) => Ok(CleanOutcome::OlderThan(manager.clean_older_than(expr)?)),
        None => {
            let base_dir = manager.base_dir().to_path_buf();
            let existed = base_dir.exists();
            manager.clean_all()?;
            Ok(CleanOutcome::All { base_dir, existed })
        }
    }
}

/// Human-readable byte count (`512 B`, `1.5 KB`, `23.0 MB`).
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}
