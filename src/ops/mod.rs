//! High-level operations.
//!
//! This module contains the implementation of fdawg commands. Each
//! operation loads the project's configuration and drives the build or
//! artifact manager; printing is left to the caller.

pub mod artifacts;
pub mod build;
pub mod config;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::core::config::{config_file_path, load_config, BuildConfig, ConfigError};
use crate::core::project::Project;

pub use artifacts::{clean, format_size, list, status, CleanOutcome};
pub use build::{build, plan};
pub use config::{init_config, show_config};

/// Where a command runs: the project and an optional config override.
#[derive(Debug, Clone)]
pub struct OpsContext {
    pub project_root: PathBuf,
    /// Config file given on the command line
    pub config_path: Option<PathBuf>,
}

impl OpsContext {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        OpsContext {
            project_root: project_root.into(),
            config_path: None,
        }
    }

    pub fn with_config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn project(&self) -> Result<Project> {
        Ok(Project::open(&self.project_root)?)
    }

    /// The config file this context reads and writes.
    pub fn config_file(&self) -> PathBuf {
        config_file_path(&self.project_root, self.config_path.as_deref())
    }

    /// Load the build configuration.
    ///
    /// Without an explicit config path, a project that has no config file
    /// builds with the defaults for its available platforms.
    pub fn load_config(&self) -> Result<BuildConfig> {
        match load_config(&self.project_root, self.config_path.as_deref()) {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound { path }) if self.config_path.is_none() => {
                let project = self.project()?;
                tracing::info!(
                    "No build config at {}; using defaults (run `fdawg config init` to create one)",
                    display_relative(&path, project.root())
                );
                Ok(BuildConfig::for_project(&project))
            }
            Err(e) => Err(e).context("failed to load build configuration"),
        }
    }
}

/// `path` relative to `base` when it lies inside it.
pub(crate) fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::platform::Platform;
    use crate::test_support::TestProject;

    #[test]
    fn test_missing_config_falls_back_to_project_defaults() {
        let fixture = TestProject::new()
            .name("shop")
            .platforms(&[Platform::Android, Platform::Web])
            .build();

        let config = OpsContext::new(fixture.path()).load_config().unwrap();
        assert_eq!(config.enabled_platforms(), vec![Platform::Android, Platform::Web]);
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let fixture = TestProject::new().name("shop").build();
        let ctx = OpsContext::new(fixture.path()).with_config_path(Some("ci/build.yaml".into()));

        let err = ctx.load_config().unwrap_err();
        assert!(format!("{:#}", err).contains("not found"));
    }

    #[test]
    fn test_invalid_config_reports_field() {
        let fixture = TestProject::new()
            .name("shop")
            .file(".fdawg/build.yaml", "artifacts:\n  cleanup:\n    older_than: 3 fortnights\n")
            .build();

        let err = OpsContext::new(fixture.path()).load_config().unwrap_err();
        assert!(format!("{:#}", err).contains("artifacts.cleanup.older_than"));
    }
}
