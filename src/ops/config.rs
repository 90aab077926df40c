//! Implementation of `fdawg config`.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::core::config::{save_config, BuildConfig};
use crate::ops::{display_relative, OpsContext};

/// Write a default config for the project's available platforms.
///
/// Refuses to overwrite an existing file unless `force` is set.
pub fn init_config(ctx: &OpsContext, force: bool) -> Result<PathBuf> {
    let project = ctx.project()?;
    let path = ctx.config_file();

    if path.exists() && !force {
        bail!(
            "{} already exists\n\
             hint: pass --force to overwrite it",
            display_relative(&path, project.root())
        );
    }

    let config = BuildConfig::for_project(&project);
    if config.enabled_platforms().is_empty() {
        tracing::warn!("No platform directories found; every platform starts disabled");
    }

    save_config(&ctx.project_root, ctx.config_path.as_deref(), &config)?;
    tracing::debug!("Enabled platforms: {:?}", config.enabled_platforms());

    Ok(path)
}

/// The effective configuration as YAML.
pub fn show_config(ctx: &OpsContext) -> Result<String> {
    let config = ctx.load_config()?;
    config.to_yaml().context("failed to serialize build configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::load_config;
    use crate::core::platform::Platform;
    use crate::test_support::TestProject;

    #[test]
    fn test_init_config_writes_loadable_file() {
        let fixture = TestProject::new()
            .name("shop")
            .platforms(&[Platform::Android, Platform::Ios])
            .build();
        let ctx = OpsContext::new(fixture.path());

        let path = init_config(&ctx, false).unwrap();
        assert!(path.ends_with(".fdawg/build.yaml"));

        let config = load_config(fixture.path(), None).unwrap();
        assert_eq!(config.enabled_platforms(), vec![Platform::Android, Platform::Ios]);
        assert!(!config.pre_build.steps_for(Platform::Ios).is_empty());
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let fixture = TestProject::new()
            .name("shop")
            .file(".fdawg/build.yaml", "execution:\n  continue_on_error: false\n")
            .build();
        let ctx = OpsContext::new(fixture.path());

        let err = init_config(&ctx, false).unwrap_err();
        assert!(err.to_string().contains("already exists"));

        init_config(&ctx, true).unwrap();
        let config = load_config(fixture.path(), None).unwrap();
        assert!(config.execution.continue_on_error);
    }

    #[test]
    fn test_show_config_round_trips() {
        let fixture = TestProject::new().name("shop").platforms(&[Platform::Web]).build();
        let yaml = show_config(&OpsContext::new(fixture.path())).unwrap();

        let parsed = BuildConfig::parse(&yaml, std::path::Path::new("shown.yaml")).unwrap();
        assert_eq!(parsed.enabled_platforms(), vec![Platform::Web]);
    }
}
