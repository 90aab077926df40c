//! Implementation of `fdawg build` and `fdawg plan`.

use anyhow::Result;

use crate::builder::{BuildManager, BuildOptions};
use crate::core::artifact::BuildResult;
use crate::core::platform::Platform;
use crate::ops::OpsContext;

/// Build `platforms` (empty = every enabled platform).
pub fn build(ctx: &OpsContext, platforms: &[Platform], options: &BuildOptions) -> Result<BuildResult> {
    let config = ctx.load_config()?;
    let manager = BuildManager::new(&ctx.project_root, config)?;

    Ok(manager.execute_build(platforms, options)?)
}

/// The build plan as text.
pub fn plan(ctx: &OpsContext, platforms: &[Platform], options: &BuildOptions) -> Result<String> {
    let config = ctx.load_config()?;
    let manager = BuildManager::new(&ctx.project_root, config)?;

    Ok(manager.show_build_plan(platforms, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestProject;

    #[test]
    fn test_plan_uses_project_config() {
        let fixture = TestProject::new()
            .name("shop")
            .platforms(&[Platform::Web])
            .file(
                ".fdawg/build.yaml",
                "platforms:\n  web:\n    enabled: true\n    build_types:\n      - name: site\n        output: web\n        args: [--base-href, /shop/]\n",
            )
            .build();

        let text = plan(&OpsContext::new(fixture.path()), &[], &BuildOptions::default()).unwrap();
        assert!(text.contains("build `site`: flutter build web --release --base-href /shop/"));
    }

    #[test]
    fn test_build_outside_project_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = build(&OpsContext::new(tmp.path()), &[], &BuildOptions::default()).unwrap_err();
        assert!(format!("{:#}", err).contains("not a Flutter project"));
    }
}
