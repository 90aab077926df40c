//! Per-platform build dispatch.
//!
//! Each target platform has a [`PlatformBuilder`] that knows the toolchain
//! command for a build type and where the outputs land. The
//! [`PlatformRegistry`] maps platform ids to builders so new platforms can
//! be added without touching the build manager.

mod android;
mod desktop;
mod ios;
mod web;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use android::AndroidBuilder;
pub use desktop::DesktopBuilder;
pub use ios::IosBuilder;
pub use web::WebBuilder;

use crate::builder::executor::StepExecutor;
use crate::core::artifact::BuildArtifact;
use crate::core::config::BuildType;
use crate::core::errors::BuildError;
use crate::core::platform::Platform;
use crate::util::process::ProcessBuilder;

/// What a builder needs to know about the run.
#[derive(Debug, Clone, Copy)]
pub struct DispatchContext<'a> {
    pub project_root: &'a Path,
    /// Flutter executable name or path
    pub flutter: &'a str,
    /// Deadline for one toolchain invocation
    pub timeout: Duration,
}

impl DispatchContext<'_> {
    /// `<project>/build/...`
    pub fn build_dir(&self) -> PathBuf {
        self.project_root.join("build")
    }

    /// `flutter build <target> --<mode>` running in the project root.
    pub fn flutter_build(&self, target: &str, build_type: &BuildType) -> ProcessBuilder {
        ProcessBuilder::new(self.flutter)
            .arg("build")
            .arg(target)
            .arg(build_type.mode.flag())
            .cwd(self.project_root)
    }
}

/// Toolchain invocation and output discovery for one platform.
pub trait PlatformBuilder: Send + Sync {
    fn platform(&self) -> Platform;

    /// The command that builds `build_type`, without the extra user args.
    fn build_command(&self, ctx: &DispatchContext<'_>, build_type: &BuildType) -> ProcessBuilder;

    /// Locate the outputs of a finished build.
    fn discover(
        &self,
        ctx: &DispatchContext<'_>,
        build_type: &BuildType,
    ) -> Result<Vec<BuildArtifact>, BuildError>;
}

/// Registry of platform builders.
pub struct PlatformRegistry {
    builders: HashMap<Platform, Box<dyn PlatformBuilder>>,
}

impl PlatformRegistry {
    /// A registry with every built-in platform.
    pub fn new() -> Self {
        let mut registry = PlatformRegistry::empty();

        registry.register(Box::new(AndroidBuilder));
        registry.register(Box::new(IosBuilder));
        registry.register(Box::new(WebBuilder));
        registry.register(Box::new(DesktopBuilder::new(Platform::Macos)));
        registry.register(Box::new(DesktopBuilder::new(Platform::Windows)));
        registry.register(Box::new(DesktopBuilder::new(Platform::Linux)));

        registry
    }

    pub fn empty() -> Self {
        PlatformRegistry {
            builders: HashMap::new(),
        }
    }

    /// Register a builder, replacing any previous one for its platform.
    pub fn register(&mut self, builder: Box<dyn PlatformBuilder>) {
        self.builders.insert(builder.platform(), builder);
    }

    pub fn get(&self, platform: Platform) -> Option<&dyn PlatformBuilder> {
        self.builders.get(&platform).map(|b| b.as_ref())
    }

    /// Full command line for a build type, extra args included.
    pub fn command_for(
        &self,
        ctx: &DispatchContext<'_>,
        platform: Platform,
        build_type: &BuildType,
    ) -> Result<ProcessBuilder, BuildError> {
        let builder = self
            .get(platform)
            .ok_or(BuildError::UnknownPlatform(platform))?;
        Ok(builder
            .build_command(ctx, build_type)
            .args(&build_type.args))
    }

    /// Build one build type and return its raw artifacts.
    pub fn dispatch(
        &self,
        executor: &StepExecutor,
        ctx: &DispatchContext<'_>,
        platform: Platform,
        build_type: &BuildType,
    ) -> Result<Vec<BuildArtifact>, BuildError> {
        let builder = self
            .get(platform)
            .ok_or(BuildError::UnknownPlatform(platform))?;
        let command = self.command_for(ctx, platform, build_type)?;
        let label = format!("{}:{}", platform, build_type.name);

        tracing::info!("Building {} `{}`", platform, build_type.name);
        executor.run_command(&label, &command, ctx.timeout)?;

        let artifacts = builder.discover(ctx, build_type)?;
        tracing::debug!(
            "Discovered {} artifact(s) for {}",
            artifacts.len(),
            label
        );

        Ok(artifacts
            .into_iter()
            .map(|a| a.with_build_type(&build_type.name))
            .collect())
    }
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn discovery_error(
    platform: Platform,
    build_type: &BuildType,
    message: impl Into<String>,
) -> BuildError {
    BuildError::Discovery {
        platform,
        build_type: build_type.name.clone(),
        message: message.into(),
    }
}

/// Entries of `dir` accepted by `keep`, sorted by name. Missing dir = none.
pub(crate) fn entries_matching<F>(dir: &Path, keep: F) -> Vec<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    let mut found: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| keep(p))
            .collect(),
        Err(_) => Vec::new(),
    };
    found.sort();
    found
}

pub(crate) fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}
