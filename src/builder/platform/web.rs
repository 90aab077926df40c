//! Web: the `build/web` bundle packed into a tarball.

use crate::builder::platform::{discovery_error, DispatchContext, PlatformBuilder};
use crate::core::artifact::{BuildArtifact, UNIVERSAL_ARCH};
use crate::core::config::BuildType;
use crate::core::errors::BuildError;
use crate::core::platform::Platform;
use crate::util::archive::create_tar_gz;
use crate::util::process::ProcessBuilder;

#[derive(Debug, Default, Clone, Copy)]
pub struct WebBuilder;

impl PlatformBuilder for WebBuilder {
    fn platform(&self) -> Platform {
        Platform::Web
    }

    fn build_command(&self, ctx: &DispatchContext<'_>, build_type: &BuildType) -> ProcessBuilder {
        ctx.flutter_build("web", build_type)
    }

    fn discover(
        &self,
        ctx: &DispatchContext<'_>,
        build_type: &BuildType,
    ) -> Result<Vec<BuildArtifact>, BuildError> {
        let bundle = ctx.build_dir().join("web");
        if !bundle.is_dir() {
            return Err(discovery_error(
                Platform::Web,
                build_type,
                format!("expected {}", bundle.display()),
            ));
        }

        let archive = ctx
            .build_dir()
            .join("fdawg")
            .join(format!("web-{}.tar.gz", build_type.mode));
        create_tar_gz(&bundle, &archive, "web")
            .map_err(|e| discovery_error(Platform::Web, build_type, format!("{:#}", e)))?;

        Ok(vec![BuildArtifact::raw(Platform::Web, UNIVERSAL_ARCH, archive)])
    }
}
