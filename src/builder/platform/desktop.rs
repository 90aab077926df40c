//! Desktop: macOS app bundles, Windows and Linux executables.

use std::path::{Path, PathBuf};

use crate::builder::platform::{
    discovery_error, entries_matching, has_extension, DispatchContext, PlatformBuilder,
};
use crate::core::artifact::{BuildArtifact, UNIVERSAL_ARCH};
use crate::core::config::BuildType;
use crate::core::errors::BuildError;
use crate::core::platform::{host_architecture, Platform};
use crate::util::process::ProcessBuilder;

/// Builder for one desktop platform.
#[derive(Debug, Clone, Copy)]
pub struct DesktopBuilder {
    platform: Platform,
}

impl DesktopBuilder {
    pub fn new(platform: Platform) -> Self {
        debug_assert!(platform.is_desktop());
        DesktopBuilder { platform }
    }

    /// Directory the toolchain leaves the finished build in.
    pub fn output_dir(&self, ctx: &DispatchContext<'_>, build_type: &BuildType) -> PathBuf {
        let build = ctx.build_dir();
        let mode = build_type.mode;
        match self.platform {
            Platform::Macos => build
                .join("macos")
                .join("Build")
                .join("Products")
                .join(mode.dir_name()),
            Platform::Windows => build
                .join("windows")
                .join(host_architecture())
                .join("runner")
                .join(mode.dir_name()),
            _ => build
                .join("linux")
                .join(host_architecture())
                .join(mode.as_str())
                .join("bundle"),
        }
    }

    fn find_outputs(&self, dir: &Path) -> Vec<BuildArtifact> {
        match self.platform {
            Platform::Macos => entries_matching(dir, |p| p.is_dir() && has_extension(p, "app"))
                .into_iter()
                .map(|app| {
                    let arch = bundle_architecture(&app);
                    BuildArtifact::raw(Platform::Macos, arch, app)
                })
                .collect(),
            Platform::Windows => entries_matching(dir, |p| p.is_file() && has_extension(p, "exe"))
                .into_iter()
                .map(|exe| BuildArtifact::raw(Platform::Windows, host_architecture(), exe))
                .collect(),
            _ => entries_matching(dir, |p| is_executable(p))
                .into_iter()
                .map(|bin| BuildArtifact::raw(Platform::Linux, host_architecture(), bin))
                .collect(),
        }
    }
}

impl PlatformBuilder for DesktopBuilder {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn build_command(&self, ctx: &DispatchContext<'_>, build_type: &BuildType) -> ProcessBuilder {
        ctx.flutter_build(self.platform.as_str(), build_type)
    }

    fn discover(
        &self,
        ctx: &DispatchContext<'_>,
        build_type: &BuildType,
    ) -> Result<Vec<BuildArtifact>, BuildError> {
        let dir = self.output_dir(ctx, build_type);
        let found = self.find_outputs(&dir);
        if found.is_empty() {
            return Err(discovery_error(
                self.platform,
                build_type,
                format!("no application found in {}", dir.display()),
            ));
        }
        Ok(found)
    }
}

/// Architecture of a macOS bundle's main executable via `lipo -archs`.
///
/// Fat binaries and failed `lipo` calls report `universal`.
fn bundle_architecture(app: &Path) -> String {
    let Some(exe) = bundle_executable(app) else {
        return UNIVERSAL_ARCH.to_string();
    };

    let output = match ProcessBuilder::new("lipo").arg("-archs").arg(&exe).exec() {
        Ok(output) if output.status.success() => output,
        _ => {
            tracing::debug!("lipo -archs failed for {}", exe.display());
            return UNIVERSAL_ARCH.to_string();
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    let archs: Vec<&str> = stdout.split_whitespace().collect();
    match archs.as_slice() {
        [single] => single.to_string(),
        _ => UNIVERSAL_ARCH.to_string(),
    }
}

/// `Contents/MacOS/<bundle name>`, or the first file there.
fn bundle_executable(app: &Path) -> Option<PathBuf> {
    let macos_dir = app.join("Contents").join("MacOS");
    let named = app
        .file_stem()
        .map(|stem| macos_dir.join(stem))
        .filter(|p| p.is_file());
    named.or_else(|| {
        entries_matching(&macos_dir, |p| p.is_file())
            .into_iter()
            .next()
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() && path.extension().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::BuildMode;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn ctx(root: &Path) -> DispatchContext<'_> {
        DispatchContext {
            project_root: root,
            flutter: "flutter",
            timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_commands() {
        let root = Path::new("/app");
        let build_type = BuildType::default_for(Platform::Linux);
        for platform in [Platform::Macos, Platform::Windows, Platform::Linux] {
            let cmd = DesktopBuilder::new(platform).build_command(&ctx(root), &build_type);
            assert_eq!(
                cmd.display_command(),
                format!("flutter build {} --release", platform)
            );
        }
    }

    #[test]
    fn test_output_dirs() {
        let root = Path::new("/app");
        let mut build_type = BuildType::default_for(Platform::Macos);
        build_type.mode = BuildMode::Debug;

        assert_eq!(
            DesktopBuilder::new(Platform::Macos).output_dir(&ctx(root), &build_type),
            root.join("build/macos/Build/Products/Debug")
        );
        assert_eq!(
            DesktopBuilder::new(Platform::Windows).output_dir(&ctx(root), &build_type),
            root.join("build/windows")
                .join(host_architecture())
                .join("runner/Debug")
        );
        assert_eq!(
            DesktopBuilder::new(Platform::Linux).output_dir(&ctx(root), &build_type),
            root.join("build/linux")
                .join(host_architecture())
                .join("debug/bundle")
        );
    }

    #[test]
    fn test_discover_windows_exe() {
        let tmp = TempDir::new().unwrap();
        let builder = DesktopBuilder::new(Platform::Windows);
        let build_type = BuildType::default_for(Platform::Windows);
        let dir = builder.output_dir(&ctx(tmp.path()), &build_type);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("shop.exe"), "MZ").unwrap();
        fs::write(dir.join("flutter_windows.dll"), "").unwrap();

        let found = builder.discover(&ctx(tmp.path()), &build_type).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_name, "shop.exe");
        assert_eq!(found[0].architecture, host_architecture());
    }

    #[cfg(unix)]
    #[test]
    fn test_discover_linux_executable() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let builder = DesktopBuilder::new(Platform::Linux);
        let build_type = BuildType::default_for(Platform::Linux);
        let dir = builder.output_dir(&ctx(tmp.path()), &build_type);
        fs::create_dir_all(dir.join("lib")).unwrap();
        fs::write(dir.join("shop"), "ELF").unwrap();
        fs::set_permissions(dir.join("shop"), fs::Permissions::from_mode(0o755)).unwrap();
        fs::write(dir.join("icudtl.dat"), "").unwrap();

        let found = builder.discover(&ctx(tmp.path()), &build_type).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_name, "shop");
    }

    #[test]
    fn test_discover_macos_bundle_without_lipo_binary() {
        let tmp = TempDir::new().unwrap();
        let builder = DesktopBuilder::new(Platform::Macos);
        let build_type = BuildType::default_for(Platform::Macos);
        let dir = builder.output_dir(&ctx(tmp.path()), &build_type);
        fs::create_dir_all(dir.join("Shop.app/Contents/Resources")).unwrap();

        let found = builder.discover(&ctx(tmp.path()), &build_type).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].file_name, "Shop.app");
        assert_eq!(found[0].architecture, UNIVERSAL_ARCH);
    }

    #[test]
    fn test_discover_empty() {
        let tmp = TempDir::new().unwrap();
        let builder = DesktopBuilder::new(Platform::Linux);
        let err = builder
            .discover(&ctx(tmp.path()), &BuildType::default_for(Platform::Linux))
            .unwrap_err();
        assert!(matches!(err, BuildError::Discovery { platform: Platform::Linux, .. }));
    }
}
