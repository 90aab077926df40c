//! Android: APKs and app bundles.

use crate::builder::platform::{discovery_error, DispatchContext, PlatformBuilder};
use crate::core::artifact::{BuildArtifact, UNIVERSAL_ARCH};
use crate::core::config::{BuildType, OutputKind};
use crate::core::errors::BuildError;
use crate::core::platform::Platform;
use crate::util::process::ProcessBuilder;

/// ABI directory names paired with the architecture we report.
const SPLIT_ABIS: [(&str, &str); 3] = [
    ("armeabi-v7a", "armv7"),
    ("arm64-v8a", "arm64"),
    ("x86_64", "x86_64"),
];

#[derive(Debug, Default, Clone, Copy)]
pub struct AndroidBuilder;

impl PlatformBuilder for AndroidBuilder {
    fn platform(&self) -> Platform {
        Platform::Android
    }

    fn build_command(&self, ctx: &DispatchContext<'_>, build_type: &BuildType) -> ProcessBuilder {
        let output = build_type.output_kind(Platform::Android);
        let target = if output == OutputKind::Aab {
            "appbundle"
        } else {
            "apk"
        };

        let mut cmd = ctx.flutter_build(target, build_type);
        if output == OutputKind::Apk && build_type.split_per_abi {
            cmd = cmd.arg("--split-per-abi");
        }
        cmd
    }

    fn discover(
        &self,
        ctx: &DispatchContext<'_>,
        build_type: &BuildType,
    ) -> Result<Vec<BuildArtifact>, BuildError> {
        let outputs = ctx.build_dir().join("app").join("outputs");
        let mode = build_type.mode.as_str();

        match build_type.output_kind(Platform::Android) {
            OutputKind::Apk if build_type.split_per_abi => {
                let apk_dir = outputs.join("flutter-apk");
                let found: Vec<_> = SPLIT_ABIS
                    .iter()
                    .map(|(abi, arch)| (apk_dir.join(format!("app-{}-{}.apk", abi, mode)), *arch))
                    .filter(|(path, _)| path.is_file())
                    .map(|(path, arch)| BuildArtifact::raw(Platform::Android, arch, path))
                    .collect();

                if found.is_empty() {
                    return Err(discovery_error(
                        Platform::Android,
                        build_type,
                        format!("no per-ABI APKs in {}", apk_dir.display()),
                    ));
                }
                Ok(found)
            }
            output => {
                let path = if output == OutputKind::Aab {
                    outputs
                        .join("bundle")
                        .join(mode)
                        .join(format!("app-{}.aab", mode))
                } else {
                    outputs.join("flutter-apk").join(format!("app-{}.apk", mode))
                };

                if !path.is_file() {
                    return Err(discovery_error(
                        Platform::Android,
                        build_type,
                        format!("expected {}", path.display()),
                    ));
                }
                Ok(vec![BuildArtifact::raw(Platform::Android, UNIVERSAL_ARCH, path)])
            }
        }
    }
}
