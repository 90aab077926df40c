//! iOS: signed IPAs and Xcode archives.

use crate::builder::platform::{
    discovery_error, entries_matching, has_extension, DispatchContext, PlatformBuilder,
};
use crate::core::artifact::BuildArtifact;
use crate::core::config::{BuildType, OutputKind};
use crate::core::errors::BuildError;
use crate::core::platform::Platform;
use crate::util::process::ProcessBuilder;

/// Every shipping iOS device is arm64.
const IOS_ARCH: &str = "arm64";

#[derive(Debug, Default, Clone, Copy)]
pub struct IosBuilder;

impl PlatformBuilder for IosBuilder {
    fn platform(&self) -> Platform {
        Platform::Ios
    }

    fn build_command(&self, ctx: &DispatchContext<'_>, build_type: &BuildType) -> ProcessBuilder {
        // `flutter build ipa` produces the archive as well.
        let mut cmd = ctx.flutter_build("ipa", build_type);
        if let Some(method) = build_type.export_method.as_deref().filter(|m| !m.is_empty()) {
            cmd = cmd.arg("--export-method").arg(method);
        }
        if !build_type.codesign {
            cmd = cmd.arg("--no-codesign");
        }
        cmd
    }

    fn discover(
        &self,
        ctx: &DispatchContext<'_>,
        build_type: &BuildType,
    ) -> Result<Vec<BuildArtifact>, BuildError> {
        let ios_dir = ctx.build_dir().join("ios");
        let ipa_dir = ios_dir.join("ipa");
        let archive_dir = ios_dir.join("archive");

        let ipa = || {
            entries_matching(&ipa_dir, |p| p.is_file() && has_extension(p, "ipa"))
                .into_iter()
                .next()
        };
        let archive = || {
            entries_matching(&archive_dir, |p| p.is_dir() && has_extension(p, "xcarchive"))
                .into_iter()
                .next()
        };

        // Unsigned builds stop at the archive, so an IPA request falls back to it.
        let found = match build_type.output_kind(Platform::Ios) {
            OutputKind::Xcarchive => archive(),
            _ => ipa().or_else(archive),
        };

        match found {
            Some(path) => Ok(vec![BuildArtifact::raw(Platform::Ios, IOS_ARCH, path)]),
            None => Err(discovery_error(
                Platform::Ios,
                build_type,
                format!(
                    "no .ipa in {} or .xcarchive in {}",
                    ipa_dir.display(),
                    archive_dir.display()
                ),
            )),
        }
    }
}
