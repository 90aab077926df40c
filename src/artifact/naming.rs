//! Artifact file naming.

use std::path::Path;

use crate::core::artifact::BuildArtifact;
use crate::core::config::{AppNameSource, MetadataConfig, VersionSource};
use crate::core::project::{DisplayNameResolver, Project};

/// App name used when no source yields one.
pub const FALLBACK_APP_NAME: &str = "app";

/// Version used when no source yields one.
pub const FALLBACK_VERSION: &str = "0.0.0";

/// Name used when sanitizing leaves nothing behind.
const FALLBACK_FILE_STEM: &str = "artifact";

/// Extensions made of two dotted parts.
const COMPOUND_EXTENSIONS: [&str; 1] = ["tar.gz"];

/// App name and version stamped onto every artifact of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactIdentity {
    pub app_name: String,
    pub version: String,
}

impl ArtifactIdentity {
    pub fn new(app_name: impl Into<String>, version: impl Into<String>) -> Self {
        ArtifactIdentity {
            app_name: app_name.into(),
            version: version.into(),
        }
    }

    /// Resolve the identity for a project according to the metadata sources.
    pub fn resolve(
        project: &Project,
        metadata: &MetadataConfig,
        resolver: &dyn DisplayNameResolver,
    ) -> Self {
        let manifest = match project.manifest() {
            Ok(manifest) => manifest,
            Err(e) => {
                tracing::warn!("Could not read project manifest: {}", e);
                Default::default()
            }
        };
        let custom_name = non_blank(metadata.custom_app_name.as_deref());

        let app_name = match metadata.app_name_source {
            AppNameSource::Derived => resolver
                .display_name(project.root())
                .and_then(|n| non_blank(Some(n.as_str())))
                .or_else(|| non_blank(manifest.name.as_deref()))
                .or(custom_name),
            AppNameSource::Manifest => non_blank(manifest.name.as_deref()),
            AppNameSource::Custom => custom_name,
        };

        let version = match metadata.version_source {
            VersionSource::Manifest => non_blank(manifest.version.as_deref()),
            VersionSource::Custom => non_blank(metadata.custom_version.as_deref()),
        };

        ArtifactIdentity {
            app_name: app_name.unwrap_or_else(|| FALLBACK_APP_NAME.to_string()),
            version: version.unwrap_or_else(|| FALLBACK_VERSION.to_string()),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Substitute naming tokens for one artifact. Unknown tokens are left as is.
pub fn render_pattern(pattern: &str, identity: &ArtifactIdentity, artifact: &BuildArtifact) -> String {
    pattern
        .replace("{app_name}", &identity.app_name)
        .replace("{version}", &identity.version)
        .replace("{arch}", &artifact.architecture)
        .replace("{platform}", artifact.platform.as_str())
        .replace("{build_type}", &artifact.build_type)
}

/// Final file name: rendered pattern, sanitized, plus the raw extension.
pub fn artifact_file_name(
    pattern: &str,
    identity: &ArtifactIdentity,
    artifact: &BuildArtifact,
) -> String {
    let stem = sanitize(&render_pattern(pattern, identity, artifact));
    let stem = if stem.is_empty() {
        FALLBACK_FILE_STEM.to_string()
    } else {
        stem
    };

    match artifact_extension(&artifact.file_name) {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

/// Extension of an artifact file name, aware of `tar.gz`.
pub fn artifact_extension(file_name: &str) -> Option<&str> {
    let lower = file_name.to_ascii_lowercase();
    for compound in COMPOUND_EXTENSIONS {
        if lower.ends_with(&format!(".{}", compound)) && lower.len() > compound.len() + 1 {
            return Some(&file_name[file_name.len() - compound.len()..]);
        }
    }

    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
}

/// Make a string safe to use as a file name.
///
/// Characters that are illegal on common filesystems, control characters
/// and whitespace become `_`. A run of `_`/`-` separators collapses to its
/// first character and separators at either end are trimmed.
pub fn sanitize(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_sep = false;

    for c in name.chars() {
        let c = if is_illegal(c) { '_' } else { c };
        let is_sep = c == '_' || c == '-';
        if is_sep && prev_sep {
            continue;
        }
        prev_sep = is_sep;
        out.push(c);
    }

    out.trim_matches(|c| c == '_' || c == '-').to_string()
}

fn is_illegal(c: char) -> bool {
    matches!(c, '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*')
        || c.is_control()
        || c.is_whitespace()
}
