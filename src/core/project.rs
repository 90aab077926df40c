//! Flutter project description.
//!
//! The build engine only needs three things from a project: that it is a
//! Flutter project at all, its manifest name/version, and which native
//! platform directories exist.

use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Deserializer};

use crate::core::errors::BuildError;
use crate::core::platform::Platform;

/// Project manifest file name.
pub const MANIFEST_NAME: &str = "pubspec.yaml";

/// Name and version read from `pubspec.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProjectManifest {
    #[serde(default, deserialize_with = "scalar_string")]
    pub name: Option<String>,

    #[serde(default, deserialize_with = "scalar_string")]
    pub version: Option<String>,
}

/// Accept any YAML scalar; `version: 1.0` parses as a float.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_yaml::Value>::deserialize(deserializer)? {
        Some(serde_yaml::Value::String(s)) => Some(s),
        Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
        Some(serde_yaml::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// A validated Flutter project root.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
}

impl Project {
    /// Open a project, requiring a `pubspec.yaml` at its root.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, BuildError> {
        let root = root.as_ref();
        let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());

        if !root.join(MANIFEST_NAME).is_file() {
            return Err(BuildError::InvalidProject {
                message: format!("no {} found", MANIFEST_NAME),
                path: root,
            });
        }

        Ok(Project { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_NAME)
    }

    /// Read the manifest's name and version.
    pub fn manifest(&self) -> Result<ProjectManifest, BuildError> {
        let path = self.manifest_path();
        let contents = std::fs::read_to_string(&path)
            .map_err(|e| BuildError::io(format!("failed to read {}", path.display()), e))?;

        serde_yaml::from_str(&contents).map_err(|e| BuildError::InvalidProject {
            path: path.clone(),
            message: e.to_string(),
        })
    }

    /// Native project directory for a platform.
    pub fn platform_dir(&self, platform: Platform) -> PathBuf {
        self.root.join(platform.native_dir())
    }

    pub fn is_platform_available(&self, platform: Platform) -> bool {
        self.platform_dir(platform).is_dir()
    }

    /// Platforms whose native directory exists.
    pub fn available_platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.is_platform_available(*p))
            .collect()
    }
}

/// Resolves the user-facing app name, preferred over the manifest name.
pub trait DisplayNameResolver: Send + Sync {
    fn display_name(&self, project_root: &Path) -> Option<String>;
}

/// Reads `android:label` from the Android manifest.
///
/// Resource references (`@string/app_name`) are not followed.
#[derive(Debug, Default, Clone, Copy)]
pub struct AndroidLabelResolver;

impl DisplayNameResolver for AndroidLabelResolver {
    fn display_name(&self, project_root: &Path) -> Option<String> {
        let manifest = project_root
            .join("android")
            .join("app")
            .join("src")
            .join("main")
            .join("AndroidManifest.xml");
        let contents = std::fs::read_to_string(manifest).ok()?;

        let re = Regex::new(r#"android:label\s*=\s*"([^"]*)""#).ok()?;
        let label = re.captures(&contents)?.get(1)?.as_str().trim();

        if label.is_empty() || label.starts_with('@') {
            None
        } else {
            Some(label.to_string())
        }
    }
}

/// Resolver that never finds a display name.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDisplayName;

impl DisplayNameResolver for NoDisplayName {
    fn display_name(&self, _project_root: &Path) -> Option<String> {
        None
    }
}
