//! Test fixtures for fdawg unit tests.
//!
//! ```rust,ignore
//! let fixture = TestProject::new()
//!     .name("shop")
//!     .platforms(&[Platform::Android, Platform::Web])
//!     .build();
//! let project = Project::open(fixture.path())?;
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::core::platform::Platform;

/// Builder for a throwaway Flutter project on disk.
#[derive(Debug, Clone, Default)]
pub struct TestProject {
    name: Option<String>,
    version: Option<String>,
    platforms: Vec<Platform>,
    android_label: Option<String>,
    files: Vec<(PathBuf, String)>,
}

impl TestProject {
    pub fn new() -> Self {
        Self::default()
    }

    /// `name` in pubspec.yaml.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// `version` in pubspec.yaml.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Create the native directories for these platforms.
    pub fn platforms(mut self, platforms: &[Platform]) -> Self {
        self.platforms.extend_from_slice(platforms);
        self
    }

    /// Write an AndroidManifest.xml carrying this `android:label`.
    pub fn android_label(mut self, label: impl Into<String>) -> Self {
        self.android_label = Some(label.into());
        self
    }

    /// Add an arbitrary file, relative to the project root.
    pub fn file(mut self, path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        self.files.push((path.into(), contents.into()));
        self
    }

    pub fn build(self) -> ProjectFixture {
        let dir = TempDir::new().unwrap();
        let root = dir.path();

        let mut pubspec = String::new();
        if let Some(name) = &self.name {
            pubspec.push_str(&format!("name: {}\n", name));
        }
        pubspec.push_str("description: A test project.\n");
        if let Some(version) = &self.version {
            pubspec.push_str(&format!("version: {}\n", version));
        }
        pubspec.push_str("environment:\n  sdk: '>=3.0.0 <4.0.0'\n");
        fs::write(root.join("pubspec.yaml"), pubspec).unwrap();

        for platform in &self.platforms {
            fs::create_dir_all(root.join(platform.native_dir())).unwrap();
        }

        if let Some(label) = &self.android_label {
            let manifest_dir = root.join("android/app/src/main");
            fs::create_dir_all(&manifest_dir).unwrap();
            fs::write(
                manifest_dir.join("AndroidManifest.xml"),
                format!(
                    r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android">
    <application
        android:label="{}"
        android:icon="@mipmap/ic_launcher">
    </application>
</manifest>
"#,
                    label
                ),
            )
            .unwrap();
        }

        for (path, contents) in &self.files {
            let path = root.join(path);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, contents).unwrap();
        }

        ProjectFixture { dir }
    }
}

/// A project created by [`TestProject::build`]; removed on drop.
#[derive(Debug)]
pub struct ProjectFixture {
    dir: TempDir,
}

impl ProjectFixture {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file below the project root, creating parents.
    pub fn write(&self, path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.dir.path().join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }
}
