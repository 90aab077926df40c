//! Build artifacts and run results.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::core::platform::Platform;

/// Architecture reported when an artifact runs everywhere or is unknown.
pub const UNIVERSAL_ARCH: &str = "universal";

/// A build output, raw (just discovered) or organized.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildArtifact {
    pub platform: Platform,
    pub build_type: String,
    pub architecture: String,
    pub file_name: String,
    pub file_path: PathBuf,
    /// Bytes; for directory artifacts the sum of contained files
    pub size: u64,
    pub build_time: DateTime<Local>,
    pub app_name: String,
    pub version: String,
}

impl BuildArtifact {
    /// A freshly discovered output, before naming and placement.
    pub fn raw(platform: Platform, architecture: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let file_path = path.into();
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        BuildArtifact {
            platform,
            build_type: String::new(),
            architecture: architecture.into(),
            file_name,
            file_path,
            size: 0,
            build_time: Local::now(),
            app_name: String::new(),
            version: String::new(),
        }
    }

    pub fn with_build_type(mut self, build_type: impl Into<String>) -> Self {
        self.build_type = build_type.into();
        self
    }
}

/// Outcome of one platform within a run.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformBuildResult {
    pub platform: Platform,
    pub success: bool,
    pub artifacts: Vec<BuildArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl PlatformBuildResult {
    pub fn new(platform: Platform) -> Self {
        PlatformBuildResult {
            platform,
            success: false,
            artifacts: Vec::new(),
            error: None,
            duration: Duration::ZERO,
        }
    }
}

/// Final state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildOutcome {
    /// Artifacts were produced and every platform succeeded
    Success,
    /// Artifacts were produced but at least one platform failed
    PartialFailure,
    /// Nothing was produced or the run was aborted
    Failure,
}

/// Aggregate result of one `execute_build` call.
#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    /// At least one artifact and no run-level abort
    pub success: bool,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub platform_results: Vec<PlatformBuildResult>,
    pub artifacts: Vec<BuildArtifact>,
    /// Non-fatal problems: optional step failures, dropped artifacts
    pub warnings: Vec<String>,
    /// The failure that ended the run early, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BuildResult {
    pub fn empty() -> Self {
        BuildResult {
            success: false,
            duration: Duration::ZERO,
            platform_results: Vec::new(),
            artifacts: Vec::new(),
            warnings: Vec::new(),
            error: None,
        }
    }

    /// Result for a platform, if it was attempted.
    pub fn platform(&self, platform: Platform) -> Option<&PlatformBuildResult> {
        self.platform_results.iter().find(|r| r.platform == platform)
    }

    pub fn outcome(&self) -> BuildOutcome {
        if !self.success {
            BuildOutcome::Failure
        } else if self.platform_results.iter().all(|r| r.success) {
            BuildOutcome::Success
        } else {
            BuildOutcome::PartialFailure
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}
