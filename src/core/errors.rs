//! Error types for builds and artifact management.

use std::path::PathBuf;

use thiserror::Error;

use crate::core::config::ConfigError;
use crate::core::platform::Platform;

/// Error raised while running steps, building platforms or organizing artifacts.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("not a Flutter project: {}", path.display())]
    InvalidProject { path: PathBuf, message: String },

    #[error("step `{step}` failed: {message}")]
    StepFailed { step: String, message: String },

    #[error("platform `{platform}` is not available (missing {})", dir.display())]
    PlatformUnavailable { platform: Platform, dir: PathBuf },

    #[error("no builder registered for platform `{0}`")]
    UnknownPlatform(Platform),

    #[error("{platform} build `{build_type}` produced no artifact: {message}")]
    Discovery {
        platform: Platform,
        build_type: String,
        message: String,
    },

    #[error("failed to organize `{artifact}`: {message}")]
    Organize { artifact: String, message: String },

    #[error("invalid duration `{expr}`: {message}")]
    InvalidDuration { expr: String, message: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        BuildError::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this failure came from a shell step or toolchain invocation.
    pub fn is_step_failure(&self) -> bool {
        matches!(self, BuildError::StepFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = BuildError::StepFailed {
            step: "pub get".to_string(),
            message: "exited with code 1".to_string(),
        };
        assert_eq!(err.to_string(), "step `pub get` failed: exited with code 1");
        assert!(err.is_step_failure());

        let err = BuildError::PlatformUnavailable {
            platform: Platform::Ios,
            dir: PathBuf::from("/app/ios"),
        };
        assert!(err.to_string().contains("`ios`"));
        assert!(err.to_string().contains("/app/ios"));
    }
}
