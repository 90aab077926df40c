//! Build event log.
//!
//! When `execution.save_logs` is on, every run appends one JSON object per
//! line to the project's build log:
//!
//! ```text
//! {"timestamp":"2024-06-06T10:30:00+02:00","event":"build-started","platforms":["android"]}
//! {"timestamp":"...","event":"step-finished","scope":"global","step":"Get dependencies","success":true,"duration_ms":2140}
//! {"timestamp":"...","event":"build-finished","success":true,"duration_ms":93120,"artifacts":3}
//! ```
//!
//! New fields may be added; existing ones are not renamed.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

use crate::builder::executor::{StepObserver, StepOutcome};
use crate::core::errors::BuildError;
use crate::core::platform::Platform;
use crate::core::step::BuildStep;
use crate::util::fs::ensure_dir;

/// One line of the build log.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum BuildEvent {
    #[serde(rename = "build-started")]
    BuildStarted { platforms: Vec<Platform> },

    /// A step ran, successfully or not.
    #[serde(rename = "step-finished")]
    StepFinished {
        /// `global` or the platform name
        scope: String,
        step: String,
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "step-skipped")]
    StepSkipped {
        scope: String,
        step: String,
        reason: String,
    },

    #[serde(rename = "platform-finished")]
    PlatformFinished {
        platform: Platform,
        success: bool,
        artifacts: usize,
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    #[serde(rename = "artifact-organized")]
    ArtifactOrganized {
        platform: Platform,
        build_type: String,
        path: PathBuf,
        size: u64,
    },

    #[serde(rename = "warning")]
    Warning { message: String },

    #[serde(rename = "build-finished")]
    BuildFinished {
        success: bool,
        duration_ms: u64,
        artifacts: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl BuildEvent {
    pub fn warning(message: impl Into<String>) -> Self {
        BuildEvent::Warning {
            message: message.into(),
        }
    }

    /// Event for a finished or skipped step.
    pub fn step(scope: &str, step: &BuildStep, outcome: &Result<StepOutcome, BuildError>) -> Self {
        match outcome {
            Ok(StepOutcome::Completed { duration }) => BuildEvent::StepFinished {
                scope: scope.to_string(),
                step: step.name.clone(),
                success: true,
                duration_ms: Some(millis(*duration)),
                error: None,
            },
            Ok(StepOutcome::Skipped { reason }) => BuildEvent::StepSkipped {
                scope: scope.to_string(),
                step: step.name.clone(),
                reason: reason.clone(),
            },
            Err(err) => BuildEvent::StepFinished {
                scope: scope.to_string(),
                step: step.name.clone(),
                success: false,
                duration_ms: None,
                error: Some(err.to_string()),
            },
        }
    }

    /// The JSON line for this event, stamped with the current time.
    pub fn to_json(&self) -> String {
        let mut value = match serde_json::to_value(self) {
            Ok(value) => value,
            Err(_) => return String::new(),
        };
        if let Some(map) = value.as_object_mut() {
            map.insert(
                "timestamp".to_string(),
                serde_json::Value::String(Local::now().to_rfc3339()),
            );
        }
        value.to_string()
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Append-only JSON-lines sink. A disabled log swallows events.
#[derive(Debug, Default)]
pub struct EventLog {
    file: Option<File>,
    path: Option<PathBuf>,
}

impl EventLog {
    /// Open (or create) a log file for appending.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open build log {}", path.display()))?;

        Ok(EventLog {
            file: Some(file),
            path: Some(path.to_path_buf()),
        })
    }

    pub fn disabled() -> Self {
        EventLog::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write one event. A write failure disables the log with a warning.
    pub fn emit(&mut self, event: BuildEvent) {
        let Some(file) = self.file.as_mut() else {
            return;
        };

        let line = event.to_json();
        if let Err(e) = writeln!(file, "{}", line) {
            tracing::warn!("Disabling build log after write failure: {}", e);
            self.file = None;
        }
    }
}

impl StepObserver for EventLog {
    fn step_finished(&mut self, label: &str, step: &BuildStep, outcome: &Result<StepOutcome, BuildError>) {
        self.emit(BuildEvent::step(label, step, outcome));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_event_serialization() {
        let json = BuildEvent::PlatformFinished {
            platform: Platform::Android,
            success: true,
            artifacts: 3,
            duration_ms: 1200,
            error: None,
        }
        .to_json();

        assert!(json.contains("\"event\":\"platform-finished\""));
        assert!(json.contains("\"platform\":\"android\""));
        assert!(json.contains("\"artifacts\":3"));
        assert!(json.contains("\"timestamp\""));
        assert!(!json.contains("\"error\""));
    }

    #[test]
    fn test_step_events() {
        let step = BuildStep::new("Install CocoaPods", "pod install");

        let skipped = BuildEvent::step(
            "ios",
            &step,
            &Ok(StepOutcome::Skipped {
                reason: "condition `file_exists:Podfile` is false".to_string(),
            }),
        );
        assert!(skipped.to_json().contains("\"event\":\"step-skipped\""));

        let failed = BuildEvent::step(
            "ios",
            &step,
            &Err(BuildError::StepFailed {
                step: step.name.clone(),
                message: "exited with code 1".to_string(),
            }),
        );
        let json = failed.to_json();
        assert!(json.contains("\"event\":\"step-finished\""));
        assert!(json.contains("\"success\":false"));
    }

    #[test]
    fn test_event_log_appends_lines() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".fdawg/logs/build.log");

        let mut log = EventLog::open(&path).unwrap();
        log.emit(BuildEvent::BuildStarted {
            platforms: vec![Platform::Web],
        });
        log.emit(BuildEvent::warning("optional step failed"));
        drop(log);

        let mut log = EventLog::open(&path).unwrap();
        log.emit(BuildEvent::BuildFinished {
            success: true,
            duration_ms: 10,
            artifacts: 1,
            error: None,
        });
        drop(log);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 3);
        for line in &lines {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(value.get("event").is_some());
        }
        assert!(lines[2].contains("build-finished"));
    }

    #[test]
    fn test_disabled_log_is_silent() {
        let mut log = EventLog::disabled();
        log.emit(BuildEvent::warning("nothing happens"));
        assert!(log.path().is_none());
    }
}
