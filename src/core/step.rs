//! Build step definitions.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::core::condition::Condition;

/// Timeout applied when a step does not set one.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// A named shell command run before a build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildStep {
    /// Display name, used in logs and errors
    pub name: String,

    /// Shell command line
    pub command: String,

    /// Whether a failure aborts the step list
    pub required: bool,

    /// Timeout in seconds (0 = default of 5 minutes)
    pub timeout: u64,

    /// Working directory, relative to the project root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    /// Extra environment variables; values may reference `$VAR`
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,

    /// Gate evaluated before running
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_condition"
    )]
    pub condition: Option<Condition>,
}

impl Default for BuildStep {
    fn default() -> Self {
        BuildStep {
            name: String::new(),
            command: String::new(),
            required: true,
            timeout: 0,
            working_dir: None,
            environment: BTreeMap::new(),
            condition: None,
        }
    }
}

impl BuildStep {
    /// Create a required step with default timeout.
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        BuildStep {
            name: name.into(),
            command: command.into(),
            ..Default::default()
        }
    }

    /// Mark the step as optional.
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Effective timeout for this step.
    pub fn timeout(&self) -> Duration {
        if self.timeout == 0 {
            DEFAULT_STEP_TIMEOUT
        } else {
            Duration::from_secs(self.timeout)
        }
    }
}

/// Treat a missing or blank condition as "no condition".
fn deserialize_condition<'de, D>(deserializer: D) -> Result<Option<Condition>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(s) if !s.trim().is_empty() => s
            .trim()
            .parse::<Condition>()
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::condition::ConditionKind;

    #[test]
    fn test_step_defaults() {
        let step: BuildStep = serde_yaml::from_str("name: deps\ncommand: flutter pub get\n").unwrap();
        assert!(step.required);
        assert_eq!(step.timeout(), DEFAULT_STEP_TIMEOUT);
        assert!(step.condition.is_none());
    }

    #[test]
    fn test_step_blank_condition_is_none() {
        let step: BuildStep =
            serde_yaml::from_str("name: a\ncommand: b\ncondition: \"\"\n").unwrap();
        assert!(step.condition.is_none());
    }

    #[test]
    fn test_step_condition_parsed() {
        let yaml = "name: gen\ncommand: dart run build_runner build\ncondition: file_exists:build.yaml\ntimeout: 600\n";
        let step: BuildStep = serde_yaml::from_str(yaml).unwrap();
        let cond = step.condition.as_ref().unwrap();
        assert_eq!(cond.kind, ConditionKind::FileExists);
        assert_eq!(step.timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_step_unknown_condition_fails() {
        let yaml = "name: gen\ncommand: x\ncondition: file_exist:build.yaml\n";
        let err = serde_yaml::from_str::<BuildStep>(yaml).unwrap_err();
        assert!(err.to_string().contains("unknown condition kind"));
    }
}
