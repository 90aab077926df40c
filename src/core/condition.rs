//! Step conditions.
//!
//! A condition is written as `kind:argument` in the config file and parsed
//! once when the config is loaded. Unknown kinds are rejected at load time
//! rather than silently treated as "always run".

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::platform::Platform;
use crate::util::process::find_executable;

/// The closed set of predicates a step can be gated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionKind {
    /// A regular file exists (relative to the step's working directory).
    FileExists,
    /// A directory exists (relative to the step's working directory).
    DirExists,
    /// The platform's native project directory exists.
    PlatformAvailable,
    /// A process environment variable is set and non-empty.
    EnvSet,
    /// An executable is resolvable on PATH.
    CommandExists,
}

/// Predicate signature: `(argument, context) -> holds`.
type Predicate = fn(&str, &ConditionContext<'_>) -> bool;

impl ConditionKind {
    pub const ALL: [ConditionKind; 5] = [
        ConditionKind::FileExists,
        ConditionKind::DirExists,
        ConditionKind::PlatformAvailable,
        ConditionKind::EnvSet,
        ConditionKind::CommandExists,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionKind::FileExists => "file_exists",
            ConditionKind::DirExists => "dir_exists",
            ConditionKind::PlatformAvailable => "platform_available",
            ConditionKind::EnvSet => "env_set",
            ConditionKind::CommandExists => "command_exists",
        }
    }

    fn predicate(&self) -> Predicate {
        match self {
            ConditionKind::FileExists => file_exists,
            ConditionKind::DirExists => dir_exists,
            ConditionKind::PlatformAvailable => platform_available,
            ConditionKind::EnvSet => env_set,
            ConditionKind::CommandExists => command_exists,
        }
    }
}

impl FromStr for ConditionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConditionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<_> = ConditionKind::ALL.iter().map(|k| k.as_str()).collect();
                format!(
                    "unknown condition kind '{}'; expected one of {}",
                    s,
                    known.join(", ")
                )
            })
    }
}

/// Paths a condition is evaluated against.
#[derive(Debug, Clone, Copy)]
pub struct ConditionContext<'a> {
    /// Project root, used for `platform_available`.
    pub project_root: &'a Path,
    /// Step working directory, used to resolve relative paths.
    pub working_dir: &'a Path,
}

impl ConditionContext<'_> {
    fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_dir.join(path)
        }
    }
}

/// A parsed `kind:argument` step condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Condition {
    pub kind: ConditionKind,
    pub argument: String,
}

impl Condition {
    pub fn new(kind: ConditionKind, argument: impl Into<String>) -> Self {
        Condition {
            kind,
            argument: argument.into(),
        }
    }

    /// Evaluate the condition.
    pub fn evaluate(&self, ctx: &ConditionContext<'_>) -> bool {
        (self.kind.predicate())(&self.argument, ctx)
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, argument) = s
            .split_once(':')
            .ok_or_else(|| format!("condition '{}' must have the form kind:argument", s))?;

        let kind: ConditionKind = kind.trim().parse()?;
        let argument = argument.trim();
        if argument.is_empty() {
            return Err(format!("condition '{}' is missing its argument", s));
        }
        if kind == ConditionKind::PlatformAvailable {
            argument.parse::<Platform>()?;
        }

        Ok(Condition::new(kind, argument))
    }
}

impl TryFrom<String> for Condition {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Condition> for String {
    fn from(condition: Condition) -> Self {
        condition.to_string()
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.argument)
    }
}

fn file_exists(arg: &str, ctx: &ConditionContext<'_>) -> bool {
    ctx.resolve(arg).is_file()
}

fn dir_exists(arg: &str, ctx: &ConditionContext<'_>) -> bool {
    ctx.resolve(arg).is_dir()
}

fn platform_available(arg: &str, ctx: &ConditionContext<'_>) -> bool {
    match arg.parse::<Platform>() {
        Ok(platform) => ctx.project_root.join(platform.native_dir()).is_dir(),
        Err(_) => false,
    }
}

fn env_set(arg: &str, _ctx: &ConditionContext<'_>) -> bool {
    std::env::var_os(arg).is_some_and(|v| !v.is_empty())
}

fn command_exists(arg: &str, _ctx: &ConditionContext<'_>) -> bool {
    find_executable(arg).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_condition() {
        let cond: Condition = "file_exists:pubspec.yaml".parse().unwrap();
        assert_eq!(cond.kind, ConditionKind::FileExists);
        assert_eq!(cond.argument, "pubspec.yaml");
        assert_eq!(cond.to_string(), "file_exists:pubspec.yaml");
    }

    #[test]
    fn test_parse_rejects_unknown_kind() {
        let err = "file_exist:pubspec.yaml".parse::<Condition>().unwrap_err();
        assert!(err.contains("unknown condition kind"));
        assert!(err.contains("file_exist"));
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("file_exists".parse::<Condition>().is_err());
        assert!("env_set:".parse::<Condition>().is_err());
        assert!("platform_available:fuchsia".parse::<Condition>().is_err());
    }

    #[test]
    fn test_file_and_dir_conditions() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("present.txt"), "x").unwrap();
        std::fs::create_dir(tmp.path().join("assets")).unwrap();

        let ctx = ConditionContext {
            project_root: tmp.path(),
            working_dir: tmp.path(),
        };

        assert!(Condition::new(ConditionKind::FileExists, "present.txt").evaluate(&ctx));
        assert!(!Condition::new(ConditionKind::FileExists, "absent.txt").evaluate(&ctx));
        // A directory is not a regular file
        assert!(!Condition::new(ConditionKind::FileExists, "assets").evaluate(&ctx));
        assert!(Condition::new(ConditionKind::DirExists, "assets").evaluate(&ctx));
    }

    #[test]
    fn test_platform_available_uses_project_root() {
        let tmp = TempDir::new().unwrap();
        let sub = tmp.path().join("tool");
        std::fs::create_dir_all(tmp.path().join("android")).unwrap();
        std::fs::create_dir_all(&sub).unwrap();

        let ctx = ConditionContext {
            project_root: tmp.path(),
            working_dir: &sub,
        };

        assert!(Condition::new(ConditionKind::PlatformAvailable, "android").evaluate(&ctx));
        assert!(!Condition::new(ConditionKind::PlatformAvailable, "ios").evaluate(&ctx));
    }

    #[test]
    fn test_env_set() {
        let tmp = TempDir::new().unwrap();
        let ctx = ConditionContext {
            project_root: tmp.path(),
            working_dir: tmp.path(),
        };

        assert!(Condition::new(ConditionKind::EnvSet, "PATH").evaluate(&ctx));
        assert!(
            !Condition::new(ConditionKind::EnvSet, "FDAWG_SURELY_NOT_SET_4711").evaluate(&ctx)
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_command_exists() {
        let tmp = TempDir::new().unwrap();
        let ctx = ConditionContext {
            project_root: tmp.path(),
            working_dir: tmp.path(),
        };

        assert!(Condition::new(ConditionKind::CommandExists, "sh").evaluate(&ctx));
        assert!(
            !Condition::new(ConditionKind::CommandExists, "fdawg-no-such-tool-4711").evaluate(&ctx)
        );
    }

    #[test]
    fn test_serde_round_trip() {
        let cond = Condition::new(ConditionKind::CommandExists, "flutter");
        let yaml = serde_yaml::to_string(&cond).unwrap();
        assert_eq!(yaml.trim(), "command_exists:flutter");

        let back: Condition = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, cond);
    }
}
