//! Core data structures for fdawg.
//!
//! This module contains the types shared by the executor, the build manager
//! and the artifact manager:
//! - Platforms and the project description
//! - The build configuration model and step conditions
//! - Artifacts, results and errors

pub mod artifact;
pub mod condition;
pub mod config;
pub mod errors;
pub mod platform;
pub mod project;
pub mod step;

pub use artifact::{BuildArtifact, BuildOutcome, BuildResult, PlatformBuildResult};
pub use condition::{Condition, ConditionKind};
pub use config::{
    config_file_path, default_config, load_config, save_config, BuildConfig, BuildMode,
    BuildType, ConfigError, OutputKind,
};
pub use errors::BuildError;
pub use platform::Platform;
pub use project::{AndroidLabelResolver, DisplayNameResolver, Project};
pub use step::BuildStep;
