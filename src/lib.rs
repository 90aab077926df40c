//! fdawg - Build orchestration and artifact management for Flutter projects
//!
//! This crate provides the library behind the `fdawg` command: the build
//! configuration model, pre-build step execution, per-platform build
//! dispatch and the organized artifact tree.

pub mod artifact;
pub mod builder;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities for fdawg unit tests.
///
/// This module is only available when compiling with `--cfg test`. It
/// builds throwaway Flutter projects in temporary directories.
#[cfg(test)]
pub mod test_support;

pub use crate::artifact::{ArtifactFilters, ArtifactManager};
pub use crate::builder::{BuildManager, BuildOptions};
pub use crate::core::{
    config::{default_config, load_config, save_config},
    BuildArtifact, BuildConfig, BuildError, BuildResult, Platform,
};
