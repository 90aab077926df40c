//! Command implementations

pub mod artifacts;
pub mod build;
pub mod clean;
pub mod completions;
pub mod config;
pub mod plan;
pub mod status;
