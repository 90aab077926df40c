//! Shared utilities

pub mod archive;
pub mod fs;
pub mod process;

pub use process::ProcessBuilder;
