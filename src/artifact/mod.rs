//! Artifact management.
//!
//! Names raw build outputs, places them in the output tree and answers
//! queries about what is there.

pub mod duration;
pub mod manager;
pub mod naming;

pub use duration::{parse_duration, MaxAge};
pub use manager::{ArtifactFilters, ArtifactManager, BuildStatus, CleanupReport, RecentBuild};
pub use naming::ArtifactIdentity;
