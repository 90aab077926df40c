//! Build orchestration.
//!
//! This module runs pre-build steps, dispatches platform builds to the
//! Flutter toolchain and hands the outputs to the artifact manager.

pub mod events;
pub mod executor;
pub mod manager;
pub mod plan;
pub mod platform;

pub use events::{BuildEvent, EventLog};
pub use executor::{StepExecutor, StepObserver, StepOutcome, StepsReport};
pub use manager::{BuildManager, BuildOptions};
pub use plan::{render_build_plan, BuildPlan, PlatformPlan};
pub use platform::{DispatchContext, PlatformBuilder, PlatformRegistry};
