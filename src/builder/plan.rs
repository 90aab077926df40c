//! Build plan resolution and rendering.
//!
//! A [`BuildPlan`] is what a run will do: which platforms, which steps and
//! which build types, in order. It is a pure function of the configuration
//! and the caller's request; dry runs print it, real runs execute it.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::builder::manager::BuildOptions;
use crate::builder::platform::{DispatchContext, PlatformRegistry};
use crate::core::config::{BuildConfig, BuildType};
use crate::core::platform::Platform;
use crate::core::step::BuildStep;

/// Work for one platform.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformPlan {
    pub platform: Platform,
    /// Platform-specific pre-build steps
    pub steps: Vec<BuildStep>,
    pub build_types: Vec<BuildType>,
}

/// A resolved run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildPlan {
    /// Global pre-build steps (empty when skipped)
    pub pre_build: Vec<BuildStep>,
    /// Platforms in execution order
    pub platforms: Vec<PlatformPlan>,
    pub continue_on_error: bool,
    /// Requests that were dropped while resolving
    pub warnings: Vec<String>,
}

impl BuildPlan {
    /// Resolve a request against the configuration.
    ///
    /// No platforms requested means every enabled platform. Requested
    /// platforms that are disabled are dropped with a warning; duplicates
    /// keep their first position.
    pub fn resolve(config: &BuildConfig, requested: &[Platform], options: &BuildOptions) -> Self {
        let mut warnings = Vec::new();

        let candidates: Vec<Platform> = if requested.is_empty() {
            config.enabled_platforms()
        } else {
            let mut unique = Vec::with_capacity(requested.len());
            for platform in requested {
                if !unique.contains(platform) {
                    unique.push(*platform);
                }
            }
            unique
        };

        let mut platforms = Vec::new();
        for platform in candidates {
            let block = config.platforms.get(platform);
            if !block.enabled {
                warnings.push(format!("{} is disabled in the build config; skipping", platform));
                continue;
            }

            let build_types: Vec<BuildType> = block
                .build_types
                .iter()
                .filter(|bt| options.build_types.is_empty() || options.build_types.contains(&bt.name))
                .cloned()
                .collect();
            if build_types.is_empty() && !block.build_types.is_empty() {
                warnings.push(format!(
                    "no {} build type matches {}",
                    platform,
                    options.build_types.join(", ")
                ));
            }

            let steps = if options.skip_pre_build {
                Vec::new()
            } else {
                config.pre_build.steps_for(platform).to_vec()
            };

            platforms.push(PlatformPlan {
                platform,
                steps,
                build_types,
            });
        }

        BuildPlan {
            pre_build: if options.skip_pre_build {
                Vec::new()
            } else {
                config.pre_build.global.clone()
            },
            platforms,
            continue_on_error: options
                .continue_on_error
                .unwrap_or(config.execution.continue_on_error),
            warnings,
        }
    }

    pub fn platform_ids(&self) -> Vec<Platform> {
        self.platforms.iter().map(|p| p.platform).collect()
    }

    /// Number of build type invocations the plan makes.
    pub fn build_count(&self) -> usize {
        self.platforms.iter().map(|p| p.build_types.len()).sum()
    }
}

/// Human-readable plan for `--dry-run` and `fdawg plan`.
pub fn render_build_plan(
    config: &BuildConfig,
    project_root: &Path,
    registry: &PlatformRegistry,
    platforms: &[Platform],
    options: &BuildOptions,
) -> String {
    PlanReport {
        plan: BuildPlan::resolve(config, platforms, options),
        config,
        project_root,
        registry,
        skip_pre_build: options.skip_pre_build,
    }
    .to_string()
}

struct PlanReport<'a> {
    plan: BuildPlan,
    config: &'a BuildConfig,
    project_root: &'a Path,
    registry: &'a PlatformRegistry,
    skip_pre_build: bool,
}

impl fmt::Display for PlanReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plan = &self.plan;
        let ctx = DispatchContext {
            project_root: self.project_root,
            flutter: &self.config.execution.flutter_executable,
            timeout: self.config.execution.build_timeout(),
        };

        writeln!(f, "Build plan for {}", self.project_root.display())?;

        if self.skip_pre_build {
            writeln!(f, "\nPre-build: skipped")?;
        } else {
            writeln!(f, "\nPre-build (global):")?;
            write_steps(f, &plan.pre_build)?;
        }

        for platform in &plan.platforms {
            writeln!(f, "\n{}:", platform.platform)?;
            if !platform.steps.is_empty() {
                writeln!(f, "  pre-build:")?;
                write_steps(f, &platform.steps)?;
            }
            if platform.build_types.is_empty() {
                writeln!(f, "  (no build types)")?;
            }
            for build_type in &platform.build_types {
                let command = self
                    .registry
                    .command_for(&ctx, platform.platform, build_type)
                    .map(|cmd| cmd.display_command())
                    .unwrap_or_else(|e| format!("<{}>", e));
                writeln!(f, "  build `{}`: {}", build_type.name, command)?;
            }
        }

        if plan.platforms.is_empty() {
            writeln!(f, "\nNo platforms to build.")?;
        }

        writeln!(f, "\nArtifacts: {}", output_layout(self.config))?;
        writeln!(
            f,
            "On platform failure: {}",
            if plan.continue_on_error {
                "continue"
            } else {
                "stop"
            }
        )?;

        for warning in &plan.warnings {
            writeln!(f, "warning: {}", warning)?;
        }
        Ok(())
    }
}

fn write_steps(f: &mut fmt::Formatter<'_>, steps: &[BuildStep]) -> fmt::Result {
    if steps.is_empty() {
        return writeln!(f, "    (none)");
    }

    for (idx, step) in steps.iter().enumerate() {
        let mut notes = Vec::new();
        if !step.required {
            notes.push("optional".to_string());
        }
        notes.push(format!("timeout {}s", step.timeout().as_secs()));
        if let Some(dir) = &step.working_dir {
            notes.push(format!("in {}", dir.display()));
        }
        if let Some(condition) = &step.condition {
            notes.push(format!("if {}", condition));
        }

        writeln!(
            f,
            "    {}. {}: {} [{}]",
            idx + 1,
            step.name,
            step.command,
            notes.join(", ")
        )?;
    }
    Ok(())
}

/// `base/<date>/<platform>/<build_type>/<pattern>.<ext>`
fn output_layout(config: &BuildConfig) -> String {
    let artifacts = &config.artifacts;
    let org = &artifacts.organization;

    let mut parts = vec![artifacts.base_output_dir.display().to_string()];
    if org.by_date {
        parts.push(format!("<date:{}>", org.date_format));
    }
    if org.by_platform {
        parts.push("<platform>".to_string());
    }
    if org.by_build_type {
        parts.push("<build_type>".to_string());
    }
    parts.push(format!("{}.<ext>", artifacts.naming.pattern));
    parts.join("/")
}
