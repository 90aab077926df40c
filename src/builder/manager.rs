//! Build orchestration.
//!
//! A run moves through pre-build, one build per platform and artifact
//! organization. Platforms are built sequentially in the requested order;
//! whether a failing platform stops the run is decided by
//! `continue_on_error`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::artifact::manager::ArtifactManager;
use crate::artifact::naming::ArtifactIdentity;
use crate::builder::events::{millis, BuildEvent, EventLog};
use crate::builder::executor::{StepExecutor, StepsReport};
use crate::builder::plan::{render_build_plan, BuildPlan, PlatformPlan};
use crate::builder::platform::{DispatchContext, PlatformRegistry};
use crate::core::artifact::{BuildArtifact, BuildResult, PlatformBuildResult};
use crate::core::config::BuildConfig;
use crate::core::errors::BuildError;
use crate::core::platform::Platform;
use crate::core::project::{AndroidLabelResolver, DisplayNameResolver, Project};

/// Per-run switches layered over the configuration.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Skip global and platform pre-build steps
    pub skip_pre_build: bool,
    /// Overrides `execution.continue_on_error` when set
    pub continue_on_error: Option<bool>,
    /// Only build types with these names (empty = all)
    pub build_types: Vec<String>,
    /// Render the plan instead of running it
    pub dry_run: bool,
}

/// Runs builds for one project with a fixed configuration.
pub struct BuildManager {
    project: Project,
    config: BuildConfig,
    registry: PlatformRegistry,
    executor: StepExecutor,
    artifacts: ArtifactManager,
    resolver: Box<dyn DisplayNameResolver>,
}

impl BuildManager {
    /// Create a manager for a Flutter project.
    pub fn new(project_root: impl AsRef<Path>, config: BuildConfig) -> Result<Self, BuildError> {
        let project = Project::open(project_root)?;
        let executor = StepExecutor::new(project.root());
        let artifacts = ArtifactManager::new(project.root(), &config.artifacts);

        Ok(BuildManager {
            project,
            config,
            registry: PlatformRegistry::new(),
            executor,
            artifacts,
            resolver: Box::new(AndroidLabelResolver),
        })
    }

    /// Replace the platform registry.
    pub fn with_registry(mut self, registry: PlatformRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the resolver used for the `derived` app name source.
    pub fn with_display_name_resolver(mut self, resolver: Box<dyn DisplayNameResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    /// Set a variable for every step and toolchain invocation.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.executor = self.executor.with_env(key, value);
        self
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    pub fn config(&self) -> &BuildConfig {
        &self.config
    }

    pub fn artifact_manager(&self) -> &ArtifactManager {
        &self.artifacts
    }

    /// The plan for a request, as text. Touches neither disk nor processes.
    pub fn show_build_plan(&self, platforms: &[Platform], options: &BuildOptions) -> String {
        render_build_plan(
            &self.config,
            self.project.root(),
            &self.registry,
            platforms,
            options,
        )
    }

    /// Run a build.
    ///
    /// Failures inside the run (steps, platforms, organization) are reported
    /// in the returned [`BuildResult`]; `Err` is reserved for problems that
    /// prevent a run from starting.
    pub fn execute_build(
        &self,
        platforms: &[Platform],
        options: &BuildOptions,
    ) -> Result<BuildResult, BuildError> {
        if options.dry_run {
            for line in self.show_build_plan(platforms, options).lines() {
                tracing::info!("{}", line);
            }
            return Ok(BuildResult::empty());
        }

        let start = Instant::now();
        let plan = BuildPlan::resolve(&self.config, platforms, options);
        let mut log = self.open_event_log();
        let mut result = BuildResult::empty();

        log.emit(BuildEvent::BuildStarted {
            platforms: plan.platform_ids(),
        });
        for warning in &plan.warnings {
            record_warning(&mut result.warnings, &mut log, warning.clone());
        }
        if self.config.execution.parallel_builds {
            tracing::info!(
                "parallel_builds is set (max {} jobs); platforms still build one at a time",
                self.config.execution.max_parallel_jobs
            );
        }

        match self.executor.run_steps("global", &plan.pre_build, &mut log) {
            Ok(report) => record_step_warnings(&mut result.warnings, &mut log, "global", report),
            Err(err) => {
                result.error = Some(format!("pre-build failed: {}", err));
                return Ok(self.finish(result, start, &mut log));
            }
        }

        let identity =
            ArtifactIdentity::resolve(&self.project, &self.config.metadata, self.resolver.as_ref());
        let ctx = DispatchContext {
            project_root: self.project.root(),
            flutter: &self.config.execution.flutter_executable,
            timeout: self.config.execution.build_timeout(),
        };

        let mut claimed = HashSet::new();
        let mut aborted = false;
        for platform_plan in &plan.platforms {
            let platform_result = self.build_platform(
                platform_plan,
                &ctx,
                &identity,
                &mut claimed,
                &mut result.warnings,
                &mut log,
            );
            let failed = !platform_result.success;

            result.artifacts.extend(platform_result.artifacts.iter().cloned());
            result.platform_results.push(platform_result);

            if failed && !plan.continue_on_error {
                result.error = Some(format!(
                    "{} build failed and continue_on_error is off; stopping",
                    platform_plan.platform
                ));
                aborted = true;
                break;
            }
        }

        result.success = !aborted && !result.artifacts.is_empty();
        if result.success {
            self.auto_clean(&mut result.warnings, &mut log);
        }

        Ok(self.finish(result, start, &mut log))
    }

    fn build_platform(
        &self,
        plan: &PlatformPlan,
        ctx: &DispatchContext<'_>,
        identity: &ArtifactIdentity,
        claimed: &mut HashSet<PathBuf>,
        warnings: &mut Vec<String>,
        log: &mut EventLog,
    ) -> PlatformBuildResult {
        let start = Instant::now();
        let mut result = PlatformBuildResult::new(plan.platform);

        tracing::info!("Building {}", plan.platform);
        let outcome =
            self.run_platform(plan, ctx, identity, claimed, &mut result.artifacts, warnings, log);

        result.duration = start.elapsed();
        match outcome {
            Ok(()) => {
                result.success = true;
                tracing::info!(
                    "{} finished with {} artifact(s) in {:.1}s",
                    plan.platform,
                    result.artifacts.len(),
                    result.duration.as_secs_f64()
                );
            }
            Err(err) => {
                tracing::error!("{} failed: {}", plan.platform, err);
                result.error = Some(err.to_string());
            }
        }

        log.emit(BuildEvent::PlatformFinished {
            platform: plan.platform,
            success: result.success,
            artifacts: result.artifacts.len(),
            duration_ms: millis(result.duration),
            error: result.error.clone(),
        });
        result
    }

    /// Availability, platform steps, then every build type. The first
    /// failure ends the platform; artifacts organized so far are kept.
    fn run_platform(
        &self,
        plan: &PlatformPlan,
        ctx: &DispatchContext<'_>,
        identity: &ArtifactIdentity,
        claimed: &mut HashSet<PathBuf>,
        artifacts: &mut Vec<BuildArtifact>,
        warnings: &mut Vec<String>,
        log: &mut EventLog,
    ) -> Result<(), BuildError> {
        let platform = plan.platform;
        if !self.project.is_platform_available(platform) {
            return Err(BuildError::PlatformUnavailable {
                platform,
                dir: self.project.platform_dir(platform),
            });
        }

        let report = self.executor.run_steps(platform.as_str(), &plan.steps, log)?;
        record_step_warnings(warnings, log, platform.as_str(), report);

        for build_type in &plan.build_types {
            let raw = self
                .registry
                .dispatch(&self.executor, ctx, platform, build_type)?;

            for artifact in raw {
                match self.artifacts.organize(artifact, identity, claimed) {
                    Ok(organized) => {
                        log.emit(BuildEvent::ArtifactOrganized {
                            platform,
                            build_type: organized.build_type.clone(),
                            path: organized.file_path.clone(),
                            size: organized.size,
                        });
                        artifacts.push(organized);
                    }
                    Err(err) => record_warning(warnings, log, err.to_string()),
                }
            }
        }

        Ok(())
    }

    fn auto_clean(&self, warnings: &mut Vec<String>, log: &mut EventLog) {
        let cleanup = &self.config.artifacts.cleanup;
        let Some(expr) = cleanup.older_than.as_deref().filter(|_| cleanup.auto_clean) else {
            return;
        };

        match self.artifacts.clean_older_than(expr) {
            Ok(report) if report.removed > 0 => tracing::info!(
                "Auto-clean removed {} artifact(s) older than {}",
                report.removed,
                expr
            ),
            Ok(_) => {}
            Err(err) => record_warning(warnings, log, format!("auto-clean failed: {}", err)),
        }
    }

    fn open_event_log(&self) -> EventLog {
        let execution = &self.config.execution;
        if !execution.save_logs {
            return EventLog::disabled();
        }

        let path = self.project.root().join(&execution.log_file);
        match EventLog::open(&path) {
            Ok(log) => log,
            Err(e) => {
                tracing::warn!("Build log disabled: {:#}", e);
                EventLog::disabled()
            }
        }
    }

    fn finish(&self, mut result: BuildResult, start: Instant, log: &mut EventLog) -> BuildResult {
        result.duration = start.elapsed();

        log.emit(BuildEvent::BuildFinished {
            success: result.success,
            duration_ms: millis(result.duration),
            artifacts: result.artifacts.len(),
            error: result.error.clone(),
        });

        if result.success {
            tracing::info!(
                "Build finished: {} artifact(s) in {:.1}s",
                result.artifacts.len(),
                result.duration.as_secs_f64()
            );
        } else {
            tracing::warn!(
                "Build failed after {:.1}s{}",
                result.duration.as_secs_f64(),
                result
                    .error
                    .as_deref()
                    .map(|e| format!(": {}", e))
                    .unwrap_or_default()
            );
        }
        result
    }
}

fn record_warning(warnings: &mut Vec<String>, log: &mut EventLog, message: String) {
    tracing::warn!("{}", message);
    log.emit(BuildEvent::warning(message.clone()));
    warnings.push(message);
}

fn record_step_warnings(
    warnings: &mut Vec<String>,
    log: &mut EventLog,
    scope: &str,
    report: StepsReport,
) {
    for warning in report.warnings {
        let message = format!("optional {} step `{}` failed: {}", scope, warning.step, warning.message);
        log.emit(BuildEvent::warning(message.clone()));
        warnings.push(message);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::artifact::manager::ArtifactFilters;
    use crate::builder::platform::PlatformBuilder;
    use crate::core::condition::{Condition, ConditionKind};
    use crate::core::config::{BuildType, PreBuildConfig};
    use crate::core::project::NoDisplayName;
    use crate::core::step::BuildStep;
    use crate::test_support::{ProjectFixture, TestProject};
    use crate::util::process::ProcessBuilder;
    use std::fs;

    /// A platform whose toolchain is a shell snippet run in the project root.
    struct ScriptedBuilder {
        platform: Platform,
        script: &'static str,
        output: &'static str,
    }

    impl PlatformBuilder for ScriptedBuilder {
        fn platform(&self) -> Platform {
            self.platform
        }

        fn build_command(&self, ctx: &DispatchContext<'_>, _: &BuildType) -> ProcessBuilder {
            ProcessBuilder::shell(self.script).cwd(ctx.project_root)
        }

        fn discover(
            &self,
            ctx: &DispatchContext<'_>,
            build_type: &BuildType,
        ) -> Result<Vec<BuildArtifact>, BuildError> {
            let path = ctx.project_root.join(self.output);
            if !path.exists() {
                return Err(BuildError::Discovery {
                    platform: self.platform,
                    build_type: build_type.name.clone(),
                    message: format!("expected {}", path.display()),
                });
            }
            Ok(vec![BuildArtifact::raw(self.platform, "arm64", path)])
        }
    }

    /// Android toolchain that splits per ABI, like `--split-per-abi`.
    struct SplitApkBuilder;

    impl PlatformBuilder for SplitApkBuilder {
        fn platform(&self) -> Platform {
            Platform::Android
        }

        fn build_command(&self, ctx: &DispatchContext<'_>, _: &BuildType) -> ProcessBuilder {
            ProcessBuilder::shell(
                "mkdir -p out && for abi in armeabi-v7a arm64-v8a x86_64; do echo $abi > out/app-$abi-release.apk; done",
            )
            .cwd(ctx.project_root)
        }

        fn discover(
            &self,
            ctx: &DispatchContext<'_>,
            _: &BuildType,
        ) -> Result<Vec<BuildArtifact>, BuildError> {
            Ok([("armeabi-v7a", "armv7"), ("arm64-v8a", "arm64"), ("x86_64", "x86_64")]
                .iter()
                .map(|(abi, arch)| {
                    let path = ctx.project_root.join(format!("out/app-{}-release.apk", abi));
                    BuildArtifact::raw(Platform::Android, *arch, path)
                })
                .collect())
        }
    }

    fn failing_android() -> ScriptedBuilder {
        ScriptedBuilder {
            platform: Platform::Android,
            script: "touch android-ran && exit 1",
            output: "out/app-release.apk",
        }
    }

    fn working_android() -> ScriptedBuilder {
        ScriptedBuilder {
            platform: Platform::Android,
            script: "mkdir -p out && echo apk > out/app-release.apk",
            output: "out/app-release.apk",
        }
    }

    fn working_web() -> ScriptedBuilder {
        ScriptedBuilder {
            platform: Platform::Web,
            script: "touch web-ran && mkdir -p out && echo web > out/web-release.tar.gz",
            output: "out/web-release.tar.gz",
        }
    }

    fn registry(builders: Vec<ScriptedBuilder>) -> PlatformRegistry {
        let mut registry = PlatformRegistry::empty();
        for builder in builders {
            registry.register(Box::new(builder));
        }
        registry
    }

    fn project() -> ProjectFixture {
        TestProject::new()
            .name("shop")
            .version("1.0.0")
            .platforms(&[Platform::Android, Platform::Web])
            .build()
    }

    /// Android + web enabled, no pre-build steps.
    fn config() -> BuildConfig {
        let mut config = BuildConfig::default_for(&[Platform::Android, Platform::Web]);
        config.pre_build = PreBuildConfig::default();
        config
    }

    fn manager(fixture: &ProjectFixture, config: BuildConfig, builders: Vec<ScriptedBuilder>) -> BuildManager {
        BuildManager::new(fixture.path(), config)
            .unwrap()
            .with_registry(registry(builders))
            .with_display_name_resolver(Box::new(NoDisplayName))
    }

    #[test]
    fn test_new_requires_flutter_project() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = BuildManager::new(tmp.path(), config()).err().unwrap();
        assert!(matches!(err, BuildError::InvalidProject { .. }));
    }

    #[test]
    fn test_successful_build_organizes_artifacts() {
        let fixture = project();
        let mgr = manager(&fixture, config(), vec![working_android(), working_web()]);

        let result = mgr.execute_build(&[], &BuildOptions::default()).unwrap();

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.artifacts.len(), 2);
        let apk = &result.artifacts[0];
        assert_eq!(apk.file_name, "shop_1.0.0_arm64.apk");
        assert_eq!(apk.build_type, "apk");
        assert!(apk.file_path.is_file());
        assert!(apk
            .file_path
            .starts_with(mgr.artifact_manager().base_dir()));
        assert!(!fixture.path().join("out/app-release.apk").exists());
    }

    #[test]
    fn test_colliding_artifact_names_are_not_overwritten() {
        let fixture = project();
        let mut config = config();
        config.artifacts.naming.pattern = "{app_name}_{version}".to_string();
        let mut registry = PlatformRegistry::empty();
        registry.register(Box::new(SplitApkBuilder));
        let mgr = BuildManager::new(fixture.path(), config)
            .unwrap()
            .with_registry(registry)
            .with_display_name_resolver(Box::new(NoDisplayName));

        let result = mgr
            .execute_build(&[Platform::Android], &BuildOptions::default())
            .unwrap();

        assert_eq!(result.artifacts.len(), 1);
        assert_eq!(
            result
                .warnings
                .iter()
                .filter(|w| w.contains("already written"))
                .count(),
            2
        );
        let on_disk = mgr
            .artifact_manager()
            .list_artifacts(&ArtifactFilters::default())
            .unwrap();
        assert_eq!(on_disk.len(), result.artifacts.len());
        assert_eq!(fs::read_to_string(&result.artifacts[0].file_path).unwrap().trim(), "armeabi-v7a");
    }

    #[test]
    fn test_continue_on_error_keeps_going() {
        let fixture = project();
        let mut config = config();
        config.execution.continue_on_error = true;
        let mgr = manager(&fixture, config, vec![failing_android(), working_web()]);

        let result = mgr
            .execute_build(&[Platform::Android, Platform::Web], &BuildOptions::default())
            .unwrap();

        assert!(result.success);
        assert!(!result.platform(Platform::Android).unwrap().success);
        assert!(result.platform(Platform::Web).unwrap().success);
        assert_eq!(result.artifacts.len(), 1);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_stop_on_first_platform_failure() {
        let fixture = project();
        let mut config = config();
        config.execution.continue_on_error = false;
        let mgr = manager(&fixture, config, vec![failing_android(), working_web()]);

        let result = mgr
            .execute_build(&[Platform::Android, Platform::Web], &BuildOptions::default())
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.platform_results.len(), 1);
        assert!(fixture.path().join("android-ran").exists());
        assert!(!fixture.path().join("web-ran").exists());
        assert!(result.error.unwrap().contains("android"));
    }

    #[test]
    fn test_option_overrides_continue_on_error() {
        let fixture = project();
        let mgr = manager(&fixture, config(), vec![failing_android(), working_web()]);
        let options = BuildOptions {
            continue_on_error: Some(false),
            ..Default::default()
        };

        let result = mgr
            .execute_build(&[Platform::Android, Platform::Web], &options)
            .unwrap();
        assert!(!fixture.path().join("web-ran").exists());
        assert!(!result.success);
    }

    #[test]
    fn test_required_global_step_aborts_before_platforms() {
        let fixture = project();
        let mut config = config();
        config.pre_build.global = vec![
            BuildStep::new("broken", "exit 3"),
            BuildStep::new("after", "touch after-ran"),
        ];
        let mgr = manager(&fixture, config, vec![working_android(), working_web()]);

        let result = mgr.execute_build(&[], &BuildOptions::default()).unwrap();

        assert!(!result.success);
        assert!(result.platform_results.is_empty());
        assert!(result.error.unwrap().contains("broken"));
        assert!(!fixture.path().join("after-ran").exists());
        assert!(!fixture.path().join("web-ran").exists());
    }

    #[test]
    fn test_optional_step_failure_is_a_warning() {
        let fixture = project();
        let mut config = config();
        config.pre_build.global = vec![
            BuildStep::new("flaky", "exit 1").optional(),
            BuildStep::new("after", "touch after-ran"),
        ];
        let mgr = manager(&fixture, config, vec![working_android(), working_web()]);

        let result = mgr.execute_build(&[Platform::Web], &BuildOptions::default()).unwrap();

        assert!(result.success);
        assert!(fixture.path().join("after-ran").exists());
        assert!(result.warnings.iter().any(|w| w.contains("flaky")));
    }

    #[test]
    fn test_platform_step_condition_skips_without_spawning() {
        let fixture = project();
        let mut config = config();
        config.pre_build.platform_specific.insert(
            Platform::Web,
            vec![BuildStep::new("gated", "touch gated-ran")
                .with_condition(Condition::new(ConditionKind::FileExists, "missing.txt"))],
        );
        let mgr = manager(&fixture, config, vec![working_web()]);

        let result = mgr.execute_build(&[Platform::Web], &BuildOptions::default()).unwrap();

        assert!(result.success);
        assert!(!fixture.path().join("gated-ran").exists());
    }

    #[test]
    fn test_unavailable_platform_fails_that_platform() {
        let fixture = TestProject::new().name("shop").platforms(&[Platform::Web]).build();
        let mgr = manager(&fixture, config(), vec![working_android(), working_web()]);

        let result = mgr.execute_build(&[], &BuildOptions::default()).unwrap();

        let android = result.platform(Platform::Android).unwrap();
        assert!(!android.success);
        assert!(android.error.as_deref().unwrap().contains("not available"));
        assert!(result.success);
    }

    #[test]
    fn test_disabled_platform_is_skipped_with_warning() {
        let fixture = project();
        let mut config = config();
        config.platforms.android.enabled = false;
        let mgr = manager(&fixture, config, vec![failing_android(), working_web()]);

        let result = mgr
            .execute_build(&[Platform::Android, Platform::Web], &BuildOptions::default())
            .unwrap();

        assert!(result.platform(Platform::Android).is_none());
        assert!(!fixture.path().join("android-ran").exists());
        assert!(result.warnings.iter().any(|w| w.contains("disabled")));
    }

    #[test]
    fn test_no_artifacts_is_not_success() {
        let fixture = project();
        let mut config = config();
        config.platforms.web.build_types.clear();
        let mgr = manager(&fixture, config, vec![working_web()]);

        let result = mgr.execute_build(&[Platform::Web], &BuildOptions::default()).unwrap();

        assert!(result.platform(Platform::Web).unwrap().success);
        assert!(!result.success);
    }

    #[test]
    fn test_dry_run_spawns_and_writes_nothing() {
        let fixture = project();
        let mut config = config();
        config.pre_build.global = vec![BuildStep::new("marker", "touch step-ran")];
        let mgr = manager(&fixture, config, vec![working_android(), working_web()]);
        let options = BuildOptions {
            dry_run: true,
            ..Default::default()
        };

        let result = mgr.execute_build(&[], &options).unwrap();

        assert!(result.platform_results.is_empty());
        assert!(!fixture.path().join("step-ran").exists());
        assert!(!fixture.path().join("web-ran").exists());
        assert!(!fixture.path().join(".fdawg").exists());
        assert!(!mgr.artifact_manager().base_dir().exists());
    }

    #[test]
    fn test_event_log_written() {
        let fixture = project();
        let mgr = manager(&fixture, config(), vec![working_web()]);

        mgr.execute_build(&[Platform::Web], &BuildOptions::default()).unwrap();

        let log = fs::read_to_string(fixture.path().join(".fdawg/logs/build.log")).unwrap();
        let events: Vec<String> = log
            .lines()
            .map(|line| {
                let value: serde_json::Value = serde_json::from_str(line).unwrap();
                value["event"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(events.first().map(String::as_str), Some("build-started"));
        assert!(events.contains(&"artifact-organized".to_string()));
        assert!(events.contains(&"platform-finished".to_string()));
        assert_eq!(events.last().map(String::as_str), Some("build-finished"));
    }

    #[test]
    fn test_build_type_filter() {
        let fixture = project();
        let mut config = config();
        config.platforms.android.build_types.push(BuildType {
            name: "bundle".to_string(),
            output: Some(crate::core::config::OutputKind::Aab),
            ..Default::default()
        });
        let mgr = manager(&fixture, config, vec![working_android()]);
        let options = BuildOptions {
            build_types: vec!["apk".to_string()],
            ..Default::default()
        };

        let result = mgr.execute_build(&[Platform::Android], &options).unwrap();
        assert_eq!(result.artifacts.len(), 1);
        assert_eq!(result.artifacts[0].build_type, "apk");
    }
}
