//! Build pipeline configuration.
//!
//! The configuration lives in `.fdawg/build.yaml` inside the project (or a
//! caller-supplied path) and is loaded fresh on every invocation. Missing
//! sections and fields fall back to the defaults documented on each field.
//!
//! ```yaml
//! metadata:
//!   app_name_source: derived   # derived | manifest | custom
//!   version_source: manifest   # manifest | custom
//! pre_build:
//!   global:
//!     - name: Get dependencies
//!       command: flutter pub get
//! platforms:
//!   android:
//!     enabled: true
//!     build_types:
//!       - name: apk
//!         output: apk
//!         mode: release
//!         split_per_abi: true
//! artifacts:
//!   base_output_dir: build/fdawg_outputs
//!   naming:
//!     pattern: "{app_name}_{version}_{arch}"
//! execution:
//!   continue_on_error: true
//! ```

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::format::{Item, StrftimeItems};
use chrono::{Local, TimeZone};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifact::duration::parse_duration;
use crate::core::condition::{Condition, ConditionKind};
use crate::core::platform::Platform;
use crate::core::project::Project;
use crate::core::step::BuildStep;

/// Config location relative to the project root.
pub const DEFAULT_CONFIG_PATH: &str = ".fdawg/build.yaml";

/// Default artifact naming pattern.
pub const DEFAULT_NAMING_PATTERN: &str = "{app_name}_{version}_{arch}";

/// Default date bucket format (`June-6`).
pub const DEFAULT_DATE_FORMAT: &str = "%B-%-d";

/// Default artifact output directory relative to the project root.
pub const DEFAULT_OUTPUT_DIR: &str = "build/fdawg_outputs";

/// Default build event log relative to the project root.
pub const DEFAULT_LOG_FILE: &str = ".fdawg/logs/build.log";

/// Tokens accepted in the naming pattern.
pub const NAMING_TOKENS: [&str; 5] = ["app_name", "version", "arch", "platform", "build_type"];

/// Timeout for a platform toolchain invocation when none is configured.
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(60 * 60);

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Error loading, validating or saving a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid value for `{field}`: {message}")]
    Invalid { field: String, message: String },

    #[error("failed to write config file {}: {message}", path.display())]
    Write { path: PathBuf, message: String },
}

impl ConfigError {
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Root configuration of a build pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// App name and version sources
    pub metadata: MetadataConfig,

    /// Steps run before platform builds
    pub pre_build: PreBuildConfig,

    /// Per-platform build settings
    pub platforms: PlatformsConfig,

    /// Output naming and organization
    pub artifacts: ArtifactsConfig,

    /// Execution policy
    pub execution: ExecutionConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig::default_for(&Platform::ALL)
    }
}

impl BuildConfig {
    /// Conservative configuration enabling exactly the given platforms.
    pub fn default_for(platforms: &[Platform]) -> Self {
        let mut config = BuildConfig {
            metadata: MetadataConfig::default(),
            pre_build: PreBuildConfig::default_steps(),
            platforms: PlatformsConfig::default(),
            artifacts: ArtifactsConfig::default(),
            execution: ExecutionConfig::default(),
        };

        for platform in platforms {
            let block = config.platforms.get_mut(*platform);
            block.enabled = true;
            block.build_types = vec![BuildType::default_for(*platform)];
        }

        config
    }

    /// Default configuration for the platforms a project actually has.
    pub fn for_project(project: &Project) -> Self {
        BuildConfig::default_for(&project.available_platforms())
    }

    /// Parse YAML content, fill defaults and validate.
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut config: BuildConfig =
            serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Fill empty fields with their defaults.
    pub fn normalize(&mut self) {
        let artifacts = &mut self.artifacts;
        if artifacts.base_output_dir.as_os_str().is_empty() {
            artifacts.base_output_dir = PathBuf::from(DEFAULT_OUTPUT_DIR);
        }
        if artifacts.organization.date_format.trim().is_empty() {
            artifacts.organization.date_format = DEFAULT_DATE_FORMAT.to_string();
        }
        if artifacts.naming.pattern.trim().is_empty() {
            artifacts.naming.pattern = DEFAULT_NAMING_PATTERN.to_string();
        }

        let execution = &mut self.execution;
        if execution.max_parallel_jobs == 0 {
            execution.max_parallel_jobs = default_max_parallel_jobs();
        }
        if execution.log_level.trim().is_empty() {
            execution.log_level = default_log_level();
        }
        if execution.log_file.as_os_str().is_empty() {
            execution.log_file = PathBuf::from(DEFAULT_LOG_FILE);
        }
        if execution.flutter_executable.trim().is_empty() {
            execution.flutter_executable = default_flutter_executable();
        }

        for platform in Platform::ALL {
            for build_type in &mut self.platforms.get_mut(platform).build_types {
                let output = *build_type
                    .output
                    .get_or_insert_with(|| OutputKind::default_for(platform));
                if build_type.name.trim().is_empty() {
                    build_type.name = default_build_type_name(platform, output);
                }
            }
        }
    }

    /// Check cross-field constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let metadata = &self.metadata;
        if metadata.app_name_source == AppNameSource::Custom && is_blank(&metadata.custom_app_name)
        {
            return Err(ConfigError::invalid(
                "metadata.custom_app_name",
                "required when app_name_source is 'custom'",
            ));
        }
        if metadata.version_source == VersionSource::Custom && is_blank(&metadata.custom_version) {
            return Err(ConfigError::invalid(
                "metadata.custom_version",
                "required when version_source is 'custom'",
            ));
        }

        for platform in Platform::ALL {
            let block = self.platforms.get(platform);
            let mut seen = Vec::new();
            for (idx, build_type) in block.build_types.iter().enumerate() {
                let field = format!("platforms.{}.build_types[{}]", platform, idx);
                let output = build_type.output_kind(platform);
                if !output.valid_for(platform) {
                    return Err(ConfigError::invalid(
                        format!("{}.output", field),
                        format!("'{}' is not a {} output", output, platform),
                    ));
                }
                if build_type.split_per_abi && output != OutputKind::Apk {
                    return Err(ConfigError::invalid(
                        format!("{}.split_per_abi", field),
                        "only supported for android apk builds",
                    ));
                }
                if seen.contains(&build_type.name.as_str()) {
                    return Err(ConfigError::invalid(
                        format!("{}.name", field),
                        format!("duplicate build type '{}'", build_type.name),
                    ));
                }
                seen.push(build_type.name.as_str());
            }
        }

        validate_naming_pattern(&self.artifacts.naming.pattern)?;
        validate_date_format(&self.artifacts.organization.date_format)?;

        if let Some(expr) = &self.artifacts.cleanup.older_than {
            parse_duration(expr).map_err(|e| {
                ConfigError::invalid("artifacts.cleanup.older_than", e.to_string())
            })?;
        }

        if !LOG_LEVELS.contains(&self.execution.log_level.as_str()) {
            return Err(ConfigError::invalid(
                "execution.log_level",
                format!(
                    "'{}' is not one of {}",
                    self.execution.log_level,
                    LOG_LEVELS.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Enabled platforms, in canonical order.
    pub fn enabled_platforms(&self) -> Vec<Platform> {
        Platform::ALL
            .into_iter()
            .filter(|p| self.platforms.get(*p).enabled)
            .collect()
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |v| v.trim().is_empty())
}

fn validate_naming_pattern(pattern: &str) -> Result<(), ConfigError> {
    let token_re = Regex::new(r"\{([^{}]*)\}").map_err(|e| {
        ConfigError::invalid("artifacts.naming.pattern", e.to_string())
    })?;

    for caps in token_re.captures_iter(pattern) {
        let token = &caps[1];
        if !NAMING_TOKENS.contains(&token) {
            return Err(ConfigError::invalid(
                "artifacts.naming.pattern",
                format!(
                    "unknown token '{{{}}}'; expected one of {}",
                    token,
                    NAMING_TOKENS
                        .iter()
                        .map(|t| format!("{{{}}}", t))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ));
        }
    }
    Ok(())
}

fn validate_date_format(format: &str) -> Result<(), ConfigError> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(ConfigError::invalid(
            "artifacts.organization.date_format",
            format!("'{}' is not a valid strftime format", format),
        ));
    }
    if format.contains('/') || format.contains('\\') {
        return Err(ConfigError::invalid(
            "artifacts.organization.date_format",
            "must not contain path separators",
        ));
    }

    // The rendered label becomes a directory name, so check one.
    let sample = Local
        .with_ymd_and_hms(2024, 6, 6, 10, 30, 0)
        .single()
        .unwrap_or_else(Local::now);
    let mut label = String::new();
    if write!(label, "{}", sample.format(format)).is_err() {
        return Err(ConfigError::invalid(
            "artifacts.organization.date_format",
            format!("'{}' cannot be rendered for a local date", format),
        ));
    }
    let label = label.trim();
    if label.is_empty() || label == "." || label == ".." || label.contains(['/', '\\']) {
        return Err(ConfigError::invalid(
            "artifacts.organization.date_format",
            format!("'{}' renders to '{}', which is not a usable directory name", format, label),
        ));
    }
    Ok(())
}

/// Where the artifact app name comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AppNameSource {
    /// Display name resolver, then the manifest, then the custom literal
    #[default]
    Derived,
    /// `name` from pubspec.yaml
    Manifest,
    /// `metadata.custom_app_name`
    Custom,
}

impl AppNameSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppNameSource::Derived => "derived",
            AppNameSource::Manifest => "manifest",
            AppNameSource::Custom => "custom",
        }
    }
}

impl TryFrom<String> for AppNameSource {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "derived" => Ok(AppNameSource::Derived),
            "manifest" => Ok(AppNameSource::Manifest),
            "custom" => Ok(AppNameSource::Custom),
            other => Err(format!(
                "invalid app_name_source '{}'; expected one of derived, manifest, custom",
                other
            )),
        }
    }
}

impl From<AppNameSource> for String {
    fn from(value: AppNameSource) -> Self {
        value.as_str().to_string()
    }
}

/// Where the artifact version comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum VersionSource {
    /// `version` from pubspec.yaml
    #[default]
    Manifest,
    /// `metadata.custom_version`
    Custom,
}

impl VersionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionSource::Manifest => "manifest",
            VersionSource::Custom => "custom",
        }
    }
}

impl TryFrom<String> for VersionSource {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "manifest" => Ok(VersionSource::Manifest),
            "custom" => Ok(VersionSource::Custom),
            other => Err(format!(
                "invalid version_source '{}'; expected one of manifest, custom",
                other
            )),
        }
    }
}

impl From<VersionSource> for String {
    fn from(value: VersionSource) -> Self {
        value.as_str().to_string()
    }
}

/// App name and version selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataConfig {
    pub app_name_source: AppNameSource,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_app_name: Option<String>,

    pub version_source: VersionSource,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_version: Option<String>,
}

/// Ordered pre-build steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreBuildConfig {
    /// Run once before any platform
    pub global: Vec<BuildStep>,

    /// Run before the given platform's build types
    pub platform_specific: BTreeMap<Platform, Vec<BuildStep>>,
}

impl PreBuildConfig {
    /// The steps a fresh config ships with.
    fn default_steps() -> Self {
        let mut platform_specific = BTreeMap::new();
        platform_specific.insert(
            Platform::Ios,
            vec![BuildStep::new("Install CocoaPods", "pod install")
                .optional()
                .with_timeout(600)
                .with_working_dir("ios")
                .with_condition(Condition::new(ConditionKind::FileExists, "Podfile"))],
        );

        PreBuildConfig {
            global: vec![
                BuildStep::new("Clean", "flutter clean")
                    .optional()
                    .with_timeout(120),
                BuildStep::new("Get dependencies", "flutter pub get").with_timeout(300),
            ],
            platform_specific,
        }
    }

    /// Steps for a platform (empty when none are configured).
    pub fn steps_for(&self, platform: Platform) -> &[BuildStep] {
        self.platform_specific
            .get(&platform)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// One block per platform. A platform missing from the file is disabled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformsConfig {
    pub android: PlatformConfig,
    pub ios: PlatformConfig,
    pub web: PlatformConfig,
    pub macos: PlatformConfig,
    pub windows: PlatformConfig,
    pub linux: PlatformConfig,
}

impl PlatformsConfig {
    pub fn get(&self, platform: Platform) -> &PlatformConfig {
        match platform {
            Platform::Android => &self.android,
            Platform::Ios => &self.ios,
            Platform::Web => &self.web,
            Platform::Macos => &self.macos,
            Platform::Windows => &self.windows,
            Platform::Linux => &self.linux,
        }
    }

    pub fn get_mut(&mut self, platform: Platform) -> &mut PlatformConfig {
        match platform {
            Platform::Android => &mut self.android,
            Platform::Ios => &mut self.ios,
            Platform::Web => &mut self.web,
            Platform::Macos => &mut self.macos,
            Platform::Windows => &mut self.windows,
            Platform::Linux => &mut self.linux,
        }
    }
}

/// Settings for a single platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub enabled: bool,

    /// Processed in order; may be empty
    pub build_types: Vec<BuildType>,
}

/// Kind of output a build type produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Android package
    Apk,
    /// Android app bundle
    Aab,
    /// iOS installable package
    Ipa,
    /// iOS archive directory
    Xcarchive,
    /// Compressed web bundle
    Web,
    /// Desktop application
    App,
}

impl OutputKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputKind::Apk => "apk",
            OutputKind::Aab => "aab",
            OutputKind::Ipa => "ipa",
            OutputKind::Xcarchive => "xcarchive",
            OutputKind::Web => "web",
            OutputKind::App => "app",
        }
    }

    pub fn default_for(platform: Platform) -> Self {
        match platform {
            Platform::Android => OutputKind::Apk,
            Platform::Ios => OutputKind::Ipa,
            Platform::Web => OutputKind::Web,
            Platform::Macos | Platform::Windows | Platform::Linux => OutputKind::App,
        }
    }

    pub fn valid_for(&self, platform: Platform) -> bool {
        match platform {
            Platform::Android => matches!(self, OutputKind::Apk | OutputKind::Aab),
            Platform::Ios => matches!(self, OutputKind::Ipa | OutputKind::Xcarchive),
            Platform::Web => *self == OutputKind::Web,
            Platform::Macos | Platform::Windows | Platform::Linux => *self == OutputKind::App,
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Toolchain build mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Release,
    Debug,
    Profile,
}

impl BuildMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Release => "release",
            BuildMode::Debug => "debug",
            BuildMode::Profile => "profile",
        }
    }

    /// Command-line flag (`--release`).
    pub fn flag(&self) -> String {
        format!("--{}", self.as_str())
    }

    /// Capitalized directory name used by Xcode and MSBuild (`Release`).
    pub fn dir_name(&self) -> &'static str {
        match self {
            BuildMode::Release => "Release",
            BuildMode::Debug => "Debug",
            BuildMode::Profile => "Profile",
        }
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "release" => Ok(BuildMode::Release),
            "debug" => Ok(BuildMode::Debug),
            "profile" => Ok(BuildMode::Profile),
            _ => Err(format!(
                "invalid build mode '{}'; expected 'release', 'debug', or 'profile'",
                s
            )),
        }
    }
}

/// One named variant of a platform build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildType {
    /// Name, also the build-type segment of the output path
    pub name: String,

    /// Output kind (defaults per platform)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputKind>,

    pub mode: BuildMode,

    /// Produce one APK per ABI (android apk only)
    pub split_per_abi: bool,

    /// iOS export method (`app-store`, `ad-hoc`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_method: Option<String>,

    /// Sign iOS builds; `false` passes `--no-codesign`
    pub codesign: bool,

    /// Extra toolchain arguments, appended verbatim
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

impl Default for BuildType {
    fn default() -> Self {
        BuildType {
            name: String::new(),
            output: None,
            mode: BuildMode::Release,
            split_per_abi: false,
            export_method: None,
            codesign: true,
            args: Vec::new(),
        }
    }
}

impl BuildType {
    /// One release build of the platform's default output.
    pub fn default_for(platform: Platform) -> Self {
        let output = OutputKind::default_for(platform);
        BuildType {
            name: default_build_type_name(platform, output),
            output: Some(output),
            ..Default::default()
        }
    }

    pub fn output_kind(&self, platform: Platform) -> OutputKind {
        self.output.unwrap_or_else(|| OutputKind::default_for(platform))
    }
}

fn default_build_type_name(platform: Platform, output: OutputKind) -> String {
    if platform.is_desktop() {
        "release".to_string()
    } else {
        output.as_str().to_string()
    }
}

/// Output location, naming and cleanup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    /// Root of the output tree, relative to the project root
    pub base_output_dir: PathBuf,

    pub organization: OrganizationConfig,

    pub naming: NamingConfig,

    pub cleanup: CleanupConfig,
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        ArtifactsConfig {
            base_output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            organization: OrganizationConfig::default(),
            naming: NamingConfig::default(),
            cleanup: CleanupConfig::default(),
        }
    }
}

/// Which path segments the output tree uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrganizationConfig {
    pub by_date: bool,

    /// strftime format for the date bucket
    pub date_format: String,

    pub by_platform: bool,

    pub by_build_type: bool,
}

impl Default for OrganizationConfig {
    fn default() -> Self {
        OrganizationConfig {
            by_date: true,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            by_platform: true,
            by_build_type: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Tokens: {app_name} {version} {arch} {platform} {build_type}
    pub pattern: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        NamingConfig {
            pattern: DEFAULT_NAMING_PATTERN.to_string(),
        }
    }
}

/// Automatic pruning after successful builds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub auto_clean: bool,

    /// Age expression such as `7d`, `2w` or `1m`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub older_than: Option<String>,
}

/// How a run executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Accepted for compatibility; platforms always build sequentially
    pub parallel_builds: bool,

    pub max_parallel_jobs: usize,

    /// Keep building remaining platforms after one fails
    pub continue_on_error: bool,

    /// Default log filter (error, warn, info, debug, trace)
    pub log_level: String,

    /// Append build events to `log_file`
    pub save_logs: bool,

    /// Event log path, relative to the project root
    pub log_file: PathBuf,

    /// Flutter executable used for platform builds
    pub flutter_executable: String,

    /// Toolchain timeout in seconds per build type (0 = one hour)
    pub build_timeout: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            parallel_builds: false,
            max_parallel_jobs: default_max_parallel_jobs(),
            continue_on_error: true,
            log_level: default_log_level(),
            save_logs: true,
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            flutter_executable: default_flutter_executable(),
            build_timeout: 0,
        }
    }
}

impl ExecutionConfig {
    pub fn build_timeout(&self) -> Duration {
        if self.build_timeout == 0 {
            DEFAULT_BUILD_TIMEOUT
        } else {
            Duration::from_secs(self.build_timeout)
        }
    }
}

fn default_max_parallel_jobs() -> usize {
    2
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_flutter_executable() -> String {
    "flutter".to_string()
}

/// Resolve the config file path for a project.
pub fn config_file_path(project_root: &Path, config_path: Option<&Path>) -> PathBuf {
    match config_path {
        Some(path) if path.is_absolute() => path.to_path_buf(),
        Some(path) => project_root.join(path),
        None => project_root.join(DEFAULT_CONFIG_PATH),
    }
}

/// Load, normalize and validate a project's build configuration.
pub fn load_config(
    project_root: &Path,
    config_path: Option<&Path>,
) -> Result<BuildConfig, ConfigError> {
    let path = config_file_path(project_root, config_path);
    if !path.is_file() {
        return Err(ConfigError::NotFound { path });
    }

    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;

    let config = BuildConfig::parse(&contents, &path)?;
    tracing::debug!("Loaded build config from {}", path.display());
    Ok(config)
}

/// Save a build configuration, creating parent directories as needed.
pub fn save_config(
    project_root: &Path,
    config_path: Option<&Path>,
    config: &BuildConfig,
) -> Result<(), ConfigError> {
    let path = config_file_path(project_root, config_path);
    let write_err = |message: String| ConfigError::Write {
        path: path.clone(),
        message,
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
    }

    let contents = config.to_yaml().map_err(|e| write_err(e.to_string()))?;
    std::fs::write(&path, contents).map_err(|e| write_err(e.to_string()))?;

    tracing::debug!("Saved build config to {}", path.display());
    Ok(())
}

/// Fully populated default configuration (every platform enabled).
pub fn default_config() -> BuildConfig {
    BuildConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config_is_complete() {
        let config = default_config();
        assert_eq!(config.enabled_platforms(), Platform::ALL.to_vec());
        for platform in Platform::ALL {
            assert_eq!(config.platforms.get(platform).build_types.len(), 1);
            let build_type = &config.platforms.get(platform).build_types[0];
            assert_eq!(build_type.mode, BuildMode::Release);
        }
        assert!(config.artifacts.organization.by_date);
        assert!(config.artifacts.organization.by_platform);
        assert!(config.artifacts.organization.by_build_type);
        assert_eq!(config.artifacts.naming.pattern, DEFAULT_NAMING_PATTERN);
        config.validate().unwrap();
    }

    #[test]
    fn test_default_for_subset() {
        let config = BuildConfig::default_for(&[Platform::Android, Platform::Web]);
        assert_eq!(
            config.enabled_platforms(),
            vec![Platform::Android, Platform::Web]
        );
        assert!(config.platforms.ios.build_types.is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let mut config = default_config();
        config.execution.continue_on_error = false;
        config.artifacts.cleanup.older_than = Some("2w".to_string());

        save_config(tmp.path(), None, &config).unwrap();
        assert!(tmp.path().join(DEFAULT_CONFIG_PATH).exists());

        let loaded = load_config(tmp.path(), None).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_save_is_stable() {
        let config = default_config();
        let first = config.to_yaml().unwrap();
        let second = config.to_yaml().unwrap();
        assert_eq!(first, second);

        let metadata = first.find("metadata:").unwrap();
        let pre_build = first.find("pre_build:").unwrap();
        let execution = first.find("execution:").unwrap();
        assert!(metadata < pre_build && pre_build < execution);
    }

    #[test]
    fn test_load_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = load_config(tmp.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
    }

    #[test]
    fn test_load_fills_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("build.yaml");
        std::fs::write(
            &path,
            r#"
platforms:
  android:
    enabled: true
    build_types:
      - mode: debug
artifacts:
  naming:
    pattern: ""
"#,
        )
        .unwrap();

        let config = load_config(tmp.path(), Some(Path::new("build.yaml"))).unwrap();
        assert_eq!(config.enabled_platforms(), vec![Platform::Android]);

        let build_type = &config.platforms.android.build_types[0];
        assert_eq!(build_type.name, "apk");
        assert_eq!(build_type.output, Some(OutputKind::Apk));
        assert_eq!(build_type.mode, BuildMode::Debug);
        assert!(build_type.codesign);

        assert_eq!(config.artifacts.naming.pattern, DEFAULT_NAMING_PATTERN);
        assert_eq!(config.artifacts.organization.date_format, DEFAULT_DATE_FORMAT);
        assert_eq!(config.metadata.app_name_source, AppNameSource::Derived);
        assert!(config.execution.continue_on_error);
    }

    #[test]
    fn test_invalid_app_name_source_names_field() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join(".fdawg")).unwrap();
        std::fs::write(
            tmp.path().join(DEFAULT_CONFIG_PATH),
            "metadata:\n  app_name_source: pubspec\n",
        )
        .unwrap();

        let err = load_config(tmp.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("app_name_source"));
    }

    #[test]
    fn test_custom_source_requires_literal() {
        let mut config = default_config();
        config.metadata.version_source = VersionSource::Custom;
        let err = config.validate().unwrap_err();
        match err {
            ConfigError::Invalid { field, .. } => assert_eq!(field, "metadata.custom_version"),
            other => panic!("unexpected error: {other}"),
        }

        config.metadata.custom_version = Some("2.0.0".to_string());
        config.validate().unwrap();
    }

    #[test]
    fn test_output_kind_must_match_platform() {
        let mut config = default_config();
        config.platforms.android.build_types[0].output = Some(OutputKind::Ipa);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("platforms.android.build_types[0].output"));
    }

    #[test]
    fn test_duplicate_build_type_names() {
        let mut config = default_config();
        let dup = config.platforms.android.build_types[0].clone();
        config.platforms.android.build_types.push(dup);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_naming_token() {
        let mut config = default_config();
        config.artifacts.naming.pattern = "{app_name}_{flavor}".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("{flavor}"));
    }

    #[test]
    fn test_invalid_date_format() {
        let mut config = default_config();
        config.artifacts.organization.date_format = "%Y/%m".to_string();
        assert!(config.validate().is_err());

        config.artifacts.organization.date_format = "%Q".to_string();
        assert!(config.validate().is_err());

        config.artifacts.organization.date_format = "%D".to_string();
        assert!(config.validate().is_err());

        for format in [".", "..", " "] {
            config.artifacts.organization.date_format = format.to_string();
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("not a usable directory name"), "{}", format);
        }

        config.artifacts.organization.date_format = "%Y-%m-%d".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_cleanup_duration() {
        let mut config = default_config();
        config.artifacts.cleanup.older_than = Some("soon".to_string());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("artifacts.cleanup.older_than"));
    }

    #[test]
    fn test_unknown_condition_fails_at_load() {
        let yaml = r#"
pre_build:
  global:
    - name: codegen
      command: dart run build_runner build
      condition: has_file:build.yaml
"#;
        let err = BuildConfig::parse(yaml, Path::new("build.yaml")).unwrap_err();
        assert!(err.to_string().contains("unknown condition kind"));
    }

    #[test]
    fn test_pre_build_steps_for_platform() {
        let config = default_config();
        assert_eq!(config.pre_build.steps_for(Platform::Ios).len(), 1);
        assert!(config.pre_build.steps_for(Platform::Linux).is_empty());
    }

    #[test]
    fn test_config_file_path() {
        let root = Path::new("/project");
        assert_eq!(
            config_file_path(root, None),
            PathBuf::from("/project/.fdawg/build.yaml")
        );
        assert_eq!(
            config_file_path(root, Some(Path::new("ci/build.yaml"))),
            PathBuf::from("/project/ci/build.yaml")
        );
        assert_eq!(
            config_file_path(root, Some(Path::new("/etc/build.yaml"))),
            PathBuf::from("/etc/build.yaml")
        );
    }
}
