//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

use fdawg::Platform;

/// fdawg - Build orchestration and artifact management for Flutter projects
#[derive(Parser)]
#[command(name = "fdawg")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Flutter project directory
    #[arg(short = 'C', long, global = true, env = "FDAWG_PROJECT_DIR", default_value = ".")]
    pub project_dir: PathBuf,

    /// Build config file (relative to the project directory)
    #[arg(long, global = true, env = "FDAWG_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build one or more platforms
    Build(BuildArgs),

    /// Show what a build would do without running it
    Plan(PlanArgs),

    /// List organized build artifacts
    Artifacts(ArtifactsArgs),

    /// Summarize the artifact output tree
    Status(StatusArgs),

    /// Remove build artifacts
    Clean(CleanArgs),

    /// Manage the build configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Platforms to build (defaults to every enabled platform)
    pub platforms: Vec<Platform>,

    /// Skip global and platform pre-build steps
    #[arg(long)]
    pub skip_pre_build: bool,

    /// Keep building other platforms after one fails
    #[arg(long, conflicts_with = "fail_fast")]
    pub continue_on_error: bool,

    /// Stop at the first failing platform
    #[arg(long)]
    pub fail_fast: bool,

    /// Only build types with this name (repeatable)
    #[arg(long = "build-type", value_name = "NAME")]
    pub build_types: Vec<String>,

    /// Print the plan instead of building
    #[arg(long)]
    pub dry_run: bool,

    /// Print the build result as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Platforms to plan (defaults to every enabled platform)
    pub platforms: Vec<Platform>,

    /// Leave out pre-build steps
    #[arg(long)]
    pub skip_pre_build: bool,

    /// Only build types with this name (repeatable)
    #[arg(long = "build-type", value_name = "NAME")]
    pub build_types: Vec<String>,
}

#[derive(Args)]
pub struct ArtifactsArgs {
    /// Only artifacts for this platform
    #[arg(long)]
    pub platform: Option<Platform>,

    /// Only artifacts of this build type
    #[arg(long)]
    pub build_type: Option<String>,

    /// Only artifacts in this date bucket (e.g. June-6)
    #[arg(long)]
    pub date: Option<String>,

    /// Print as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Print as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Only remove artifacts older than this (e.g. 12h, 7d, 2w, 3m, 1y)
    #[arg(long, value_name = "AGE")]
    pub older_than: Option<String>,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Write a default build config for this project
    Init(ConfigInitArgs),

    /// Print the effective build config
    Show,
}

#[derive(Args)]
pub struct ConfigInitArgs {
    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,

    /// Write the script to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
