//! fdawg CLI - Flutter build orchestration

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands, ConfigCommands};
use fdawg::ops::OpsContext;

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let ctx = OpsContext::new(&cli.project_dir).with_config_path(cli.config.clone());

    // --verbose wins over the configured level
    let filter = if cli.verbose {
        EnvFilter::new("fdawg=debug")
    } else {
        EnvFilter::new(format!("fdawg={}", configured_log_level(&ctx)))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build(args) => commands::build::execute(&ctx, args),
        Commands::Plan(args) => commands::plan::execute(&ctx, args),
        Commands::Artifacts(args) => commands::artifacts::execute(&ctx, args),
        Commands::Status(args) => commands::status::execute(&ctx, args),
        Commands::Clean(args) => commands::clean::execute(&ctx, args),
        Commands::Config(args) => match args.command {
            ConfigCommands::Init(args) => commands::config::init(&ctx, args),
            ConfigCommands::Show => commands::config::show(&ctx),
        },
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

/// `execution.log_level` from the project's config, if one loads.
fn configured_log_level(ctx: &OpsContext) -> String {
    fdawg::load_config(&ctx.project_root, ctx.config_path.as_deref())
        .map(|config| config.execution.log_level)
        .unwrap_or_else(|_| "info".to_string())
}
