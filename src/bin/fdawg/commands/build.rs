//! `fdawg build` command

use anyhow::{bail, Result};

use crate::cli::BuildArgs;
use fdawg::core::BuildOutcome;
use fdawg::ops::{self, format_size, OpsContext};
use fdawg::BuildOptions;

pub fn execute(ctx: &OpsContext, args: BuildArgs) -> Result<()> {
    let continue_on_error = if args.continue_on_error {
        Some(true)
    } else if args.fail_fast {
        Some(false)
    } else {
        None
    };

    let opts = BuildOptions {
        skip_pre_build: args.skip_pre_build,
        continue_on_error,
        build_types: args.build_types,
        dry_run: args.dry_run,
    };

    if opts.dry_run {
        print!("{}", ops::plan(ctx, &args.platforms, &opts)?);
        return Ok(());
    }

    let result = ops::build(ctx, &args.platforms, &opts)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for platform in &result.platform_results {
            match &platform.error {
                None => eprintln!(
                    "    Finished {} ({} artifact(s), {:.1}s)",
                    platform.platform,
                    platform.artifacts.len(),
                    platform.duration.as_secs_f64()
                ),
                Some(error) => eprintln!("      Failed {}: {}", platform.platform, error),
            }
        }
        for artifact in &result.artifacts {
            eprintln!(
                "    Artifact {} ({})",
                artifact.file_path.display(),
                format_size(artifact.size)
            );
        }
        for warning in &result.warnings {
            eprintln!("warning: {}", warning);
        }
    }

    match result.outcome() {
        BuildOutcome::Success => Ok(()),
        BuildOutcome::PartialFailure => {
            eprintln!("warning: some platforms failed");
            Ok(())
        }
        BuildOutcome::Failure => match result.error {
            Some(error) => bail!("build failed: {}", error),
            None => bail!("build failed: no artifacts were produced"),
        },
    }
}
