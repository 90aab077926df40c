//! `fdawg artifacts` command

use anyhow::Result;

use crate::cli::ArtifactsArgs;
use fdawg::ops::{self, format_size, OpsContext};
use fdawg::ArtifactFilters;

pub fn execute(ctx: &OpsContext, args: ArtifactsArgs) -> Result<()> {
    let filters = ArtifactFilters {
        date: args.date,
        platform: args.platform,
        build_type: args.build_type,
    };

    let artifacts = ops::list(ctx, &filters)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&artifacts)?);
        return Ok(());
    }

    if artifacts.is_empty() {
        eprintln!("No artifacts found");
        return Ok(());
    }

    for artifact in &artifacts {
        println!(
            "{}  {:<8} {:<10} {:<10} {:>10}  {}",
            artifact.build_time.format("%Y-%m-%d %H:%M"),
            artifact.platform.as_str(),
            artifact.build_type,
            artifact.architecture,
            format_size(artifact.size),
            artifact.file_path.display()
        );
    }
    eprintln!("{} artifact(s)", artifacts.len());

    Ok(())
}
