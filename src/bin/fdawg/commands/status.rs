//! `fdawg status` command

use anyhow::Result;

use crate::cli::StatusArgs;
use fdawg::ops::{self, format_size, OpsContext};

pub fn execute(ctx: &OpsContext, args: StatusArgs) -> Result<()> {
    let status = ops::status(ctx)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Artifacts:   {}", status.total_artifacts);
    println!("Total size:  {}", format_size(status.total_size));
    match status.last_build {
        Some(time) => println!("Last build:  {}", time.format("%Y-%m-%d %H:%M")),
        None => println!("Last build:  never"),
    }

    if !status.recent_builds.is_empty() {
        println!("\nRecent builds:");
        for build in &status.recent_builds {
            println!(
                "  {:<14} {:>3} artifact(s)  {:>10}",
                build.date,
                build.count,
                format_size(build.size)
            );
        }
    }

    Ok(())
}
