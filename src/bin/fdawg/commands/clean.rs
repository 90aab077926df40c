//! `fdawg clean` command

use anyhow::Result;

use crate::cli::CleanArgs;
use fdawg::ops::{self, format_size, CleanOutcome, OpsContext};

pub fn execute(ctx: &OpsContext, args: CleanArgs) -> Result<()> {
    match ops::clean(ctx, args.older_than.as_deref())? {
        CleanOutcome::All { base_dir, existed } => {
            if existed {
                eprintln!("     Removed {}", base_dir.display());
            } else {
                eprintln!("     Nothing to clean in {}", base_dir.display());
            }
        }
        CleanOutcome::OlderThan(report) => {
            eprintln!(
                "     Removed {} artifact(s) built before {} ({})",
                report.removed,
                report.cutoff.format("%Y-%m-%d %H:%M"),
                format_size(report.freed_bytes)
            );
        }
    }

    Ok(())
}
