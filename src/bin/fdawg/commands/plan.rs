//! `fdawg plan` command

use anyhow::Result;

use crate::cli::PlanArgs;
use fdawg::ops::{self, OpsContext};
use fdawg::BuildOptions;

pub fn execute(ctx: &OpsContext, args: PlanArgs) -> Result<()> {
    let opts = BuildOptions {
        skip_pre_build: args.skip_pre_build,
        build_types: args.build_types,
        dry_run: true,
        ..Default::default()
    };

    print!("{}", ops::plan(ctx, &args.platforms, &opts)?);
    Ok(())
}
