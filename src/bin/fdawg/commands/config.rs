//! `fdawg config` commands

use anyhow::Result;

use crate::cli::ConfigInitArgs;
use fdawg::ops::{self, OpsContext};

pub fn init(ctx: &OpsContext, args: ConfigInitArgs) -> Result<()> {
    let path = ops::init_config(ctx, args.force)?;
    eprintln!("     Created {}", path.display());
    Ok(())
}

pub fn show(ctx: &OpsContext) -> Result<()> {
    print!("{}", ops::show_config(ctx)?);
    Ok(())
}
