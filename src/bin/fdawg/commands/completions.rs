//! `fdawg completions` command

use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::CommandFactory;

use crate::cli::{Cli, CompletionsArgs};

pub fn execute(args: CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    let bin = env!("CARGO_BIN_NAME");

    match &args.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            let mut out = BufWriter::new(file);
            clap_complete::generate(args.shell, &mut cmd, bin, &mut out);
            out.flush()
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::debug!("wrote {} completions to {}", args.shell, path.display());
            eprintln!("     Created {}", path.display());
        }
        None => {
            let mut out = io::stdout().lock();
            clap_complete::generate(args.shell, &mut cmd, bin, &mut out);
        }
    }
    Ok(())
}
