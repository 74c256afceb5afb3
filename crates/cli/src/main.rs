//! Surveil CLI - surveil command

use anyhow::Result;
use clap::Parser;
use surveil_cli::args::{Cli, Commands};
use surveil_cli::{cmd, logging};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Watch(args) => {
            let _guard = logging::init(args.log_file.as_deref())?;
            cmd::watch::run(args).await
        }
        Commands::Defaults => cmd::defaults::run(),
    }
}
