mod classify;
mod cli;
mod commands;
mod marker;
mod mcp;
mod pdf;
mod preprocess;
mod split;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::io;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Some(Commands::Mcp) => {
            mcp::run_server().await?;
        }
        Some(Commands::Scan { path, marker }) => {
            commands::scan::run(&path, marker.classifier_config())?;
        }
        None => {
            let summary = commands::split::run(&cli.split)?;
            println!(
                "Split {} given files into {} files",
                summary.inputs, summary.outputs
            );
            if summary.failed > 0 {
                eprintln!("{} file(s) could not be split", summary.failed);
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
