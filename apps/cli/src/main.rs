//! Letterpress CLI: multi-provider AI newsletter generation.
//!
//! Creates generation jobs, follows their progress, and manages the
//! organization's knowledge items and events.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
