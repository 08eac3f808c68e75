//! leadflow CLI: classify a batch of contact records and hand them downstream.
//!
//! Reads a CSV of leads, skips ones already stored, classifies the rest into
//! personas, saves them, and posts each one to a webhook.

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
