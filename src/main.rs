mod cli;
mod config;
mod engine;
mod error;
mod model;
mod output;
mod refresh;
mod source;
#[cfg(test)]
mod testing;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use log::info;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting pipedash");
    cli.execute().await?;

    Ok(())
}
