//! docimport command-line tool
//!
//! Imports schema-less JSON documents into schema-bound collections,
//! inferring and evolving the collection schema on the way.

use anyhow::{Context, Result};
use clap::Parser;

mod cli;
mod commands;
mod config;
mod logging;

use cli::{Cli, Commands};
use config::Config;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)
        .with_context(|| format!("load configuration from {}", cli.config.display()))?;
    if let Some(store) = cli.store {
        config.store.path = store;
    }

    config.apply_logging_env();
    logging::init();

    match cli.command {
        Commands::Import(args) => commands::handle_import(&config, args),
        Commands::Infer(args) => commands::handle_infer(&config, args),
        Commands::Describe(args) => commands::handle_describe(&config, args),
    }
}
