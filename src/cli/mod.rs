//! CLI module for the answer pipeline
//!
//! - `serve`: HTTP API
//! - `ask`: answer one query and print the result
//! - `index`: rebuild and persist the vector index

pub mod ask;
pub mod index;
pub mod serve;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Answer Pipeline - classify, retrieve, generate, validate and judge
#[derive(Parser)]
#[command(name = "answer-pipeline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the HTTP API
    Serve,

    /// Answer a single query and print the PipelineResult as JSON
    Ask(ask::AskArgs),

    /// Force a rebuild of the vector index
    Index,
}

/// Load `.env` and configuration, then install logging
pub(crate) fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    logging::init_logging(&config.logging);

    Ok(config)
}
