//! CLI module for the corrective RAG pipeline
//!
//! Subcommands:
//! - `ask`: answer one question (default when no subcommand is given)
//! - `index`: load the corpus and report on the index

pub mod ask;
pub mod index;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::infrastructure::logging;

/// Corrective RAG - retrieval with relevance grading and web search fallback
#[derive(Parser)]
#[command(name = "crag")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Answer a question, printing each node as it runs
    Ask(ask::AskArgs),

    /// Load the configured corpus and report the index size
    Index,
}

/// Load `.env`, read configuration and install the log subscriber
pub(crate) fn bootstrap() -> anyhow::Result<AppConfig> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("Failed to load configuration")?;
    logging::init_logging(&config.logging);

    Ok(config)
}
