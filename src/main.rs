use clap::Parser;
use crag_pipeline::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Ask(args)) => cli::ask::run(args).await,
        Some(Command::Index) => cli::index::run().await,
        None => cli::ask::run(cli::ask::AskArgs::default()).await,
    }
}
