//! steep is a CLI tool to deploy EVM contracts in order and wire their addresses together.

mod cli;
mod commands;
mod project;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Command};
use project::Project;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    let project = Project::load(&cli.config)?;

    tracing::debug!(
        project = %project.file.display(),
        artifacts = %project.artifacts_dir().display(),
        records = %project.records_dir().display(),
        "Project loaded"
    );

    match cli.command {
        Command::Deploy(args) => commands::deploy(&project, args, cli.format).await,
        Command::Check(args) => commands::check(&project, args, cli.format),
        Command::Status(args) => commands::status(&project, args, cli.format),
    }
}
