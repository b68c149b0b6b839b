use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Args, Parser, Subcommand};
use steep_deploy::PROJECT_FILENAME;
use tracing::level_filters::LevelFilter;

/// The network used when none is given.
const DEFAULT_NETWORK: &str = "development";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Parser)]
#[command(name = "steep")]
#[command(
    author,
    version,
    about = "Deploy EVM contracts in order and wire their addresses together"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "STEEP_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    /// Path to the project file, or to the directory containing `Steep.toml`.
    ///
    /// Any project setting can be overridden from the environment, e.g.
    /// `STEEP_NETWORKS__DEVELOPMENT__RPC_URL=http://127.0.0.1:7545`.
    #[arg(
        short,
        long,
        global = true,
        alias = "conf",
        env = "STEEP_CONFIG",
        default_value = PROJECT_FILENAME
    )]
    pub config: PathBuf,

    /// How results are printed.
    #[arg(long, global = true, env = "STEEP_FORMAT", default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deploy the plan on a network and record the resulting addresses.
    Deploy(DeployArgs),
    /// Validate the plan for a network and show what would be deployed.
    Check(NetworkArgs),
    /// Show the recorded deployment for a network.
    Status(NetworkArgs),
}

#[derive(Debug, Clone, Args)]
pub struct NetworkArgs {
    /// The network profile from the project file.
    #[arg(short, long, env = "STEEP_NETWORK", default_value = DEFAULT_NETWORK)]
    pub network: String,
}

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    #[command(flatten)]
    pub target: NetworkArgs,

    /// The deployer account.
    ///
    /// Defaults to the network profile's `from`, then to the node's first account.
    #[arg(long, env = "STEEP_FROM")]
    pub from: Option<Address>,

    /// Deploy even if a completed record for the same plan exists.
    #[arg(long, env = "STEEP_REDEPLOY", default_value_t = false)]
    pub redeploy: bool,
}
