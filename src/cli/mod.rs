use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "cosmos-provision")]
#[command(about = "Provision a Cosmos DB account, populate it, and tear it down again")]
#[command(long_about = "cosmos-provision creates a resource group and a database account, retrieves \
                       the account keys, creates a database and a collection, then deletes everything \
                       it created. Cleanup is always attempted, whichever step fails.")]
pub struct Cli {
    /// Configuration file (defaults to cosmos-provision.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit JSON log lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full provision, populate and teardown sequence (default)
    Run(RunArgs),
    /// Generate resource names and print the account request without calling any API
    Plan {
        /// Also write the effective configuration to this file
        #[arg(long, value_name = "PATH", help = "Write the effective configuration as TOML")]
        write_config: Option<PathBuf>,
    },
    /// Delete a resource group left behind by an interrupted run
    Cleanup {
        /// Name of the resource group to delete
        #[arg(long, help = "Resource group to delete, including everything inside it")]
        resource_group: String,
    },
}

/// Per-run overrides of the loaded configuration
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Region for the resource group and the account's write location
    #[arg(long)]
    pub location: Option<String>,
    /// Collection throughput in request units
    #[arg(long)]
    pub throughput: Option<u32>,
    /// Database id
    #[arg(long)]
    pub database: Option<String>,
    /// Collection id
    #[arg(long)]
    pub collection: Option<String>,
}
