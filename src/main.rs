use anyhow::{bail, Result};
use clap::Parser;
use tracing::info;

use cosmos_provision::cli::commands::cleanup::CleanupCommand;
use cosmos_provision::cli::commands::plan::PlanCommand;
use cosmos_provision::cli::commands::run::RunCommand;
use cosmos_provision::cli::{Cli, Commands, RunArgs};
use cosmos_provision::{init_telemetry, ProvisionConfig, ProvisioningOutcome};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_file_loaded = ProvisionConfig::load_env_file()?;
    let mut config = ProvisionConfig::load(cli.config.as_deref())?;
    if cli.json_logs {
        config.observability.json_logs = true;
    }
    init_telemetry(&config.observability)?;
    if env_file_loaded {
        info!("Loaded environment variables from .env file");
    }

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => {
            let report = tokio::runtime::Runtime::new()?.block_on(async {
                RunCommand::new(config, args).execute().await
            })?;
            if report.outcome() == ProvisioningOutcome::Failed {
                let step = report
                    .failure
                    .as_ref()
                    .map(|f| f.step.to_string())
                    .unwrap_or_default();
                bail!("Provisioning failed at step: {step}");
            }
            Ok(())
        }
        Commands::Plan { write_config } => PlanCommand::new(config, write_config).execute(),
        Commands::Cleanup { resource_group } => {
            tokio::runtime::Runtime::new()?.block_on(async {
                CleanupCommand::new(config, resource_group).execute().await
            })
        }
    }
}
