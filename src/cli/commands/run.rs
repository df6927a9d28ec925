use anyhow::{Context, Result};
use std::sync::Arc;

use super::{build_http_client, connect_management};
use crate::cli::RunArgs;
use crate::config::ProvisionConfig;
use crate::external::CosmosDataPlane;
use crate::workflows::{ProvisioningOutcome, ProvisioningPlan, ProvisioningReport, ProvisioningWorkflow};

pub struct RunCommand {
    config: ProvisionConfig,
    args: RunArgs,
}

impl RunCommand {
    pub fn new(config: ProvisionConfig, args: RunArgs) -> Self {
        Self { config, args }
    }

    /// Apply command-line overrides and re-validate
    pub fn effective_config(&self) -> Result<ProvisionConfig> {
        let mut config = self.config.clone();

        if let Some(location) = &self.args.location {
            config.set_location(location);
        }
        if let Some(throughput) = self.args.throughput {
            config.data.throughput = throughput;
        }
        if let Some(database) = &self.args.database {
            config.data.database_id = database.clone();
        }
        if let Some(collection) = &self.args.collection {
            config.data.collection_id = collection.clone();
        }

        config.validate().context("Invalid run options")?;
        Ok(config)
    }

    pub async fn execute(&self) -> Result<ProvisioningReport> {
        let config = self.effective_config()?;
        let names = config
            .name_generator()
            .generate()
            .context("Failed to generate resource names")?;
        let plan = ProvisioningPlan::from_config(&config, names)?;

        println!("🚀 Provisioning resource group {} with account {}", plan.names.resource_group, plan.names.account);

        let http = build_http_client()?;
        let resources = connect_management(&config, http).await?;
        let data_plane = CosmosDataPlane::new();

        let workflow = ProvisioningWorkflow::new(Arc::new(resources), Arc::new(data_plane));
        let report = workflow.run(&plan).await;
        report.log_summary();

        match report.outcome() {
            ProvisioningOutcome::Succeeded => {
                println!("✅ Provisioned, populated and removed {}", plan.names.account);
            }
            ProvisioningOutcome::SucceededWithCleanupErrors => {
                println!("⚠️  Provisioning succeeded but cleanup reported errors:");
                for cleanup in &report.cleanup_errors {
                    println!("   {}: {}", cleanup.step, cleanup.message);
                }
                println!("   Remove leftovers with: cosmos-provision cleanup --resource-group {}", plan.names.resource_group);
            }
            ProvisioningOutcome::Failed => {
                if let Some(failure) = &report.failure {
                    println!("❌ {} failed: {}", failure.step, failure.message);
                }
                if report.nothing_to_clean_up {
                    println!("   Nothing was created, no cleanup necessary");
                }
            }
        }

        Ok(report)
    }
}
