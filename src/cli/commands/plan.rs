use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::config::ProvisionConfig;
use crate::external::AccountCreateRequest;
use crate::workflows::ProvisioningPlan;

/// Dry run: resolve names and the account request without calling any API
pub struct PlanCommand {
    config: ProvisionConfig,
    write_config: Option<PathBuf>,
}

impl PlanCommand {
    pub fn new(config: ProvisionConfig, write_config: Option<PathBuf>) -> Self {
        Self {
            config,
            write_config,
        }
    }

    pub fn render(&self) -> Result<(ProvisioningPlan, String)> {
        let names = self
            .config
            .name_generator()
            .generate()
            .context("Failed to generate resource names")?;
        let plan = ProvisioningPlan::from_config(&self.config, names)?;
        let request = serde_json::to_string_pretty(&AccountCreateRequest::from_spec(&plan.account))?;
        Ok((plan, request))
    }

    pub fn execute(&self) -> Result<()> {
        let (plan, request) = self.render()?;

        println!("📋 PROVISIONING PLAN");
        println!("====================");
        println!("   Resource group: {} ({})", plan.names.resource_group, plan.location);
        println!("   Account:        {}", plan.names.account);
        println!("   Database:       {}", plan.database.id);
        println!(
            "   Collection:     {} ({} RU, partition key {})",
            plan.collection.id, plan.collection.throughput, plan.collection.partition_key_path
        );
        println!();
        println!("Account request body:");
        println!("{request}");

        if let Some(path) = &self.write_config {
            self.config
                .save_to_file(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!();
            println!("💾 Configuration written to {}", path.display());
        }
        Ok(())
    }
}
