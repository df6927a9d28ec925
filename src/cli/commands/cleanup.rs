use anyhow::{Context, Result};
use tracing::{info, Instrument};

use super::{build_http_client, connect_management};
use crate::config::ProvisionConfig;
use crate::external::{ManagementError, ResourceManager};
use crate::naming::validate_resource_group_name;
use crate::telemetry::{create_provisioning_span, generate_correlation_id};
use crate::types::ResourceHandle;

pub struct CleanupCommand {
    config: ProvisionConfig,
    resource_group: String,
}

impl CleanupCommand {
    pub fn new(config: ProvisionConfig, resource_group: String) -> Self {
        Self {
            config,
            resource_group,
        }
    }

    pub async fn execute(&self) -> Result<()> {
        validate_resource_group_name(&self.resource_group)?;

        let correlation_id = generate_correlation_id();
        let span = create_provisioning_span("cleanup", &self.resource_group, None, &correlation_id);

        async {
            let http = build_http_client()?;
            let client = connect_management(&self.config, http).await?;
            let handle = client.resource_group_handle(&self.resource_group);

            println!("🧹 Deleting resource group {}", self.resource_group);
            if delete_group(&client, &handle).await? {
                println!("✅ Resource group {} deleted", self.resource_group);
            } else {
                println!("✅ Resource group {} does not exist, no cleanup necessary", self.resource_group);
            }
            Ok::<(), anyhow::Error>(())
        }
        .instrument(span)
        .await
    }
}

/// Returns false when the group was already gone
pub async fn delete_group(resources: &dyn ResourceManager, handle: &ResourceHandle) -> Result<bool> {
    match resources.delete_resource_group(handle).await {
        Ok(()) => {
            info!(resource_group = %handle.name, "Resource group deleted");
            Ok(true)
        }
        Err(ManagementError::NotFound { .. }) => {
            info!(resource_group = %handle.name, "Resource group not found, nothing to delete");
            Ok(false)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to delete resource group {}", handle.name)),
    }
}
