use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::ProvisionConfig;
use crate::external::{
    ArmClient, AzureCredentials, OperationPoller, ServicePrincipalCredential, TokenProvider,
};

pub mod cleanup;
pub mod plan;
pub mod run;

/// Per-request timeout for management calls
const HTTP_TIMEOUT: Duration = Duration::from_secs(120);

pub fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("cosmos-provision/", env!("CARGO_PKG_VERSION")))
        .timeout(HTTP_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

/// Authenticate and build the management client.
///
/// A token is acquired eagerly so bad credentials fail here, before any
/// resource is touched.
pub async fn connect_management(config: &ProvisionConfig, http: reqwest::Client) -> Result<ArmClient> {
    let credentials =
        AzureCredentials::from_env().context("Service principal credentials are not configured")?;
    let subscription_id = credentials.subscription_id.clone();

    let credential = Arc::new(
        ServicePrincipalCredential::new(credentials, &config.azure)
            .context("Invalid authentication settings")?,
    );
    credential
        .token()
        .await
        .context("Failed to authenticate against the management API")?;
    info!(subscription_id = %subscription_id, "Authenticated against the management API");

    let poller = OperationPoller::new(
        Duration::from_secs(config.polling.interval_seconds),
        Duration::from_secs(config.polling.timeout_seconds),
    );
    Ok(ArmClient::new(http, credential, &subscription_id, &config.azure, poller))
}
