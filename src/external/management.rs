//! Resource-management abstractions
//!
//! `ResourceManager` is the capability set the provisioning workflow needs
//! from the control plane. `ArmClient` implements it over the Resource
//! Manager REST API and waits on every long-running operation before
//! returning.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_LENGTH};
use reqwest::{Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

use super::auth::TokenProvider;
use super::lro::{OperationPoller, PollStatus};
use crate::config::AzureConfig;
use crate::types::{AccountKeys, AccountSpec, DatabaseAccount, ResourceHandle, ResourceKind};

const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";

/// Terminal failure states reported by both operation and provisioning polls
const FAILED_STATES: &[&str] = &["Failed", "Canceled", "Cancelled"];

/// Map a reported operation or provisioning state onto a poll step.
/// An absent state means the resource has not settled yet.
fn settle(state: Option<&str>, describe_failure: impl FnOnce() -> String) -> Result<PollStatus<()>, ManagementError> {
    match state {
        Some("Succeeded") => Ok(PollStatus::Done(())),
        Some(state) if FAILED_STATES.contains(&state) => Err(ManagementError::OperationFailed {
            status: state.to_string(),
            message: describe_failure(),
        }),
        _ => Ok(PollStatus::Pending),
    }
}

#[derive(Debug, Error)]
pub enum ManagementError {
    #[error("Authentication failed: {message}")]
    Authentication { message: String },
    #[error("Resource not found: {resource}")]
    NotFound { resource: String },
    #[error("Conflict on {resource}: {message}")]
    Conflict { resource: String, message: String },
    #[error("Management API returned {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },
    #[error("Long-running operation ended with status {status}: {message}")]
    OperationFailed { status: String, message: String },
    #[error("Operation '{operation}' did not complete within {timeout_secs}s")]
    Timeout { operation: String, timeout_secs: u64 },
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Invalid response from management API: {message}")]
    InvalidResponse { message: String },
}

impl ManagementError {
    /// Deletes treat not-found as "already gone"
    pub fn is_not_found(&self) -> bool {
        matches!(self, ManagementError::NotFound { .. })
    }
}

/// Trait for control-plane operations
///
/// Every method returns only after the underlying operation has completed,
/// so callers observe create and delete calls as blocking request/response.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ResourceManager: Send + Sync {
    /// Create or update a resource group in `location`
    async fn create_resource_group(
        &self,
        name: &str,
        location: &str,
    ) -> Result<ResourceHandle, ManagementError>;

    /// Create or update a database account scoped under `resource_group`
    async fn create_database_account(
        &self,
        resource_group: &ResourceHandle,
        spec: &AccountSpec,
    ) -> Result<DatabaseAccount, ManagementError>;

    /// Retrieve the account's master keys
    async fn list_keys(&self, account: &ResourceHandle) -> Result<AccountKeys, ManagementError>;

    async fn delete_database_account(&self, account: &ResourceHandle) -> Result<(), ManagementError>;

    /// Delete a resource group and everything inside it
    async fn delete_resource_group(
        &self,
        resource_group: &ResourceHandle,
    ) -> Result<(), ManagementError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConsistencyPolicyBody {
    default_consistency_level: &'static str,
    max_staleness_prefix: u64,
    max_interval_in_seconds: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LocationBody {
    location_name: String,
    failover_priority: u32,
    is_zone_redundant: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IpRuleBody {
    ip_address_or_range: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AccountPropertiesBody {
    database_account_offer_type: &'static str,
    consistency_policy: ConsistencyPolicyBody,
    locations: Vec<LocationBody>,
    ip_rules: Vec<IpRuleBody>,
    is_virtual_network_filter_enabled: bool,
    enable_automatic_failover: bool,
    enable_multiple_write_locations: bool,
}

/// Request body for create-or-update database account
#[derive(Debug, Serialize)]
pub struct AccountCreateRequest {
    location: String,
    kind: String,
    properties: AccountPropertiesBody,
}

impl AccountCreateRequest {
    pub fn from_spec(spec: &AccountSpec) -> Self {
        Self {
            location: spec.location.clone(),
            kind: spec.kind.clone(),
            properties: AccountPropertiesBody {
                database_account_offer_type: "Standard",
                consistency_policy: ConsistencyPolicyBody {
                    default_consistency_level: spec.consistency.level().as_str(),
                    max_staleness_prefix: spec.consistency.max_staleness_prefix(),
                    max_interval_in_seconds: spec.consistency.max_interval_in_seconds(),
                },
                locations: spec
                    .locations
                    .iter()
                    .map(|l| LocationBody {
                        location_name: l.name.clone(),
                        failover_priority: l.failover_priority,
                        is_zone_redundant: false,
                    })
                    .collect(),
                ip_rules: spec
                    .ip_rules
                    .iter()
                    .map(|r| IpRuleBody {
                        ip_address_or_range: r.clone(),
                    })
                    .collect(),
                is_virtual_network_filter_enabled: spec.virtual_network_filter_enabled,
                enable_automatic_failover: spec.automatic_failover_enabled,
                enable_multiple_write_locations: spec.multiple_write_locations_enabled,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ArmErrorEnvelope {
    error: Option<ArmErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ArmErrorBody {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AsyncOperationStatus {
    status: String,
    error: Option<ArmErrorBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeysResponse {
    primary_master_key: String,
    secondary_master_key: Option<String>,
}

/// Resource Manager REST client
pub struct ArmClient {
    http: reqwest::Client,
    credential: Arc<dyn TokenProvider>,
    endpoint: String,
    subscription_id: String,
    resources_api_version: String,
    cosmos_api_version: String,
    poller: OperationPoller,
}

impl ArmClient {
    pub fn new(
        http: reqwest::Client,
        credential: Arc<dyn TokenProvider>,
        subscription_id: &str,
        azure: &AzureConfig,
        poller: OperationPoller,
    ) -> Self {
        Self {
            http,
            credential,
            endpoint: azure.management_endpoint.trim_end_matches('/').to_string(),
            subscription_id: subscription_id.to_string(),
            resources_api_version: azure.resources_api_version.clone(),
            cosmos_api_version: azure.cosmos_api_version.clone(),
            poller,
        }
    }

    /// Handle for a resource group that may have been created by an earlier run
    pub fn resource_group_handle(&self, name: &str) -> ResourceHandle {
        ResourceHandle::created(
            ResourceKind::ResourceGroup,
            format!("/subscriptions/{}/resourcegroups/{}", self.subscription_id, name),
            name,
        )
    }

    fn api_version(&self, kind: ResourceKind) -> &str {
        match kind {
            ResourceKind::ResourceGroup => &self.resources_api_version,
            ResourceKind::DatabaseAccount => &self.cosmos_api_version,
        }
    }

    fn resource_url(&self, resource_id: &str, api_version: &str) -> String {
        format!("{}{}?api-version={}", self.endpoint, resource_id, api_version)
    }

    async fn send(&self, method: Method, url: &str, body: Option<&Value>) -> Result<Response, ManagementError> {
        let token = self.credential.token().await?;
        let mut request = self.http.request(method.clone(), url).bearer_auth(token);
        request = match body {
            Some(body) => request.json(body),
            None if method == Method::POST => request.header(CONTENT_LENGTH, 0),
            None => request,
        };

        debug!(method = %method, url = %url, "Sending management request");
        Ok(request.send().await?)
    }

    /// Map non-success responses onto `ManagementError`
    async fn check(response: Response, resource: &str) -> Result<Response, ManagementError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let (code, message) = serde_json::from_str::<ArmErrorEnvelope>(&text)
            .ok()
            .and_then(|e| e.error)
            .map(|e| {
                (
                    e.code.unwrap_or_default(),
                    e.message.unwrap_or_else(|| text.clone()),
                )
            })
            .unwrap_or_else(|| (String::new(), text.clone()));

        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ManagementError::Authentication { message },
            StatusCode::NOT_FOUND => ManagementError::NotFound {
                resource: resource.to_string(),
            },
            StatusCode::CONFLICT => ManagementError::Conflict {
                resource: resource.to_string(),
                message,
            },
            _ => ManagementError::Api {
                status: status.as_u16(),
                code,
                message,
            },
        })
    }

    async fn json_body(response: Response) -> Result<Value, ManagementError> {
        response
            .json::<Value>()
            .await
            .map_err(|e| ManagementError::InvalidResponse {
                message: e.to_string(),
            })
    }

    /// Wait for a create/delete acknowledged with an async-operation or
    /// location header. Responses without either are already complete.
    async fn wait_for_completion(
        &self,
        headers: &HeaderMap,
        status: StatusCode,
        operation: &str,
        resource: &str,
    ) -> Result<(), ManagementError> {
        let header_url = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        if let Some(status_url) = header_url(ASYNC_OPERATION_HEADER) {
            info!(operation, "Waiting for long-running operation");
            return self
                .poller
                .poll_until(operation, || self.poll_async_operation(&status_url, resource))
                .await;
        }

        if status == StatusCode::ACCEPTED {
            if let Some(location_url) = header_url("location") {
                info!(operation, "Waiting for long-running operation");
                return self
                    .poller
                    .poll_until(operation, || self.poll_location(&location_url, resource))
                    .await;
            }
        }

        Ok(())
    }

    async fn poll_async_operation(&self, url: &str, resource: &str) -> Result<PollStatus<()>, ManagementError> {
        let response = Self::check(self.send(Method::GET, url, None).await?, resource).await?;
        let body: AsyncOperationStatus =
            response
                .json()
                .await
                .map_err(|e| ManagementError::InvalidResponse {
                    message: format!("Failed to parse operation status: {e}"),
                })?;

        let error = body.error;
        settle(Some(body.status.as_str()), || {
            error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "no error details".to_string())
        })
    }

    async fn poll_location(&self, url: &str, resource: &str) -> Result<PollStatus<()>, ManagementError> {
        let response = Self::check(self.send(Method::GET, url, None).await?, resource).await?;
        if response.status() == StatusCode::ACCEPTED {
            Ok(PollStatus::Pending)
        } else {
            Ok(PollStatus::Done(()))
        }
    }

    async fn poll_provisioning_state(&self, url: &str, resource: &str) -> Result<PollStatus<Value>, ManagementError> {
        let response = Self::check(self.send(Method::GET, url, None).await?, resource).await?;
        let body = Self::json_body(response).await?;
        let state = body.pointer("/properties/provisioningState").and_then(Value::as_str);

        match settle(state, || format!("{resource} did not provision"))? {
            PollStatus::Done(()) => Ok(PollStatus::Done(body)),
            PollStatus::Pending => {
                debug!(resource = %resource, state = ?state, "Resource still provisioning");
                Ok(PollStatus::Pending)
            }
        }
    }

    async fn delete(&self, handle: &ResourceHandle) -> Result<(), ManagementError> {
        let url = self.resource_url(&handle.id, self.api_version(handle.kind));
        let response = Self::check(self.send(Method::DELETE, &url, None).await?, &handle.name).await?;
        let status = response.status();
        let operation = format!("delete {} {}", handle.kind, handle.name);
        self.wait_for_completion(response.headers(), status, &operation, &handle.name)
            .await
    }
}

#[async_trait]
impl ResourceManager for ArmClient {
    async fn create_resource_group(
        &self,
        name: &str,
        location: &str,
    ) -> Result<ResourceHandle, ManagementError> {
        let handle = self.resource_group_handle(name);
        let url = self.resource_url(&handle.id, &self.resources_api_version);
        let body = serde_json::json!({ "location": location });

        let response = Self::check(self.send(Method::PUT, &url, Some(&body)).await?, name).await?;
        let created = Self::json_body(response).await?;

        let id = created
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(handle.id);
        Ok(ResourceHandle::created(ResourceKind::ResourceGroup, id, name))
    }

    async fn create_database_account(
        &self,
        resource_group: &ResourceHandle,
        spec: &AccountSpec,
    ) -> Result<DatabaseAccount, ManagementError> {
        let id = format!(
            "{}/providers/Microsoft.DocumentDB/databaseAccounts/{}",
            resource_group.id, spec.name
        );
        let url = self.resource_url(&id, &self.cosmos_api_version);
        let body = serde_json::to_value(AccountCreateRequest::from_spec(spec)).map_err(|e| {
            ManagementError::InvalidResponse {
                message: format!("Failed to encode account request: {e}"),
            }
        })?;

        let response = Self::check(self.send(Method::PUT, &url, Some(&body)).await?, &spec.name).await?;
        let status = response.status();
        let operation = format!("create database account {}", spec.name);
        self.wait_for_completion(response.headers(), status, &operation, &spec.name)
            .await?;

        // The endpoint is only populated once provisioning has finished
        let account = self
            .poller
            .poll_until(&operation, || self.poll_provisioning_state(&url, &spec.name))
            .await?;

        let document_endpoint = account
            .pointer("/properties/documentEndpoint")
            .and_then(Value::as_str)
            .ok_or_else(|| ManagementError::InvalidResponse {
                message: format!("Account {} has no documentEndpoint", spec.name),
            })?
            .to_string();
        let id = account
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(id);

        Ok(DatabaseAccount {
            handle: ResourceHandle::created(ResourceKind::DatabaseAccount, id, &spec.name),
            document_endpoint,
        })
    }

    async fn list_keys(&self, account: &ResourceHandle) -> Result<AccountKeys, ManagementError> {
        let url = self.resource_url(&format!("{}/listKeys", account.id), &self.cosmos_api_version);
        let response = Self::check(self.send(Method::POST, &url, None).await?, &account.name).await?;
        let keys: KeysResponse =
            response
                .json()
                .await
                .map_err(|e| ManagementError::InvalidResponse {
                    message: format!("Failed to parse account keys: {e}"),
                })?;

        Ok(AccountKeys {
            primary_master_key: keys.primary_master_key,
            secondary_master_key: keys.secondary_master_key,
        })
    }

    async fn delete_database_account(&self, account: &ResourceHandle) -> Result<(), ManagementError> {
        self.delete(account).await
    }

    async fn delete_resource_group(
        &self,
        resource_group: &ResourceHandle,
    ) -> Result<(), ManagementError> {
        self.delete(resource_group).await
    }
}
