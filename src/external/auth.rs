//! Service-principal authentication for the management API

use async_trait::async_trait;
use azure_core::auth::TokenCredential;
use azure_identity::ClientSecretCredential;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::management::ManagementError;
use crate::config::AzureConfig;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Missing environment variable {0}")]
    MissingVariable(&'static str),
    #[error("Invalid authority host '{host}': {message}")]
    InvalidAuthorityHost { host: String, message: String },
}

/// Service principal read from CLIENT_ID, CLIENT_SECRET, TENANT_ID and SUBSCRIPTION_ID
#[derive(Clone)]
pub struct AzureCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub tenant_id: String,
    pub subscription_id: String,
}

impl AzureCredentials {
    pub fn from_env() -> Result<Self, CredentialError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build credentials from any variable source; empty values count as missing
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CredentialError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or(CredentialError::MissingVariable(name))
        };

        Ok(Self {
            client_id: read("CLIENT_ID")?,
            client_secret: read("CLIENT_SECRET")?,
            tenant_id: read("TENANT_ID")?,
            subscription_id: read("SUBSCRIPTION_ID")?,
        })
    }
}

impl std::fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("tenant_id", &self.tenant_id)
            .field("subscription_id", &self.subscription_id)
            .finish()
    }
}

/// Source of bearer tokens for management calls
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> Result<String, ManagementError>;
}

/// Fixed token, for pre-issued tokens and tests
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String, ManagementError> {
        Ok(self.0.clone())
    }
}

/// Client-credentials grant through `azure_identity`, which caches the token
/// until it is close to expiry
pub struct ServicePrincipalCredential {
    inner: ClientSecretCredential,
    client_id: String,
    scope: String,
}

impl ServicePrincipalCredential {
    pub fn new(credentials: AzureCredentials, azure: &AzureConfig) -> Result<Self, CredentialError> {
        let authority_host =
            Url::parse(&azure.authority_host).map_err(|e| CredentialError::InvalidAuthorityHost {
                host: azure.authority_host.clone(),
                message: e.to_string(),
            })?;
        let scope = format!("{}/.default", azure.management_endpoint.trim_end_matches('/'));

        let inner = ClientSecretCredential::new(
            azure_core::new_http_client(),
            authority_host,
            credentials.tenant_id,
            credentials.client_id.clone(),
            credentials.client_secret,
        );
        Ok(Self {
            inner,
            client_id: credentials.client_id,
            scope,
        })
    }
}

#[async_trait]
impl TokenProvider for ServicePrincipalCredential {
    async fn token(&self) -> Result<String, ManagementError> {
        let token = self
            .inner
            .get_token(&[self.scope.as_str()])
            .await
            .map_err(|e| ManagementError::Authentication {
                message: e.to_string(),
            })?;

        debug!(client_id = %self.client_id, expires_on = %token.expires_on, "Management token ready");
        Ok(token.token.secret().to_string())
    }
}
