//! Document data-plane abstractions
//!
//! `DataPlane` opens a session against an account; the session creates
//! databases and collections. The live implementation goes through the
//! `azure_data_cosmos` client with master-key authorization.

use async_trait::async_trait;
use azure_core::error::ErrorKind;
use azure_data_cosmos::clients::CosmosClient;
use azure_data_cosmos::prelude::{AuthorizationToken, Offer};
use thiserror::Error;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::types::{AccountCredentials, CollectionSpec, ConsistencyLevel, DatabaseSpec};

#[derive(Debug, Error)]
pub enum DataPlaneError {
    #[error("Invalid account key: {message}")]
    InvalidKey { message: String },
    #[error("Resource already exists: {resource}")]
    Conflict { resource: String },
    #[error("Data plane returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("Data plane client error: {0}")]
    Client(#[source] azure_core::Error),
}

impl DataPlaneError {
    /// Classify an error the client raised while creating `resource`
    pub fn from_client(error: azure_core::Error, resource: &str) -> Self {
        let status = match error.kind() {
            ErrorKind::HttpResponse { status, .. } => Some(*status as u16),
            _ => None,
        };

        match status {
            Some(409) => Self::Conflict {
                resource: resource.to_string(),
            },
            Some(status) => Self::Api {
                status,
                message: error.to_string(),
            },
            None => Self::Client(error),
        }
    }
}

/// Trait for opening data-plane sessions
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DataPlane: Send + Sync {
    /// Open a session bound to an account and its key
    async fn connect(
        &self,
        credentials: &AccountCredentials,
        consistency: ConsistencyLevel,
    ) -> Result<Box<dyn DocumentSession>, DataPlaneError>;
}

/// Operations available inside an open data-plane session
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DocumentSession: Send + Sync {
    /// Create a database by id
    async fn create_database(&self, spec: &DatabaseSpec) -> Result<(), DataPlaneError>;

    /// Create a collection under an existing database with provisioned throughput
    async fn create_collection(
        &self,
        database: &DatabaseSpec,
        spec: &CollectionSpec,
    ) -> Result<(), DataPlaneError>;
}

/// Live data plane over `azure_data_cosmos`
#[derive(Debug, Default)]
pub struct CosmosDataPlane;

impl CosmosDataPlane {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DataPlane for CosmosDataPlane {
    async fn connect(
        &self,
        credentials: &AccountCredentials,
        consistency: ConsistencyLevel,
    ) -> Result<Box<dyn DocumentSession>, DataPlaneError> {
        let token = AuthorizationToken::primary_key(credentials.primary_key.as_str()).map_err(|e| {
            DataPlaneError::InvalidKey {
                message: e.to_string(),
            }
        })?;

        debug!(
            account = %credentials.account,
            endpoint = %credentials.endpoint,
            consistency = consistency.as_str(),
            "Opening data-plane session"
        );
        Ok(Box::new(CosmosSession {
            client: CosmosClient::new(credentials.account.clone(), token),
            consistency,
        }))
    }
}

pub struct CosmosSession {
    client: CosmosClient,
    consistency: ConsistencyLevel,
}

#[async_trait]
impl DocumentSession for CosmosSession {
    async fn create_database(&self, spec: &DatabaseSpec) -> Result<(), DataPlaneError> {
        debug!(database = %spec.id, consistency = self.consistency.as_str(), "Creating database");
        self.client
            .create_database(spec.id.clone())
            .await
            .map(|_| ())
            .map_err(|e| DataPlaneError::from_client(e, &spec.id))
    }

    async fn create_collection(
        &self,
        database: &DatabaseSpec,
        spec: &CollectionSpec,
    ) -> Result<(), DataPlaneError> {
        debug!(
            database = %database.id,
            collection = %spec.id,
            throughput = spec.throughput,
            "Creating collection"
        );
        self.client
            .database_client(database.id.clone())
            .create_collection(spec.id.clone(), spec.partition_key_path.as_str())
            .offer(Offer::Throughput(u64::from(spec.throughput)))
            .await
            .map(|_| ())
            .map_err(|e| DataPlaneError::from_client(e, &format!("{}/{}", database.id, spec.id)))
    }
}
