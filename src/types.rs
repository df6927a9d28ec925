use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Kind of cloud resource the workflow provisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    ResourceGroup,
    DatabaseAccount,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::ResourceGroup => write!(f, "resource group"),
            ResourceKind::DatabaseAccount => write!(f, "database account"),
        }
    }
}

/// A provisioned cloud resource.
///
/// Handles are only constructed from a successful creation response, so
/// holding one means the resource existed at some point and may be deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceHandle {
    pub id: String,
    pub name: String,
    pub kind: ResourceKind,
    pub created: bool,
}

impl ResourceHandle {
    pub fn created(kind: ResourceKind, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            created: true,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("maxStalenessPrefix must be at least 1, got {0}")]
    StalenessPrefixTooSmall(u64),
    #[error("maxIntervalInSeconds must be at least 1, got {0}")]
    IntervalTooSmall(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsistencyLevel {
    Eventual,
    ConsistentPrefix,
    Session,
    BoundedStaleness,
    Strong,
}

impl ConsistencyLevel {
    /// Wire name in the management payload, also used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyLevel::Eventual => "Eventual",
            ConsistencyLevel::ConsistentPrefix => "ConsistentPrefix",
            ConsistencyLevel::Session => "Session",
            ConsistencyLevel::BoundedStaleness => "BoundedStaleness",
            ConsistencyLevel::Strong => "Strong",
        }
    }
}

/// Default consistency configuration applied to a new account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConsistencyPolicy {
    level: ConsistencyLevel,
    max_staleness_prefix: u64,
    max_interval_in_seconds: u32,
}

impl ConsistencyPolicy {
    pub fn new(
        level: ConsistencyLevel,
        max_staleness_prefix: u64,
        max_interval_in_seconds: u32,
    ) -> Result<Self, PolicyError> {
        if max_staleness_prefix < 1 {
            return Err(PolicyError::StalenessPrefixTooSmall(max_staleness_prefix));
        }
        if max_interval_in_seconds < 1 {
            return Err(PolicyError::IntervalTooSmall(max_interval_in_seconds));
        }
        Ok(Self {
            level,
            max_staleness_prefix,
            max_interval_in_seconds,
        })
    }

    pub fn level(&self) -> ConsistencyLevel {
        self.level
    }

    pub fn max_staleness_prefix(&self) -> u64 {
        self.max_staleness_prefix
    }

    pub fn max_interval_in_seconds(&self) -> u32 {
        self.max_interval_in_seconds
    }
}

impl Default for ConsistencyPolicy {
    fn default() -> Self {
        Self {
            level: ConsistencyLevel::BoundedStaleness,
            max_staleness_prefix: 100_000,
            max_interval_in_seconds: 300,
        }
    }
}

/// Region an account replicates to. Priority 0 is the write region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaLocation {
    pub name: String,
    pub failover_priority: u32,
}

impl ReplicaLocation {
    pub fn new(name: &str, failover_priority: u32) -> Self {
        Self {
            name: name.to_string(),
            failover_priority,
        }
    }
}

/// Everything the management API needs to create a database account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSpec {
    pub name: String,
    pub location: String,
    pub kind: String,
    pub consistency: ConsistencyPolicy,
    pub ip_rules: Vec<String>,
    pub virtual_network_filter_enabled: bool,
    pub automatic_failover_enabled: bool,
    pub multiple_write_locations_enabled: bool,
    pub locations: Vec<ReplicaLocation>,
}

/// Result of a completed account creation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseAccount {
    pub handle: ResourceHandle,
    pub document_endpoint: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct AccountKeys {
    pub primary_master_key: String,
    pub secondary_master_key: Option<String>,
}

impl fmt::Debug for AccountKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountKeys")
            .field("primary_master_key", &"<redacted>")
            .field("secondary_master_key", &"<redacted>")
            .finish()
    }
}

/// Account, endpoint and key used to open a data-plane session. Never persisted.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    pub account: String,
    pub endpoint: String,
    pub primary_key: String,
}

impl AccountCredentials {
    pub fn new(
        account: impl Into<String>,
        endpoint: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            endpoint: endpoint.into(),
            primary_key: primary_key.into(),
        }
    }
}

impl fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("account", &self.account)
            .field("endpoint", &self.endpoint)
            .field("primary_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSpec {
    pub id: String,
}

impl DatabaseSpec {
    pub fn new(id: &str) -> Self {
        Self { id: id.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub id: String,
    /// Provisioned throughput in request units
    pub throughput: u32,
    pub partition_key_path: String,
}

/// Names generated for one provisioning session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceNames {
    pub resource_group: String,
    pub account: String,
}
