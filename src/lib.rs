// cosmos-provision library - Cosmos DB provisioning workflow
// This exposes the core components for testing and integration

pub mod cli;
pub mod config;
pub mod external;
pub mod naming;
pub mod telemetry;
pub mod types;
pub mod workflows;

// Re-export key types for easy access
pub use config::{ConfigError, ProvisionConfig};
pub use external::{
    ArmClient, CosmosDataPlane, DataPlane, DataPlaneError, DocumentSession, ManagementError,
    ResourceManager,
};
pub use naming::{NamingError, ResourceNameGenerator};
pub use telemetry::{create_provisioning_span, generate_correlation_id, init_telemetry};
pub use types::{
    AccountCredentials, AccountKeys, AccountSpec, CollectionSpec, ConsistencyLevel, ConsistencyPolicy,
    DatabaseAccount, DatabaseSpec, ResourceHandle, ResourceKind, ResourceNames,
};
pub use workflows::{
    ProvisioningOutcome, ProvisioningPlan, ProvisioningReport, ProvisioningWorkflow, WorkflowPhase,
    WorkflowStep,
};
