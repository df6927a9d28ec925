//! External service abstractions
//!
//! This module provides trait-based abstractions for the two remote APIs the
//! provisioning workflow talks to: the resource-management control plane and
//! the document data plane. The workflow only sees the traits, so tests swap
//! in mock or recording implementations.

pub mod auth;
pub mod data_plane;
pub mod lro;
pub mod management;

pub use auth::{AzureCredentials, CredentialError, ServicePrincipalCredential, StaticToken, TokenProvider};
pub use data_plane::{CosmosDataPlane, DataPlane, DataPlaneError, DocumentSession};
pub use lro::{OperationPoller, PollStatus};
pub use management::{AccountCreateRequest, ArmClient, ManagementError, ResourceManager};
