// Recording fake cloud for workflow tests - no network, no side effects

#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use cosmos_provision::{
    AccountCredentials, AccountKeys, AccountSpec, CollectionSpec, ConsistencyLevel, DataPlane,
    DataPlaneError, DatabaseAccount, DatabaseSpec, DocumentSession, ManagementError,
    ProvisionConfig, ProvisioningPlan, ResourceHandle, ResourceKind, ResourceManager, ResourceNames,
};

/// Every call the fake can receive, in the order the workflow should make them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudCall {
    CreateResourceGroup,
    CreateDatabaseAccount,
    ListKeys,
    Connect,
    CreateDatabase,
    CreateCollection,
    DeleteDatabaseAccount,
    DeleteResourceGroup,
}

impl CloudCall {
    /// Calls that can fail before teardown begins
    pub const PROVISIONING: [CloudCall; 6] = [
        CloudCall::CreateResourceGroup,
        CloudCall::CreateDatabaseAccount,
        CloudCall::ListKeys,
        CloudCall::Connect,
        CloudCall::CreateDatabase,
        CloudCall::CreateCollection,
    ];
}

#[derive(Debug, Default)]
struct Recorded {
    calls: Vec<CloudCall>,
    consistency: Option<ConsistencyLevel>,
    account_spec: Option<AccountSpec>,
    collection: Option<CollectionSpec>,
}

/// Implements both client traits and records what it was asked to do
#[derive(Clone, Default)]
pub struct FakeCloud {
    recorded: Arc<Mutex<Recorded>>,
    fail_on: Option<CloudCall>,
    account_already_gone: bool,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `call` return an error
    pub fn failing_at(mut self, call: CloudCall) -> Self {
        self.fail_on = Some(call);
        self
    }

    /// Account deletion answers not-found
    pub fn with_account_already_gone(mut self) -> Self {
        self.account_already_gone = true;
        self
    }

    pub fn calls(&self) -> Vec<CloudCall> {
        self.recorded.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: CloudCall) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }

    pub fn position(&self, call: CloudCall) -> Option<usize> {
        self.calls().iter().position(|c| *c == call)
    }

    pub fn session_consistency(&self) -> Option<ConsistencyLevel> {
        self.recorded.lock().unwrap().consistency
    }

    pub fn account_spec(&self) -> Option<AccountSpec> {
        self.recorded.lock().unwrap().account_spec.clone()
    }

    pub fn collection(&self) -> Option<CollectionSpec> {
        self.recorded.lock().unwrap().collection.clone()
    }

    fn record(&self, call: CloudCall) -> bool {
        self.recorded.lock().unwrap().calls.push(call);
        self.fail_on == Some(call)
    }

    fn management_failure(call: CloudCall) -> ManagementError {
        ManagementError::Api {
            status: 500,
            code: "InjectedFailure".to_string(),
            message: format!("{call:?} failed"),
        }
    }

    fn data_failure(call: CloudCall) -> DataPlaneError {
        DataPlaneError::Api {
            status: 503,
            message: format!("{call:?} failed"),
        }
    }
}

#[async_trait]
impl ResourceManager for FakeCloud {
    async fn create_resource_group(
        &self,
        name: &str,
        _location: &str,
    ) -> Result<ResourceHandle, ManagementError> {
        if self.record(CloudCall::CreateResourceGroup) {
            return Err(Self::management_failure(CloudCall::CreateResourceGroup));
        }
        Ok(ResourceHandle::created(
            ResourceKind::ResourceGroup,
            format!("/subscriptions/test/resourcegroups/{name}"),
            name,
        ))
    }

    async fn create_database_account(
        &self,
        resource_group: &ResourceHandle,
        spec: &AccountSpec,
    ) -> Result<DatabaseAccount, ManagementError> {
        self.recorded.lock().unwrap().account_spec = Some(spec.clone());
        if self.record(CloudCall::CreateDatabaseAccount) {
            return Err(Self::management_failure(CloudCall::CreateDatabaseAccount));
        }
        Ok(DatabaseAccount {
            handle: ResourceHandle::created(
                ResourceKind::DatabaseAccount,
                format!(
                    "{}/providers/Microsoft.DocumentDB/databaseAccounts/{}",
                    resource_group.id, spec.name
                ),
                spec.name.clone(),
            ),
            document_endpoint: format!("https://{}.documents.azure.com:443/", spec.name),
        })
    }

    async fn list_keys(&self, _account: &ResourceHandle) -> Result<AccountKeys, ManagementError> {
        if self.record(CloudCall::ListKeys) {
            return Err(Self::management_failure(CloudCall::ListKeys));
        }
        Ok(AccountKeys {
            primary_master_key: "dGVzdGtleQ==".to_string(),
            secondary_master_key: Some("c2Vjb25kYXJ5".to_string()),
        })
    }

    async fn delete_database_account(&self, account: &ResourceHandle) -> Result<(), ManagementError> {
        if self.record(CloudCall::DeleteDatabaseAccount) {
            return Err(Self::management_failure(CloudCall::DeleteDatabaseAccount));
        }
        if self.account_already_gone {
            return Err(ManagementError::NotFound {
                resource: account.name.clone(),
            });
        }
        Ok(())
    }

    async fn delete_resource_group(
        &self,
        _resource_group: &ResourceHandle,
    ) -> Result<(), ManagementError> {
        if self.record(CloudCall::DeleteResourceGroup) {
            return Err(Self::management_failure(CloudCall::DeleteResourceGroup));
        }
        Ok(())
    }
}

#[async_trait]
impl DataPlane for FakeCloud {
    async fn connect(
        &self,
        _credentials: &AccountCredentials,
        consistency: ConsistencyLevel,
    ) -> Result<Box<dyn DocumentSession>, DataPlaneError> {
        self.recorded.lock().unwrap().consistency = Some(consistency);
        if self.record(CloudCall::Connect) {
            return Err(Self::data_failure(CloudCall::Connect));
        }
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl DocumentSession for FakeCloud {
    async fn create_database(&self, _spec: &DatabaseSpec) -> Result<(), DataPlaneError> {
        if self.record(CloudCall::CreateDatabase) {
            return Err(Self::data_failure(CloudCall::CreateDatabase));
        }
        Ok(())
    }

    async fn create_collection(
        &self,
        _database: &DatabaseSpec,
        spec: &CollectionSpec,
    ) -> Result<(), DataPlaneError> {
        self.recorded.lock().unwrap().collection = Some(spec.clone());
        if self.record(CloudCall::CreateCollection) {
            return Err(Self::data_failure(CloudCall::CreateCollection));
        }
        Ok(())
    }
}

pub fn test_plan() -> ProvisioningPlan {
    let names = ResourceNames {
        resource_group: "rg-cosmos-fixture".to_string(),
        account: "docdbfixture".to_string(),
    };
    ProvisioningPlan::from_config(&ProvisionConfig::default(), names)
        .expect("default configuration is valid")
}
