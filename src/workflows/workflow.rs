// Provisioning workflow
// Runs the provisioning steps in order and always attempts teardown of
// whatever was created, in reverse dependency order.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

use super::state_machine::{ProvisioningTracker, WorkflowEvent, WorkflowPhase, WorkflowStep};
use crate::config::{ConfigError, ProvisionConfig};
use crate::external::{DataPlane, ResourceManager};
use crate::telemetry::{create_provisioning_span, generate_correlation_id};
use crate::types::{
    AccountCredentials, AccountSpec, CollectionSpec, ConsistencyLevel, DatabaseSpec, ResourceNames,
};

/// A step that returned an error, with the error rendered for the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepFailure {
    pub step: WorkflowStep,
    pub message: String,
}

impl StepFailure {
    pub fn new(step: WorkflowStep, error: impl Display) -> Self {
        Self {
            step,
            message: error.to_string(),
        }
    }
}

/// Everything one run needs, resolved up front
#[derive(Debug, Clone)]
pub struct ProvisioningPlan {
    pub names: ResourceNames,
    pub location: String,
    pub account: AccountSpec,
    pub database: DatabaseSpec,
    pub collection: CollectionSpec,
}

impl ProvisioningPlan {
    pub fn from_config(config: &ProvisionConfig, names: ResourceNames) -> Result<Self, ConfigError> {
        Ok(Self {
            location: config.azure.location.clone(),
            account: config.account_spec(&names)?,
            database: config.database_spec(),
            collection: config.collection_spec(),
            names,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProvisioningOutcome {
    Succeeded,
    SucceededWithCleanupErrors,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisioningReport {
    pub names: ResourceNames,
    pub correlation_id: String,
    pub document_endpoint: Option<String>,
    pub failure: Option<StepFailure>,
    pub cleanup_errors: Vec<StepFailure>,
    pub final_phase: WorkflowPhase,
    /// Nothing was created, so teardown had nothing to delete
    pub nothing_to_clean_up: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ProvisioningReport {
    pub fn outcome(&self) -> ProvisioningOutcome {
        if self.failure.is_some() {
            ProvisioningOutcome::Failed
        } else if !self.cleanup_errors.is_empty() {
            ProvisioningOutcome::SucceededWithCleanupErrors
        } else {
            ProvisioningOutcome::Succeeded
        }
    }

    /// Wall-clock time from the first step to the end of teardown
    pub fn elapsed_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    pub fn log_summary(&self) {
        match self.outcome() {
            ProvisioningOutcome::Succeeded => info!(
                resource_group = %self.names.resource_group,
                account = %self.names.account,
                final_phase = %self.final_phase,
                elapsed_seconds = self.elapsed_seconds(),
                "Provisioning and teardown completed"
            ),
            ProvisioningOutcome::SucceededWithCleanupErrors => warn!(
                resource_group = %self.names.resource_group,
                cleanup_errors = self.cleanup_errors.len(),
                "Provisioning completed but teardown left errors; resources may remain"
            ),
            ProvisioningOutcome::Failed => {
                if let Some(failure) = &self.failure {
                    error!(
                        step = %failure.step,
                        error = %failure.message,
                        cleanup_errors = self.cleanup_errors.len(),
                        "Provisioning failed"
                    );
                }
            }
        }
        for cleanup in &self.cleanup_errors {
            warn!(step = %cleanup.step, error = %cleanup.message, "Cleanup error");
        }
    }
}

/// Drives one provisioning session against the injected clients
pub struct ProvisioningWorkflow {
    resources: Arc<dyn ResourceManager>,
    data_plane: Arc<dyn DataPlane>,
}

impl ProvisioningWorkflow {
    pub fn new(resources: Arc<dyn ResourceManager>, data_plane: Arc<dyn DataPlane>) -> Self {
        Self {
            resources,
            data_plane,
        }
    }

    /// Run the full sequence. Step errors end up in the report, never in a panic or `Err`.
    pub async fn run(&self, plan: &ProvisioningPlan) -> ProvisioningReport {
        let correlation_id = generate_correlation_id();
        let span = create_provisioning_span(
            "run",
            &plan.names.resource_group,
            Some(&plan.names.account),
            &correlation_id,
        );

        async {
            let started_at = Utc::now();
            let mut tracker = ProvisioningTracker::new();

            let (document_endpoint, failure) = match self.provision(plan, &mut tracker).await {
                Ok(endpoint) => (Some(endpoint), None),
                Err(failure) => {
                    error!(step = %failure.step, error = %failure.message, "Step failed");
                    tracker.record(WorkflowEvent::StepFailed(failure.step));
                    (None, Some(failure))
                }
            };

            let (cleanup_errors, nothing_to_clean_up) = self.teardown(&mut tracker).await;

            ProvisioningReport {
                names: plan.names.clone(),
                correlation_id: correlation_id.clone(),
                document_endpoint,
                failure,
                cleanup_errors,
                final_phase: tracker.phase(),
                nothing_to_clean_up,
                started_at,
                finished_at: Utc::now(),
            }
        }
        .instrument(span)
        .await
    }

    async fn provision(
        &self,
        plan: &ProvisioningPlan,
        tracker: &mut ProvisioningTracker,
    ) -> Result<String, StepFailure> {
        let group = run_step(
            WorkflowStep::CreateResourceGroup,
            self.resources
                .create_resource_group(&plan.names.resource_group, &plan.location),
        )
        .await?;
        tracker.record(WorkflowEvent::GroupCreated(group.clone()));

        let account = run_step(
            WorkflowStep::CreateDatabaseAccount,
            self.resources.create_database_account(&group, &plan.account),
        )
        .await?;
        tracker.record(WorkflowEvent::AccountCreated(account.handle.clone()));

        let keys = run_step(WorkflowStep::RetrieveKeys, self.resources.list_keys(&account.handle)).await?;
        let credentials = AccountCredentials::new(
            account.handle.name.clone(),
            account.document_endpoint.clone(),
            keys.primary_master_key,
        );

        let session = run_step(
            WorkflowStep::OpenDataSession,
            self.data_plane.connect(&credentials, ConsistencyLevel::Session),
        )
        .await?;
        run_step(WorkflowStep::CreateDatabase, session.create_database(&plan.database)).await?;
        run_step(
            WorkflowStep::CreateCollection,
            session.create_collection(&plan.database, &plan.collection),
        )
        .await?;
        tracker.record(WorkflowEvent::DataPopulated);

        info!(
            database = %plan.database.id,
            collection = %plan.collection.id,
            throughput = plan.collection.throughput,
            "Data populated"
        );
        Ok(account.document_endpoint)
    }

    /// Delete the account then the group, each only if it was created
    async fn teardown(&self, tracker: &mut ProvisioningTracker) -> (Vec<StepFailure>, bool) {
        let mut errors = Vec::new();

        if let Some(account) = tracker.session().account_to_delete().cloned() {
            info!(step = %WorkflowStep::DeleteDatabaseAccount, account = %account.name, "Starting step");
            match self.resources.delete_database_account(&account).await {
                Ok(()) => {
                    info!(account = %account.name, "Database account deleted");
                    tracker.record(WorkflowEvent::AccountDeleted);
                }
                Err(e) if e.is_not_found() => {
                    info!(account = %account.name, "Database account already gone");
                    tracker.record(WorkflowEvent::AccountDeleted);
                }
                Err(e) => {
                    warn!(account = %account.name, error = %e, "Failed to delete database account");
                    errors.push(StepFailure::new(WorkflowStep::DeleteDatabaseAccount, e));
                }
            }
        }

        let Some(group) = tracker.session().group_to_delete().cloned() else {
            info!("No cleanup necessary, no resource group was created");
            tracker.record(WorkflowEvent::CleanupFinished);
            return (errors, true);
        };

        info!(step = %WorkflowStep::DeleteResourceGroup, resource_group = %group.name, "Starting step");
        match self.resources.delete_resource_group(&group).await {
            Ok(()) => {
                info!(resource_group = %group.name, "Resource group deleted");
                tracker.record(WorkflowEvent::GroupDeleted);
            }
            Err(e) => {
                warn!(resource_group = %group.name, error = %e, "Failed to delete resource group");
                errors.push(StepFailure::new(WorkflowStep::DeleteResourceGroup, e));
                tracker.record(WorkflowEvent::CleanupFinished);
            }
        }

        (errors, false)
    }
}

async fn run_step<T, E, F>(step: WorkflowStep, call: F) -> Result<T, StepFailure>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    info!(step = %step, "Starting step");
    match call.await {
        Ok(value) => {
            info!(step = %step, "Step succeeded");
            Ok(value)
        }
        Err(e) => Err(StepFailure::new(step, e)),
    }
}
