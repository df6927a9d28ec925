// Provisioning lifecycle state machine
// Tracks which resources exist so teardown only touches what was created.

use serde::Serialize;
use statig::blocking::StateMachine;
use statig::prelude::*;
use std::fmt;

use crate::types::ResourceHandle;

/// One externally visible step of a provisioning run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkflowStep {
    CreateResourceGroup,
    CreateDatabaseAccount,
    RetrieveKeys,
    OpenDataSession,
    CreateDatabase,
    CreateCollection,
    DeleteDatabaseAccount,
    DeleteResourceGroup,
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowStep::CreateResourceGroup => "create resource group",
            WorkflowStep::CreateDatabaseAccount => "create database account",
            WorkflowStep::RetrieveKeys => "retrieve account keys",
            WorkflowStep::OpenDataSession => "open data session",
            WorkflowStep::CreateDatabase => "create database",
            WorkflowStep::CreateCollection => "create collection",
            WorkflowStep::DeleteDatabaseAccount => "delete database account",
            WorkflowStep::DeleteResourceGroup => "delete resource group",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowEvent {
    GroupCreated(ResourceHandle),
    AccountCreated(ResourceHandle),
    DataPopulated,
    StepFailed(WorkflowStep),
    AccountDeleted,
    GroupDeleted,
    /// Teardown ended without a successful group deletion
    CleanupFinished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkflowPhase {
    Idle,
    GroupCreated,
    AccountCreated,
    DataPopulated,
    CleaningUp,
    AccountDeleted,
    GroupDeleted,
    Finished,
}

impl WorkflowPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowPhase::GroupDeleted | WorkflowPhase::Finished)
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Workflow record shared by every state
#[derive(Debug, Default)]
pub struct ProvisioningSession {
    pub resource_group: Option<ResourceHandle>,
    pub account: Option<ResourceHandle>,
    pub failed_step: Option<WorkflowStep>,
    pub account_deleted: bool,
    pub group_deleted: bool,
}

impl ProvisioningSession {
    /// Account handle still awaiting deletion
    pub fn account_to_delete(&self) -> Option<&ResourceHandle> {
        self.account.as_ref().filter(|h| h.created && !self.account_deleted)
    }

    /// Group handle still awaiting deletion
    pub fn group_to_delete(&self) -> Option<&ResourceHandle> {
        self.resource_group
            .as_ref()
            .filter(|h| h.created && !self.group_deleted)
    }

    fn record_failure(&mut self, step: WorkflowStep) {
        tracing::warn!(step = %step, "Provisioning step failed, entering cleanup");
        self.failed_step = Some(step);
    }
}

#[state_machine(
    initial = "State::idle()",
    state(derive(Debug, Clone, PartialEq, Eq))
)]
impl ProvisioningSession {
    #[state]
    fn idle(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        match event {
            WorkflowEvent::GroupCreated(handle) => {
                tracing::info!(resource_group = %handle.name, "Resource group recorded");
                self.resource_group = Some(handle.clone());
                Transition(State::group_created())
            }
            WorkflowEvent::StepFailed(step) => {
                self.record_failure(*step);
                Transition(State::cleaning_up())
            }
            _ => Handled,
        }
    }

    #[state]
    fn group_created(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        match event {
            WorkflowEvent::AccountCreated(handle) => {
                tracing::info!(account = %handle.name, "Database account recorded");
                self.account = Some(handle.clone());
                Transition(State::account_created())
            }
            WorkflowEvent::StepFailed(step) => {
                self.record_failure(*step);
                Transition(State::cleaning_up())
            }
            _ => Handled,
        }
    }

    #[state]
    fn account_created(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        match event {
            WorkflowEvent::DataPopulated => Transition(State::data_populated()),
            WorkflowEvent::StepFailed(step) => {
                self.record_failure(*step);
                Transition(State::cleaning_up())
            }
            _ => Handled,
        }
    }

    #[state]
    fn data_populated(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        self.teardown(event)
    }

    #[state]
    fn cleaning_up(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        self.teardown(event)
    }

    #[state]
    fn account_deleted(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        match event {
            WorkflowEvent::AccountDeleted => Handled,
            _ => self.teardown(event),
        }
    }

    #[state]
    fn group_deleted(event: &WorkflowEvent) -> Outcome<State> {
        tracing::debug!(?event, "Ignoring event after group deletion");
        Handled
    }

    #[state]
    fn finished(event: &WorkflowEvent) -> Outcome<State> {
        tracing::debug!(?event, "Ignoring event after workflow finished");
        Handled
    }
}

impl ProvisioningSession {
    fn teardown(&mut self, event: &WorkflowEvent) -> Outcome<State> {
        match event {
            WorkflowEvent::AccountDeleted => {
                self.account_deleted = true;
                Transition(State::account_deleted())
            }
            WorkflowEvent::GroupDeleted => {
                self.group_deleted = true;
                Transition(State::group_deleted())
            }
            WorkflowEvent::CleanupFinished => Transition(State::finished()),
            _ => Handled,
        }
    }
}

/// Owns the state machine for a single run
pub struct ProvisioningTracker {
    machine: StateMachine<ProvisioningSession>,
}

impl Default for ProvisioningTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvisioningTracker {
    pub fn new() -> Self {
        Self {
            machine: ProvisioningSession::default().state_machine(),
        }
    }

    pub fn record(&mut self, event: WorkflowEvent) {
        self.machine.handle(&event);
    }

    pub fn session(&self) -> &ProvisioningSession {
        self.machine.inner()
    }

    pub fn phase(&self) -> WorkflowPhase {
        match self.machine.state() {
            State::Idle { .. } => WorkflowPhase::Idle,
            State::GroupCreated { .. } => WorkflowPhase::GroupCreated,
            State::AccountCreated { .. } => WorkflowPhase::AccountCreated,
            State::DataPopulated { .. } => WorkflowPhase::DataPopulated,
            State::CleaningUp { .. } => WorkflowPhase::CleaningUp,
            State::AccountDeleted { .. } => WorkflowPhase::AccountDeleted,
            State::GroupDeleted { .. } => WorkflowPhase::GroupDeleted,
            State::Finished { .. } => WorkflowPhase::Finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResourceKind;

    fn group() -> ResourceHandle {
        ResourceHandle::created(ResourceKind::ResourceGroup, "/subscriptions/s/resourcegroups/rg-1", "rg-1")
    }

    fn account() -> ResourceHandle {
        ResourceHandle::created(ResourceKind::DatabaseAccount, "/acct", "docdb1")
    }

    #[test]
    fn test_happy_path_reaches_group_deleted() {
        let mut tracker = ProvisioningTracker::new();
        assert_eq!(tracker.phase(), WorkflowPhase::Idle);

        tracker.record(WorkflowEvent::GroupCreated(group()));
        tracker.record(WorkflowEvent::AccountCreated(account()));
        tracker.record(WorkflowEvent::DataPopulated);
        assert_eq!(tracker.phase(), WorkflowPhase::DataPopulated);
        assert!(tracker.session().account_to_delete().is_some());

        tracker.record(WorkflowEvent::AccountDeleted);
        assert_eq!(tracker.phase(), WorkflowPhase::AccountDeleted);
        assert!(tracker.session().account_to_delete().is_none());

        tracker.record(WorkflowEvent::GroupDeleted);
        assert_eq!(tracker.phase(), WorkflowPhase::GroupDeleted);
        assert!(tracker.phase().is_terminal());
        assert!(tracker.session().group_to_delete().is_none());
    }

    #[test]
    fn test_failure_before_group_leaves_nothing_to_delete() {
        let mut tracker = ProvisioningTracker::new();
        tracker.record(WorkflowEvent::StepFailed(WorkflowStep::CreateResourceGroup));

        assert_eq!(tracker.phase(), WorkflowPhase::CleaningUp);
        assert_eq!(tracker.session().failed_step, Some(WorkflowStep::CreateResourceGroup));
        assert!(tracker.session().group_to_delete().is_none());
        assert!(tracker.session().account_to_delete().is_none());

        tracker.record(WorkflowEvent::CleanupFinished);
        assert_eq!(tracker.phase(), WorkflowPhase::Finished);
    }

    #[test]
    fn test_failure_after_group_keeps_group_for_teardown() {
        let mut tracker = ProvisioningTracker::new();
        tracker.record(WorkflowEvent::GroupCreated(group()));
        tracker.record(WorkflowEvent::StepFailed(WorkflowStep::CreateDatabaseAccount));

        assert_eq!(tracker.phase(), WorkflowPhase::CleaningUp);
        assert!(tracker.session().account_to_delete().is_none());
        assert_eq!(tracker.session().group_to_delete().map(|h| h.name.as_str()), Some("rg-1"));

        tracker.record(WorkflowEvent::GroupDeleted);
        assert_eq!(tracker.phase(), WorkflowPhase::GroupDeleted);
    }

    #[test]
    fn test_out_of_order_events_are_ignored() {
        let mut tracker = ProvisioningTracker::new();
        tracker.record(WorkflowEvent::DataPopulated);
        tracker.record(WorkflowEvent::AccountCreated(account()));
        assert_eq!(tracker.phase(), WorkflowPhase::Idle);
        assert!(tracker.session().account.is_none());

        tracker.record(WorkflowEvent::GroupCreated(group()));
        tracker.record(WorkflowEvent::GroupDeleted);
        assert_eq!(tracker.phase(), WorkflowPhase::GroupCreated);
    }

    #[test]
    fn test_terminal_states_ignore_further_events() {
        let mut tracker = ProvisioningTracker::new();
        tracker.record(WorkflowEvent::GroupCreated(group()));
        tracker.record(WorkflowEvent::StepFailed(WorkflowStep::RetrieveKeys));
        tracker.record(WorkflowEvent::GroupDeleted);
        tracker.record(WorkflowEvent::GroupCreated(group()));
        tracker.record(WorkflowEvent::StepFailed(WorkflowStep::CreateDatabase));

        assert_eq!(tracker.phase(), WorkflowPhase::GroupDeleted);
        assert_eq!(tracker.session().failed_step, Some(WorkflowStep::RetrieveKeys));
    }
}
