// Provisioning workflow and its lifecycle state machine

pub mod state_machine;
pub mod workflow;

pub use state_machine::{
    ProvisioningSession, ProvisioningTracker, WorkflowEvent, WorkflowPhase, WorkflowStep,
};
pub use workflow::{
    ProvisioningOutcome, ProvisioningPlan, ProvisioningReport, ProvisioningWorkflow, StepFailure,
};
