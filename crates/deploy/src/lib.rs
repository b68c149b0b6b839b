//! steep-deploy - Contract deployment library for EVM chains.
//!
//! This crate resolves a [`DeploymentPlan`] against a [`Network`] and deploys its
//! contracts in order through a [`TransactionSubmitter`], wiring the address of
//! each deployed contract into the constructor arguments of later ones.

mod artifacts;
mod error;
mod network;
mod orchestrator;
pub mod plan;
mod project;
mod record;
pub mod rpc;
pub mod submitter;

pub use artifacts::{Artifact, ArtifactStore};
pub use error::{
    DeploymentError, DeploymentStepError, PlanValidationError, StepPhase, SubmitError,
};
pub use network::{ContractId, Network};
pub use orchestrator::{
    DeployedContract, DeploymentRun, Orchestrator, Origin, PlanState, StepProgress, StepState,
};
pub use plan::{
    ConstructorArg, DeploymentPlan, PlanStep, PostDeployCall, ResolvedPlan, ResolvedStep,
    StepAction,
};
pub use project::{
    ArgSpec, CallSpec, NetworkConfig, NumberLiteral, PROJECT_FILENAME, ProjectConfig, StepSpec,
};
pub use record::{DeploymentRecord, FailureRecord};
pub use submitter::{
    CallRequest, CreationRequest, Receipt, RpcSubmitter, RpcSubmitterConfig, TransactionSubmitter,
};
