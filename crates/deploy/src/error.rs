//! Error types surfaced by plan resolution and execution.

use std::time::Duration;

use alloy_core::primitives::{Address, TxHash};

use crate::{ContractId, DeployedContract, Network};

/// A plan that cannot be executed as written. Raised before anything is submitted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanValidationError {
    #[error("step {step} reuses the name `{name}` already taken by step {first}")]
    DuplicateStepName {
        step: usize,
        first: usize,
        name: String,
    },

    #[error("step {step} (`{name}`) references step {referenced}, which does not run before it")]
    ForwardReference {
        step: usize,
        name: String,
        referenced: usize,
    },

    #[error("step {step} (`{name}`) references step {referenced}, but the plan has {len} steps")]
    UnknownReference {
        step: usize,
        name: String,
        referenced: usize,
        len: usize,
    },

    #[error(
        "step {step} (`{name}`) deploys external contract {contract}, which has no fixed address on network `{network}`"
    )]
    MissingNetworkOverride {
        step: usize,
        name: String,
        contract: ContractId,
        network: Network,
    },
}

/// Failure reported by a [`crate::TransactionSubmitter`].
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("no artifact found for contract {0}")]
    UnknownContract(ContractId),

    #[error("invalid artifact for contract {contract}: {reason}")]
    InvalidArtifact { contract: ContractId, reason: String },

    #[error("invalid call `{signature}`: {reason}")]
    InvalidCall { signature: String, reason: String },

    #[error("rpc request failed")]
    Rpc(#[source] anyhow::Error),

    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: TxHash },

    #[error("transaction {tx_hash} not confirmed after {waited:?}")]
    Timeout { tx_hash: TxHash, waited: Duration },

    #[error("receipt of creation transaction {tx_hash} carries no contract address")]
    MissingContractAddress { tx_hash: TxHash },
}

/// Which transaction of a step failed.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display)]
pub enum StepPhase {
    #[display("creation")]
    Creation,
    #[display("call #{index} {signature}")]
    Call { index: usize, signature: String },
}

/// A step whose transaction failed, reverted or timed out.
#[derive(Debug, thiserror::Error)]
#[error("step {step} (`{name}`, contract {contract}) failed during {phase}")]
pub struct DeploymentStepError {
    pub step: usize,
    pub name: String,
    pub contract: ContractId,
    pub phase: StepPhase,
    /// Set when the creation confirmed but a later call of the same step failed.
    pub deployed_address: Option<Address>,
    #[source]
    pub source: SubmitError,
}

/// Outcome of a plan that did not complete.
#[derive(Debug, thiserror::Error)]
pub enum DeploymentError {
    #[error("invalid deployment plan")]
    Validation(#[from] PlanValidationError),

    /// The plan stopped at `failure.step`; everything before it is in `completed`.
    #[error("deployment aborted after {} confirmed step(s)", .completed.len())]
    Aborted {
        #[source]
        failure: DeploymentStepError,
        completed: Vec<DeployedContract>,
    },
}

impl DeploymentError {
    /// Outputs recorded before the failure. Empty for validation errors.
    pub fn completed(&self) -> &[DeployedContract] {
        match self {
            Self::Validation(_) => &[],
            Self::Aborted { completed, .. } => completed,
        }
    }

    pub fn step_error(&self) -> Option<&DeploymentStepError> {
        match self {
            Self::Validation(_) => None,
            Self::Aborted { failure, .. } => Some(failure),
        }
    }
}
