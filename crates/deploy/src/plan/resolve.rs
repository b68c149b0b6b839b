//! Plans resolved against a single network.

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{ConstructorArg, PostDeployCall};
use crate::{ContractId, Network};

/// What a step does on the network the plan was resolved for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepAction {
    /// Submit a creation transaction, then run the calls.
    Deploy {
        args: Vec<ConstructorArg>,
        calls: Vec<PostDeployCall>,
    },
    /// The contract already lives at this address. Nothing is submitted.
    UseFixed(Address),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedStep {
    pub index: usize,
    pub name: String,
    pub contract: ContractId,
    pub action: StepAction,
}

/// A validated plan with every network branch decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedPlan {
    pub network: Network,
    pub steps: Vec<ResolvedStep>,
}

impl ResolvedPlan {
    /// Number of creation transactions this plan will submit.
    pub fn deployments(&self) -> usize {
        self.steps
            .iter()
            .filter(|step| matches!(step.action, StepAction::Deploy { .. }))
            .count()
    }

    /// SHA-256 of the resolved plan, hex encoded.
    ///
    /// Two resolutions hash equal exactly when they would submit the same
    /// transactions, which is what decides whether a recorded run is still current.
    pub fn content_hash(&self) -> String {
        let json =
            serde_json::to_string(self).expect("ResolvedPlan serialization should never fail");

        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        hex::encode(hasher.finalize())
    }
}
