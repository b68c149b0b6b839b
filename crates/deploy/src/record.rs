//! Deployment records written by the host tool after each run.
//!
//! A record is saved to `{records}/{network}.json` once a plan completes or
//! aborts. An aborted record lists the contracts confirmed before the failure,
//! and the failing step with any contract it created before a call failed, so
//! the on-chain state can be inspected by hand. Nothing is rolled back.

use std::path::{Path, PathBuf};

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{ContractId, DeployedContract, DeploymentRun, DeploymentStepError, Network, PlanState};

/// The step that aborted a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub step: usize,
    pub name: String,
    pub contract: ContractId,
    pub phase: String,
    /// Contract created by the failing step before one of its calls failed.
    /// It is live on chain but absent from `contracts`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed_address: Option<Address>,
    /// Full error chain.
    pub error: String,
}

impl From<&DeploymentStepError> for FailureRecord {
    fn from(failure: &DeploymentStepError) -> Self {
        Self {
            step: failure.step,
            name: failure.name.clone(),
            contract: failure.contract.clone(),
            phase: failure.phase.to_string(),
            deployed_address: failure.deployed_address,
            error: error_chain(failure),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub network: Network,
    /// Chain id reported by the node, when it was queried.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    pub account: Address,
    /// SHA-256 of the resolved plan.
    pub plan_hash: String,
    pub status: PlanState,
    /// Unix timestamp of the run.
    pub deployed_at: i64,
    /// Steep version that produced this record.
    pub steep_version: String,
    pub contracts: Vec<DeployedContract>,
    /// The failing step, for aborted runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureRecord>,
}

impl DeploymentRecord {
    pub fn from_run(run: &DeploymentRun, chain_id: Option<u64>) -> Self {
        Self {
            network: run.network().clone(),
            chain_id,
            account: run.account(),
            plan_hash: run.plan_hash().to_string(),
            status: run.state(),
            deployed_at: chrono::Utc::now().timestamp(),
            steep_version: env!("CARGO_PKG_VERSION").to_string(),
            contracts: run.outputs().to_vec(),
            failure: run.failure().map(FailureRecord::from),
        }
    }

    /// Default location of the record for `network` under `records_dir`.
    pub fn path_for(records_dir: &Path, network: &Network) -> PathBuf {
        records_dir.join(format!("{network}.json"))
    }

    /// Whether this record already covers a plan with `plan_hash` on the chain
    /// with `chain_id`. Records without a chain id never match.
    pub fn is_current(&self, plan_hash: &str, chain_id: u64) -> bool {
        self.status == PlanState::Completed
            && self.plan_hash == plan_hash
            && self.chain_id == Some(chain_id)
    }

    pub fn address_of(&self, name: &str) -> Option<Address> {
        self.contracts
            .iter()
            .find(|contract| contract.name == name)
            .map(|contract| contract.address)
    }

    /// Save this record as formatted JSON, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create records directory {}", parent.display())
            })?;
        }

        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize deployment record")?;

        std::fs::write(path, json)
            .with_context(|| format!("Failed to write deployment record to {}", path.display()))?;

        tracing::info!(path = %path.display(), status = %self.status, "Deployment record saved");
        Ok(())
    }

    /// Load a record from a file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Deployment record does not exist: {}", path.display());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read deployment record from {}", path.display()))?;

        serde_json::from_str(&content).context("Failed to parse deployment record JSON")
    }

    /// Load the record at `path` if there is one.
    pub fn load_if_exists(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from_file(path).map(Some)
    }
}

fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
