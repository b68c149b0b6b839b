//! Identifiers shared across the plan, the orchestrator and the host tool.

use derive_more::{Deref, Display, From};
use serde::{Deserialize, Serialize};

/// Name of the network a plan is resolved against (`mainnet`, `development`, ...).
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Deref,
    From,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct Network(String);

impl Network {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Network {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// Identifier of a compiled contract, matching its artifact file name.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    Deref,
    From,
    Serialize,
    Deserialize,
)]
#[serde(transparent)]
pub struct ContractId(String);

impl ContractId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContractId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}
