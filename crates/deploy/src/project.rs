//! Project configuration (`Steep.toml`).
//!
//! The project file lists network profiles and the deployment plan. Steps are
//! written in plan order and refer to each other by name:
//!
//! ```toml
//! [networks.development]
//! rpc_url = "http://127.0.0.1:8545"
//!
//! [[step]]
//! name = "token"
//! contract = "ProductToken"
//! args = [{ uint = 330000 }, { uint = "9 ether" }]
//!
//! [[step]]
//! name = "dex"
//! contract = "Exchange"
//! args = [{ ref = "token" }]
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use alloy_core::primitives::{Address, Bytes};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    ConstructorArg, DeploymentPlan, Network, PlanStep, PostDeployCall, RpcSubmitterConfig,
    plan::{parse_amount, parse_signed},
    rpc::DEFAULT_REQUEST_TIMEOUT,
    submitter::{DEFAULT_CONFIRMATION_TIMEOUT, DEFAULT_POLL_INTERVAL},
};

/// The default name for the project file.
pub const PROJECT_FILENAME: &str = "Steep.toml";

fn default_artifacts() -> PathBuf {
    PathBuf::from("build/contracts")
}

fn default_records() -> PathBuf {
    PathBuf::from("deployments")
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT.as_secs()
}

fn default_confirmation_timeout_secs() -> u64 {
    DEFAULT_CONFIRMATION_TIMEOUT.as_secs()
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL.as_millis() as u64
}

/// How to reach one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub rpc_url: Url,
    /// Expected chain id. Checked against the node before anything is sent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Deployer account. Defaults to the node's first account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl NetworkConfig {
    pub fn submitter_config(&self) -> RpcSubmitterConfig {
        RpcSubmitterConfig {
            rpc_url: self.rpc_url.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs),
            gas: self.gas,
        }
    }
}

/// Unsigned literal, written either as a TOML integer or as a string
/// (`"0x2710"`, `"9 ether"`, or digits beyond the TOML integer range).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumberLiteral {
    Integer(i64),
    Text(String),
}

/// An argument as written in the project file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgSpec {
    Uint(NumberLiteral),
    Int(NumberLiteral),
    Address(Address),
    Bool(bool),
    String(String),
    Bytes(Bytes),
    /// Name of the step whose address is passed.
    Ref(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSpec {
    pub function: String,
    #[serde(default)]
    pub args: Vec<ArgSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub name: String,
    pub contract: String,
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    #[serde(default)]
    pub external: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<Network, Address>,
    #[serde(default, rename = "call", skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<CallSpec>,
}

/// Contents of `Steep.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Directory of compiled artifacts, relative to the project file.
    #[serde(default = "default_artifacts")]
    pub artifacts: PathBuf,
    /// Directory deployment records are written to, relative to the project file.
    #[serde(default = "default_records")]
    pub records: PathBuf,
    #[serde(default)]
    pub networks: BTreeMap<Network, NetworkConfig>,
    #[serde(default, rename = "step")]
    pub steps: Vec<StepSpec>,
}

impl ProjectConfig {
    /// Parse a project from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse project file as TOML")
    }

    pub fn network(&self, network: &Network) -> Result<&NetworkConfig> {
        self.networks.get(network).with_context(|| {
            let known: Vec<&str> = self.networks.keys().map(Network::as_str).collect();
            format!(
                "Network `{}` is not configured (known networks: {})",
                network,
                known.join(", ")
            )
        })
    }

    /// Build the deployment plan, turning step names into indices.
    ///
    /// A reference to a step declared further down becomes a forward reference
    /// and is rejected when the plan is validated. A name that no step declares
    /// is rejected here.
    pub fn plan(&self) -> Result<DeploymentPlan> {
        let mut indices: HashMap<&str, usize> = HashMap::new();
        for (index, step) in self.steps.iter().enumerate() {
            indices.entry(step.name.as_str()).or_insert(index);
        }

        let steps = self
            .steps
            .iter()
            .map(|spec| {
                let convert = |args: &[ArgSpec]| -> Result<Vec<ConstructorArg>> {
                    args.iter().map(|arg| arg.to_constructor_arg(&indices)).collect()
                };

                let args = convert(&spec.args)
                    .with_context(|| format!("Invalid arguments for step `{}`", spec.name))?;

                let calls = spec
                    .calls
                    .iter()
                    .map(|call| {
                        let args = convert(&call.args).with_context(|| {
                            format!(
                                "Invalid arguments for call `{}` of step `{}`",
                                call.function, spec.name
                            )
                        })?;
                        Ok(PostDeployCall::new(call.function.clone(), args))
                    })
                    .collect::<Result<Vec<_>>>()?;

                Ok(PlanStep {
                    name: spec.name.clone(),
                    contract: spec.contract.as_str().into(),
                    args,
                    overrides: spec.overrides.clone(),
                    external: spec.external,
                    calls,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DeploymentPlan::from_steps(steps))
    }
}

impl ArgSpec {
    fn to_constructor_arg(&self, indices: &HashMap<&str, usize>) -> Result<ConstructorArg> {
        let arg = match self {
            Self::Uint(NumberLiteral::Integer(value)) => {
                let value = u64::try_from(*value)
                    .with_context(|| format!("Unsigned argument {value} is negative"))?;
                ConstructorArg::uint(value.into())
            }
            Self::Uint(NumberLiteral::Text(text)) => ConstructorArg::Uint(parse_amount(text)?),
            Self::Int(NumberLiteral::Integer(value)) => {
                ConstructorArg::Int(parse_signed(&value.to_string())?)
            }
            Self::Int(NumberLiteral::Text(text)) => ConstructorArg::Int(parse_signed(text)?),
            Self::Address(address) => ConstructorArg::Address(*address),
            Self::Bool(value) => ConstructorArg::Bool(*value),
            Self::String(value) => ConstructorArg::String(value.clone()),
            Self::Bytes(value) => ConstructorArg::Bytes(value.clone()),
            Self::Ref(name) => {
                let index = indices
                    .get(name.as_str())
                    .with_context(|| format!("Reference to unknown step `{name}`"))?;
                ConstructorArg::Ref(*index)
            }
        };
        Ok(arg)
    }
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::U256;

    use super::*;
    use crate::PlanValidationError;

    const TOKEN_DEX: &str = r#"
        artifacts = "build/contracts"

        [networks.development]
        rpc_url = "http://127.0.0.1:8545"
        chain_id = 1337

        [networks.mainnet]
        rpc_url = "https://ethereum-rpc.publicnode.com"
        from = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
        confirmation_timeout_secs = 600

        [[step]]
        name = "token"
        contract = "ProductToken"
        args = [{ uint = 330000 }, { uint = 500 }, { uint = 3 }, { uint = "9 ether" }]
        overrides = { mainnet = "0x5FbDB2315678afecb367f032d93F642f64180aa3" }

        [[step]]
        name = "dex"
        contract = "Exchange"
        args = [{ ref = "token" }]
    "#;

    #[test]
    fn test_parse_project() {
        let config = ProjectConfig::from_toml(TOKEN_DEX).unwrap();

        assert_eq!(config.artifacts, PathBuf::from("build/contracts"));
        assert_eq!(config.records, PathBuf::from("deployments"));
        assert_eq!(config.steps.len(), 2);

        let development = config.network(&Network::from("development")).unwrap();
        assert_eq!(development.chain_id, Some(1337));
        assert_eq!(development.from, None);
        assert_eq!(development.poll_interval_ms, 500);

        let mainnet = config.network(&Network::from("mainnet")).unwrap();
        assert_eq!(mainnet.submitter_config().confirmation_timeout, Duration::from_secs(600));
        assert!(mainnet.from.is_some());
    }

    #[test]
    fn test_unknown_network() {
        let config = ProjectConfig::from_toml(TOKEN_DEX).unwrap();
        let err = config.network(&Network::from("rinkeby")).unwrap_err();
        assert!(err.to_string().contains("development, mainnet"));
    }

    #[test]
    fn test_plan_from_project() {
        let plan = ProjectConfig::from_toml(TOKEN_DEX).unwrap().plan().unwrap();

        let token = &plan.steps()[0];
        assert_eq!(token.contract.as_str(), "ProductToken");
        assert_eq!(token.args[0], ConstructorArg::uint(330000));
        assert_eq!(
            token.args[3],
            ConstructorArg::Uint(U256::from(9_000_000_000_000_000_000u128))
        );
        assert_eq!(token.overrides.len(), 1);

        assert_eq!(plan.steps()[1].args, vec![ConstructorArg::Ref(0)]);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_later_name_becomes_forward_reference() {
        let config = ProjectConfig::from_toml(
            r#"
            [[step]]
            name = "dex"
            contract = "Exchange"
            args = [{ ref = "token" }]

            [[step]]
            name = "token"
            contract = "ProductToken"
            "#,
        )
        .unwrap();

        let plan = config.plan().unwrap();
        assert!(matches!(
            plan.validate(),
            Err(PlanValidationError::ForwardReference { step: 0, referenced: 1, .. })
        ));
    }

    #[test]
    fn test_unknown_name_rejected() {
        let config = ProjectConfig::from_toml(
            r#"
            [[step]]
            name = "dex"
            contract = "Exchange"
            args = [{ ref = "nowhere" }]
            "#,
        )
        .unwrap();

        assert!(config.plan().is_err());
    }

    #[test]
    fn test_negative_uint_rejected() {
        let config = ProjectConfig::from_toml(
            r#"
            [[step]]
            name = "token"
            contract = "ProductToken"
            args = [{ uint = -1 }]
            "#,
        )
        .unwrap();

        assert!(config.plan().is_err());
    }

    #[test]
    fn test_post_deploy_calls() {
        let config = ProjectConfig::from_toml(
            r#"
            [[step]]
            name = "factory"
            contract = "TokenFactory"

            [[step.call]]
            function = "createToken(string,uint32,uint256,uint256,uint256)"
            args = [
                { string = "Kalon Tea" },
                { uint = 330000 },
                { uint = 500 },
                { uint = 3 },
                { uint = "9 ether" },
            ]
            "#,
        )
        .unwrap();

        let plan = config.plan().unwrap();
        let calls = &plan.steps()[0].calls;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args[0], ConstructorArg::string("Kalon Tea"));
        assert_eq!(calls[0].args.len(), 5);
    }

    #[test]
    fn test_signed_and_raw_arguments() {
        let config = ProjectConfig::from_toml(
            r#"
            [[step]]
            name = "oracle"
            contract = "Oracle"
            args = [
                { int = -5 },
                { int = "-170141183460469231731687303715884105728" },
                { bool = true },
                { bytes = "0xdeadbeef" },
            ]
            "#,
        )
        .unwrap();

        let plan = config.plan().unwrap();
        let args = &plan.steps()[0].args;
        assert!(matches!(args[0], ConstructorArg::Int(_)));
        assert!(matches!(args[1], ConstructorArg::Int(_)));
        assert_eq!(args[2], ConstructorArg::Bool(true));
        assert_eq!(args[3], ConstructorArg::Bytes(Bytes::from(vec![0xde, 0xad, 0xbe, 0xef])));
    }
}
