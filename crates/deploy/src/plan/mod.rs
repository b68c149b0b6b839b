//! Deployment plans.
//!
//! A [`DeploymentPlan`] is an ordered list of [`PlanStep`]s. Later steps may take
//! the address produced by an earlier step as an argument through
//! [`ConstructorArg::Ref`]. Before execution a plan is resolved against a
//! [`Network`], which turns every step into a [`StepAction`]: either a deployment
//! or a fixed, already-deployed address.
//!
//! # Example
//!
//! ```
//! use steep_deploy::{ConstructorArg, DeploymentPlan, PlanStep};
//!
//! let plan = DeploymentPlan::new()
//!     .then(PlanStep::new("token", "ProductToken").arg(ConstructorArg::uint(330000)))
//!     .then(PlanStep::new("dex", "Exchange").arg(ConstructorArg::Ref(0)));
//!
//! assert!(plan.validate().is_ok());
//! ```

mod args;
mod resolve;

use std::collections::{BTreeMap, HashMap};

use alloy_core::primitives::Address;
use serde::{Deserialize, Serialize};

pub use args::{ConstructorArg, encode_arguments, encode_call, parse_amount, parse_signed};
pub use resolve::{ResolvedPlan, ResolvedStep, StepAction};

use crate::{ContractId, Network, PlanValidationError};

/// A call made on a freshly deployed contract once its creation is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostDeployCall {
    /// Canonical function signature, e.g. `createToken(string,uint32,uint256)`.
    pub signature: String,
    #[serde(default)]
    pub args: Vec<ConstructorArg>,
}

impl PostDeployCall {
    pub fn new(signature: impl Into<String>, args: Vec<ConstructorArg>) -> Self {
        Self {
            signature: signature.into(),
            args,
        }
    }
}

/// One contract of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    pub name: String,
    pub contract: ContractId,
    #[serde(default)]
    pub args: Vec<ConstructorArg>,
    /// Networks on which the contract already lives at a known address.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub overrides: BTreeMap<Network, Address>,
    /// Never deployed by this plan. Every target network needs an override.
    #[serde(default)]
    pub external: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<PostDeployCall>,
}

impl PlanStep {
    pub fn new(name: impl Into<String>, contract: impl Into<ContractId>) -> Self {
        Self {
            name: name.into(),
            contract: contract.into(),
            args: Vec::new(),
            overrides: BTreeMap::new(),
            external: false,
            calls: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: ConstructorArg) -> Self {
        self.args.push(arg);
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = ConstructorArg>) -> Self {
        self.args.extend(args);
        self
    }

    /// Use `address` instead of deploying when the plan runs on `network`.
    pub fn fixed_on(mut self, network: impl Into<Network>, address: Address) -> Self {
        self.overrides.insert(network.into(), address);
        self
    }

    pub fn external(mut self) -> Self {
        self.external = true;
        self
    }

    pub fn call(mut self, call: PostDeployCall) -> Self {
        self.calls.push(call);
        self
    }

    fn resolve(
        &self,
        index: usize,
        network: &Network,
    ) -> Result<ResolvedStep, PlanValidationError> {
        let action = match self.overrides.get(network) {
            Some(address) => StepAction::UseFixed(*address),
            None if self.external => {
                return Err(PlanValidationError::MissingNetworkOverride {
                    step: index,
                    name: self.name.clone(),
                    contract: self.contract.clone(),
                    network: network.clone(),
                });
            }
            None => StepAction::Deploy {
                args: self.args.clone(),
                calls: self.calls.clone(),
            },
        };

        Ok(ResolvedStep {
            index,
            name: self.name.clone(),
            contract: self.contract.clone(),
            action,
        })
    }
}

/// Ordered list of contracts to deploy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    steps: Vec<PlanStep>,
}

impl DeploymentPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_steps(steps: Vec<PlanStep>) -> Self {
        Self { steps }
    }

    /// Append a step after every step already in the plan.
    pub fn then(mut self, step: PlanStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Check the plan without looking at any network.
    ///
    /// Constructor arguments may only reference strictly earlier steps. Calls run
    /// after their own step is confirmed and may also reference that step.
    pub fn validate(&self) -> Result<(), PlanValidationError> {
        let mut names: HashMap<&str, usize> = HashMap::new();

        for (index, step) in self.steps.iter().enumerate() {
            if let Some(&first) = names.get(step.name.as_str()) {
                return Err(PlanValidationError::DuplicateStepName {
                    step: index,
                    first,
                    name: step.name.clone(),
                });
            }
            names.insert(step.name.as_str(), index);

            for referenced in step.args.iter().filter_map(ConstructorArg::reference) {
                self.check_reference(index, step, referenced, false)?;
            }

            for call in &step.calls {
                for referenced in call.args.iter().filter_map(ConstructorArg::reference) {
                    self.check_reference(index, step, referenced, true)?;
                }
            }
        }

        Ok(())
    }

    fn check_reference(
        &self,
        index: usize,
        step: &PlanStep,
        referenced: usize,
        allow_self: bool,
    ) -> Result<(), PlanValidationError> {
        if referenced >= self.steps.len() {
            return Err(PlanValidationError::UnknownReference {
                step: index,
                name: step.name.clone(),
                referenced,
                len: self.steps.len(),
            });
        }

        if referenced > index || (referenced == index && !allow_self) {
            return Err(PlanValidationError::ForwardReference {
                step: index,
                name: step.name.clone(),
                referenced,
            });
        }

        Ok(())
    }

    /// Validate the plan and pick, for every step, what to do on `network`.
    pub fn resolve(&self, network: &Network) -> Result<ResolvedPlan, PlanValidationError> {
        self.validate()?;

        let steps = self
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| step.resolve(index, network))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ResolvedPlan {
            network: network.clone(),
            steps,
        })
    }
}
