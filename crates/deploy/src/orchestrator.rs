//! Deployment execution engine.
//!
//! Steps run strictly one after another: every transaction is awaited until it
//! is mined before the next one is sent, because later steps need the concrete
//! addresses of earlier ones. There are no retries. The first failure aborts the
//! plan and whatever was confirmed before it is handed back to the caller.

use alloy_core::dyn_abi::DynSolValue;
use alloy_core::primitives::{Address, TxHash};
use serde::{Deserialize, Serialize};

use crate::{
    ConstructorArg, ContractId, DeploymentError, DeploymentPlan, DeploymentStepError, Network,
    PlanValidationError, PostDeployCall, ResolvedPlan, ResolvedStep, StepAction, StepPhase,
    SubmitError,
    submitter::{CallRequest, CreationRequest, TransactionSubmitter},
};

/// How a step obtained its address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Deployed {
        tx_hash: TxHash,
        block_number: Option<u64>,
    },
    Fixed,
}

/// The output of one executed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedContract {
    pub index: usize,
    pub name: String,
    pub contract: ContractId,
    pub address: Address,
    pub origin: Origin,
}

impl DeployedContract {
    /// The value substituted for references to this step.
    pub fn handle(&self) -> DynSolValue {
        DynSolValue::Address(self.address)
    }
}

/// Lifecycle of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum StepState {
    Pending,
    Submitted(TxHash),
    Confirmed(Address),
    Failed,
}

/// Lifecycle of a whole plan. `Completed` and `Aborted` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlanState {
    Pending,
    Running,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepProgress {
    pub index: usize,
    pub name: String,
    pub contract: ContractId,
    pub state: StepState,
}

/// Everything that happened while executing a plan.
#[derive(Debug)]
pub struct DeploymentRun {
    network: Network,
    account: Address,
    plan_hash: String,
    state: PlanState,
    steps: Vec<StepProgress>,
    outputs: Vec<DeployedContract>,
    failure: Option<DeploymentStepError>,
}

impl DeploymentRun {
    fn new(plan: &ResolvedPlan, account: Address) -> Self {
        let steps = plan
            .steps
            .iter()
            .map(|step| StepProgress {
                index: step.index,
                name: step.name.clone(),
                contract: step.contract.clone(),
                state: StepState::Pending,
            })
            .collect();

        Self {
            network: plan.network.clone(),
            account,
            plan_hash: plan.content_hash(),
            state: PlanState::Pending,
            steps,
            outputs: Vec::new(),
            failure: None,
        }
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn account(&self) -> Address {
        self.account
    }

    pub fn plan_hash(&self) -> &str {
        &self.plan_hash
    }

    pub fn state(&self) -> PlanState {
        self.state
    }

    pub fn steps(&self) -> &[StepProgress] {
        &self.steps
    }

    /// Confirmed outputs, in step order.
    pub fn outputs(&self) -> &[DeployedContract] {
        &self.outputs
    }

    pub fn failure(&self) -> Option<&DeploymentStepError> {
        self.failure.as_ref()
    }

    pub fn into_result(self) -> Result<Vec<DeployedContract>, DeploymentError> {
        match self.failure {
            None => Ok(self.outputs),
            Some(failure) => Err(DeploymentError::Aborted {
                failure,
                completed: self.outputs,
            }),
        }
    }

    fn addresses(&self) -> Vec<Address> {
        self.outputs.iter().map(|output| output.address).collect()
    }

    fn set_step_state(&mut self, index: usize, state: StepState) {
        if let Some(step) = self.steps.get_mut(index) {
            tracing::debug!(step = index, from = %step.state, to = %state, "Step state changed");
            step.state = state;
        }
    }

    fn set_plan_state(&mut self, state: PlanState) {
        tracing::debug!(from = %self.state, to = %state, "Plan state changed");
        self.state = state;
    }

    fn record(&mut self, output: DeployedContract) {
        self.set_step_state(output.index, StepState::Confirmed(output.address));
        self.outputs.push(output);
    }

    fn abort(&mut self, failure: DeploymentStepError) {
        self.set_step_state(failure.step, StepState::Failed);
        self.set_plan_state(PlanState::Aborted);
        self.failure = Some(failure);
    }
}

/// Substitute references in `args` with the addresses recorded so far.
fn substitute(args: &[ConstructorArg], addresses: &[Address]) -> Vec<DynSolValue> {
    args.iter()
        .map(|arg| {
            arg.resolve(addresses)
                .expect("references are validated to point at confirmed steps")
        })
        .collect()
}

fn step_error(
    step: &ResolvedStep,
    phase: StepPhase,
    deployed_address: Option<Address>,
    source: SubmitError,
) -> DeploymentStepError {
    DeploymentStepError {
        step: step.index,
        name: step.name.clone(),
        contract: step.contract.clone(),
        phase,
        deployed_address,
        source,
    }
}

/// Runs deployment plans against a [`TransactionSubmitter`].
#[derive(Debug, Clone)]
pub struct Orchestrator<S> {
    submitter: S,
}

impl<S: TransactionSubmitter> Orchestrator<S> {
    pub fn new(submitter: S) -> Self {
        Self { submitter }
    }

    pub fn submitter(&self) -> &S {
        &self.submitter
    }

    /// Deploy `plan` on `network` from `account`.
    ///
    /// Returns one output per step, in step order. On failure the outputs of the
    /// steps confirmed before it are carried by [`DeploymentError::Aborted`].
    pub async fn execute(
        &self,
        plan: &DeploymentPlan,
        network: &Network,
        account: Address,
    ) -> Result<Vec<DeployedContract>, DeploymentError> {
        self.run(plan, network, account).await?.into_result()
    }

    /// Like [`Orchestrator::execute`], but keeps the per-step states.
    ///
    /// Validation errors are returned before anything is submitted.
    pub async fn run(
        &self,
        plan: &DeploymentPlan,
        network: &Network,
        account: Address,
    ) -> Result<DeploymentRun, PlanValidationError> {
        let resolved = plan.resolve(network)?;
        let mut run = DeploymentRun::new(&resolved, account);

        tracing::info!(
            network = %network,
            account = %account,
            steps = resolved.steps.len(),
            deployments = resolved.deployments(),
            "Starting deployment plan..."
        );
        run.set_plan_state(PlanState::Running);

        for step in &resolved.steps {
            let outcome = match &step.action {
                StepAction::UseFixed(address) => {
                    tracing::info!(
                        step = step.index,
                        name = %step.name,
                        contract = %step.contract,
                        address = %address,
                        "Using fixed address, skipping deployment"
                    );
                    Ok(DeployedContract {
                        index: step.index,
                        name: step.name.clone(),
                        contract: step.contract.clone(),
                        address: *address,
                        origin: Origin::Fixed,
                    })
                }
                StepAction::Deploy { args, calls } => {
                    self.deploy_step(&mut run, step, args, calls, account).await
                }
            };

            match outcome {
                Ok(output) => run.record(output),
                Err(failure) => {
                    tracing::error!(
                        step = failure.step,
                        name = %failure.name,
                        contract = %failure.contract,
                        phase = %failure.phase,
                        error = %failure.source,
                        confirmed = run.outputs.len(),
                        "Deployment step failed, aborting plan"
                    );
                    run.abort(failure);
                    return Ok(run);
                }
            }
        }

        run.set_plan_state(PlanState::Completed);
        tracing::info!(
            network = %network,
            deployed = run.outputs.len(),
            "Deployment plan complete"
        );

        Ok(run)
    }

    async fn deploy_step(
        &self,
        run: &mut DeploymentRun,
        step: &ResolvedStep,
        args: &[ConstructorArg],
        calls: &[PostDeployCall],
        account: Address,
    ) -> Result<DeployedContract, DeploymentStepError> {
        let mut addresses = run.addresses();

        tracing::info!(
            step = step.index,
            name = %step.name,
            contract = %step.contract,
            "Deploying contract..."
        );

        let tx_hash = self
            .submitter
            .send_creation(CreationRequest {
                contract: step.contract.clone(),
                args: substitute(args, &addresses),
                from: account,
            })
            .await
            .map_err(|e| step_error(step, StepPhase::Creation, None, e))?;

        run.set_step_state(step.index, StepState::Submitted(tx_hash));
        tracing::info!(step = step.index, tx_hash = %tx_hash, "Creation transaction submitted");

        let receipt = self
            .submitter
            .wait_for_receipt(tx_hash)
            .await
            .map_err(|e| step_error(step, StepPhase::Creation, None, e))?;

        let address = receipt.contract_address.ok_or_else(|| {
            step_error(
                step,
                StepPhase::Creation,
                None,
                SubmitError::MissingContractAddress { tx_hash },
            )
        })?;

        tracing::info!(
            step = step.index,
            name = %step.name,
            address = %address,
            block = ?receipt.block_number,
            "Contract deployed"
        );

        // Calls may reference the contract that was just deployed.
        addresses.push(address);

        for (index, call) in calls.iter().enumerate() {
            let phase = StepPhase::Call {
                index,
                signature: call.signature.clone(),
            };

            let call_hash = self
                .submitter
                .send_call(CallRequest {
                    to: address,
                    from: account,
                    signature: call.signature.clone(),
                    args: substitute(&call.args, &addresses),
                })
                .await
                .map_err(|e| step_error(step, phase.clone(), Some(address), e))?;

            self.submitter
                .wait_for_receipt(call_hash)
                .await
                .map_err(|e| step_error(step, phase, Some(address), e))?;

            tracing::info!(
                step = step.index,
                signature = %call.signature,
                tx_hash = %call_hash,
                "Post-deployment call confirmed"
            );
        }

        Ok(DeployedContract {
            index: step.index,
            name: step.name.clone(),
            contract: step.contract.clone(),
            address,
            origin: Origin::Deployed {
                tx_hash,
                block_number: receipt.block_number,
            },
        })
    }
}
