//! Implementations of the `steep` subcommands.

use alloy_core::primitives::Address;
use anyhow::{Context, Result};
use comfy_table::{Table, presets::UTF8_FULL};
use steep_deploy::{
    ArtifactStore, ConstructorArg, DeploymentRecord, Network, NetworkConfig, Orchestrator, Origin,
    ResolvedPlan, RpcSubmitter, StepAction,
};

use crate::cli::{DeployArgs, NetworkArgs, OutputFormat};
use crate::project::Project;

/// Deploy the plan on the selected network and save the record.
pub async fn deploy(project: &Project, args: DeployArgs, format: OutputFormat) -> Result<()> {
    let network = Network::new(&args.target.network);
    let profile = project.config.network(&network)?;
    let plan = project.config.plan()?;
    let resolved = plan.resolve(&network)?;
    let plan_hash = resolved.content_hash();

    let record_path = DeploymentRecord::path_for(&project.records_dir(), &network);

    let submitter = RpcSubmitter::new(
        profile.submitter_config(),
        ArtifactStore::new(project.artifacts_dir()),
    )?;

    let chain_id = submitter
        .chain_id()
        .await
        .with_context(|| format!("Failed to reach network `{network}` at {}", profile.rpc_url))?;

    if let Some(expected) = profile.chain_id
        && expected != chain_id
    {
        anyhow::bail!(
            "Network `{network}` expects chain id {expected}, but the node reports {chain_id}"
        );
    }

    if !args.redeploy
        && let Some(record) = DeploymentRecord::load_if_exists(&record_path)?
        && record.is_current(&plan_hash, chain_id)
    {
        tracing::info!(
            network = %network,
            chain_id,
            path = %record_path.display(),
            "Plan already deployed on this chain, skipping (use --redeploy to deploy again)"
        );
        return print_record(&record, format);
    }

    let account = resolve_account(&submitter, profile, args.from).await?;
    let orchestrator = Orchestrator::new(submitter);

    let run = tokio::select! {
        run = orchestrator.run(&plan, &network, account) => run?,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!(
                "Interrupted. Transactions already sent are not rolled back; check the network before deploying again"
            );
            anyhow::bail!("Deployment interrupted");
        }
    };

    let record = DeploymentRecord::from_run(&run, Some(chain_id));
    record.save_to_file(&record_path)?;
    print_record(&record, format)?;

    run.into_result()
        .with_context(|| format!("Deployment on `{network}` did not complete"))?;

    Ok(())
}

/// The deployer account: the flag, then the profile, then the node's first account.
async fn resolve_account(
    submitter: &RpcSubmitter,
    profile: &NetworkConfig,
    from: Option<Address>,
) -> Result<Address> {
    if let Some(account) = from.or(profile.from) {
        return Ok(account);
    }

    let accounts = submitter.accounts().await?;
    let account = accounts
        .first()
        .copied()
        .context("The node exposes no accounts; set `from` in the network profile")?;

    tracing::debug!(account = %account, "Using the node's first account");
    Ok(account)
}

/// Validate the plan for a network and show what would be sent.
pub fn check(project: &Project, args: NetworkArgs, format: OutputFormat) -> Result<()> {
    let network = Network::new(&args.network);
    project.config.network(&network)?;

    let plan = project.config.plan()?;
    let resolved = plan.resolve(&network)?;

    let artifacts = ArtifactStore::new(project.artifacts_dir());
    for step in &resolved.steps {
        if matches!(step.action, StepAction::Deploy { .. }) {
            artifacts.load(&step.contract)?;
        }
    }

    tracing::info!(
        network = %network,
        steps = resolved.steps.len(),
        deployments = resolved.deployments(),
        "Plan is valid"
    );

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&resolved)?);
        }
        OutputFormat::Table => println!("{}", plan_table(&resolved)),
    }

    Ok(())
}

/// Print the recorded deployment for a network.
pub fn status(project: &Project, args: NetworkArgs, format: OutputFormat) -> Result<()> {
    let network = Network::new(&args.network);
    let path = DeploymentRecord::path_for(&project.records_dir(), &network);

    let record = DeploymentRecord::load_if_exists(&path)?
        .with_context(|| format!("No deployment recorded for network `{network}`"))?;

    print_record(&record, format)
}

fn print_record(record: &DeploymentRecord, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(record)?),
        OutputFormat::Table => {
            println!("{} ({}) from {}", record.network, record.status, record.account);
            println!("{}", record_table(record));
            if let Some(failure) = &record.failure {
                println!(
                    "Failed at step {} (`{}`) during {}: {}",
                    failure.step, failure.name, failure.phase, failure.error
                );
                if let Some(address) = failure.deployed_address {
                    println!(
                        "{} was created at {address} before the failure and is not listed above",
                        failure.contract
                    );
                }
            }
        }
    }
    Ok(())
}

fn record_table(record: &DeploymentRecord) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["#", "Step", "Contract", "Address", "Transaction"]);

    for contract in &record.contracts {
        let origin = match &contract.origin {
            Origin::Deployed { tx_hash, .. } => tx_hash.to_string(),
            Origin::Fixed => "fixed".to_string(),
        };
        table.add_row(vec![
            contract.index.to_string(),
            contract.name.clone(),
            contract.contract.to_string(),
            contract.address.to_string(),
            origin,
        ]);
    }

    table
}

fn plan_table(plan: &ResolvedPlan) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["#", "Step", "Contract", "Action", "Arguments"]);

    for step in &plan.steps {
        let (action, args) = match &step.action {
            StepAction::Deploy { args, calls } => {
                let mut lines = vec![describe_args(plan, args)];
                lines.extend(calls.iter().map(|call| {
                    format!("then {}({})", call.signature, describe_args(plan, &call.args))
                }));
                ("deploy".to_string(), lines.join("\n"))
            }
            StepAction::UseFixed(address) => (format!("use {address}"), String::new()),
        };

        table.add_row(vec![
            step.index.to_string(),
            step.name.clone(),
            step.contract.to_string(),
            action,
            args,
        ]);
    }

    table
}

/// Render arguments with references shown by step name.
fn describe_args(plan: &ResolvedPlan, args: &[ConstructorArg]) -> String {
    args.iter()
        .map(|arg| match arg {
            ConstructorArg::Uint(value) => value.to_string(),
            ConstructorArg::Int(value) => value.to_string(),
            ConstructorArg::Address(address) => address.to_string(),
            ConstructorArg::Bool(value) => value.to_string(),
            ConstructorArg::String(value) => format!("{value:?}"),
            ConstructorArg::Bytes(value) => value.to_string(),
            ConstructorArg::Ref(index) => match plan.steps.get(*index) {
                Some(step) => format!("&{}", step.name),
                None => format!("&{index}"),
            },
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use alloy_core::primitives::U256;
    use steep_deploy::{ContractId, DeployedContract, PlanState, ResolvedStep};

    use super::*;

    fn resolved() -> ResolvedPlan {
        ResolvedPlan {
            network: Network::from("development"),
            steps: vec![
                ResolvedStep {
                    index: 0,
                    name: "token".to_string(),
                    contract: ContractId::from("ProductToken"),
                    action: StepAction::UseFixed(Address::repeat_byte(0x11)),
                },
                ResolvedStep {
                    index: 1,
                    name: "dex".to_string(),
                    contract: ContractId::from("Exchange"),
                    action: StepAction::Deploy {
                        args: vec![ConstructorArg::Ref(0), ConstructorArg::Uint(U256::from(500))],
                        calls: vec![],
                    },
                },
            ],
        }
    }

    #[test]
    fn test_describe_args_names_references() {
        let plan = resolved();
        let args = [
            ConstructorArg::Ref(0),
            ConstructorArg::uint(500),
            ConstructorArg::string("Kalon Tea"),
            ConstructorArg::Bool(true),
        ];

        assert_eq!(describe_args(&plan, &args), r#"&token, 500, "Kalon Tea", true"#);
    }

    #[test]
    fn test_plan_table_rows() {
        let rendered = plan_table(&resolved()).to_string();

        assert!(rendered.contains("ProductToken"));
        assert!(rendered.contains("deploy"));
        assert!(rendered.contains("&token"));
    }

    #[test]
    fn test_record_table_marks_fixed() {
        let record = DeploymentRecord {
            network: Network::from("development"),
            chain_id: None,
            account: Address::repeat_byte(0x01),
            plan_hash: "ab".repeat(32),
            status: PlanState::Completed,
            deployed_at: 0,
            steep_version: "0.1.0".to_string(),
            contracts: vec![DeployedContract {
                index: 0,
                name: "token".to_string(),
                contract: ContractId::from("ProductToken"),
                address: Address::repeat_byte(0x11),
                origin: Origin::Fixed,
            }],
            failure: None,
        };

        let rendered = record_table(&record).to_string();
        assert!(rendered.contains("fixed"));
        assert!(rendered.contains("token"));
    }
}
