//! JSON-RPC transaction submitter.
//!
//! Transactions are sent with `eth_sendTransaction`, so the deployer account must
//! be unlocked on the node (Ganache, Anvil and Hardhat dev accounts are).

use std::future::Future;
use std::time::Duration;

use alloy_core::primitives::{Address, Bytes, TxHash, U64};
use backon::{ConstantBuilder, Retryable};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{CallRequest, CreationRequest, Receipt, TransactionSubmitter};
use crate::{
    ArtifactStore, SubmitError,
    plan::{encode_arguments, encode_call},
    rpc,
};

/// Default interval between receipt polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default time to wait for a transaction to be mined.
pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone)]
pub struct RpcSubmitterConfig {
    pub rpc_url: Url,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
    pub confirmation_timeout: Duration,
    /// Gas limit for every transaction. The node estimates when unset.
    pub gas: Option<u64>,
}

impl RpcSubmitterConfig {
    pub fn new(rpc_url: Url) -> Self {
        Self {
            rpc_url,
            request_timeout: rpc::DEFAULT_REQUEST_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            confirmation_timeout: DEFAULT_CONFIRMATION_TIMEOUT,
            gas: None,
        }
    }

    /// Number of receipt polls that fit in the confirmation timeout.
    fn max_polls(&self) -> usize {
        let interval = self.poll_interval.as_millis().max(1);
        (self.confirmation_timeout.as_millis() / interval).max(1) as usize
    }
}

#[derive(Debug, Serialize)]
struct TransactionRequest {
    from: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<Address>,
    data: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    gas: Option<U64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RpcReceipt {
    transaction_hash: TxHash,
    #[serde(default)]
    block_number: Option<U64>,
    #[serde(default)]
    contract_address: Option<Address>,
    /// Absent on pre-Byzantium chains.
    #[serde(default)]
    status: Option<U64>,
}

impl RpcReceipt {
    fn into_receipt(self) -> Result<Receipt, SubmitError> {
        if self.status == Some(U64::ZERO) {
            return Err(SubmitError::Reverted {
                tx_hash: self.transaction_hash,
            });
        }

        Ok(Receipt {
            tx_hash: self.transaction_hash,
            block_number: self.block_number.map(|n| n.to::<u64>()),
            contract_address: self.contract_address,
        })
    }
}

/// Outcome of a single receipt poll that did not yield a receipt.
#[derive(Debug)]
enum ReceiptPoll {
    Pending,
    Failed(SubmitError),
}

/// Submits transactions to a node over HTTP JSON-RPC.
#[derive(Debug, Clone)]
pub struct RpcSubmitter {
    client: reqwest::Client,
    config: RpcSubmitterConfig,
    artifacts: ArtifactStore,
}

impl RpcSubmitter {
    pub fn new(config: RpcSubmitterConfig, artifacts: ArtifactStore) -> anyhow::Result<Self> {
        let client = rpc::create_client(config.request_timeout)?;
        Ok(Self {
            client,
            config,
            artifacts,
        })
    }

    pub fn config(&self) -> &RpcSubmitterConfig {
        &self.config
    }

    /// The node's chain id (`eth_chainId`).
    pub async fn chain_id(&self) -> anyhow::Result<u64> {
        let chain_id: String = rpc::json_rpc_call(
            &self.client,
            self.config.rpc_url.as_str(),
            "eth_chainId",
            vec![],
        )
        .await?;
        rpc::parse_quantity(&chain_id)
    }

    /// Accounts the node signs for (`eth_accounts`).
    pub async fn accounts(&self) -> anyhow::Result<Vec<Address>> {
        rpc::json_rpc_call(
            &self.client,
            self.config.rpc_url.as_str(),
            "eth_accounts",
            vec![],
        )
        .await
    }

    async fn send_transaction(&self, request: TransactionRequest) -> Result<TxHash, SubmitError> {
        let params = serde_json::to_value(&request).map_err(|e| SubmitError::Rpc(e.into()))?;

        rpc::json_rpc_call(
            &self.client,
            self.config.rpc_url.as_str(),
            "eth_sendTransaction",
            vec![params],
        )
        .await
        .map_err(SubmitError::Rpc)
    }

    async fn fetch_receipt(&self, tx_hash: TxHash) -> Result<Option<RpcReceipt>, SubmitError> {
        rpc::json_rpc_call(
            &self.client,
            self.config.rpc_url.as_str(),
            "eth_getTransactionReceipt",
            vec![serde_json::json!(tx_hash)],
        )
        .await
        .map_err(SubmitError::Rpc)
    }
}

impl TransactionSubmitter for RpcSubmitter {
    async fn send_creation(&self, request: CreationRequest) -> Result<TxHash, SubmitError> {
        let artifact = self.artifacts.load(&request.contract)?;

        let mut data = artifact.bytecode.to_vec();
        data.extend(encode_arguments(&request.args));

        tracing::debug!(
            contract = %request.contract,
            from = %request.from,
            size = data.len(),
            "Sending creation transaction"
        );

        self.send_transaction(TransactionRequest {
            from: request.from,
            to: None,
            data: data.into(),
            gas: self.config.gas.map(U64::from),
        })
        .await
    }

    async fn send_call(&self, request: CallRequest) -> Result<TxHash, SubmitError> {
        let data = encode_call(&request.signature, &request.args).map_err(|e| {
            SubmitError::InvalidCall {
                signature: request.signature.clone(),
                reason: format!("{e:#}"),
            }
        })?;

        tracing::debug!(
            to = %request.to,
            from = %request.from,
            signature = %request.signature,
            "Sending call transaction"
        );

        self.send_transaction(TransactionRequest {
            from: request.from,
            to: Some(request.to),
            data,
            gas: self.config.gas.map(U64::from),
        })
        .await
    }

    async fn wait_for_receipt(&self, tx_hash: TxHash) -> Result<Receipt, SubmitError> {
        poll_receipt(&self.config, tx_hash, || self.fetch_receipt(tx_hash)).await
    }
}

/// Call `fetch` every poll interval until it yields a receipt.
///
/// A missing receipt is retried until the confirmation timeout is spent, which
/// is reported as [`SubmitError::Timeout`]. Any other error ends polling at once.
async fn poll_receipt<F, Fut>(
    config: &RpcSubmitterConfig,
    tx_hash: TxHash,
    mut fetch: F,
) -> Result<Receipt, SubmitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<RpcReceipt>, SubmitError>>,
{
    let backoff = ConstantBuilder::default()
        .with_delay(config.poll_interval)
        .with_max_times(config.max_polls());

    let polled = (|| {
        let fetched = fetch();
        async move {
            match fetched.await {
                Ok(Some(receipt)) => Ok(receipt),
                Ok(None) => Err(ReceiptPoll::Pending),
                Err(e) => Err(ReceiptPoll::Failed(e)),
            }
        }
    })
    .retry(backoff)
    .sleep(tokio::time::sleep)
    .when(|poll| matches!(poll, ReceiptPoll::Pending))
    .notify(|_, after| {
        tracing::trace!(tx_hash = %tx_hash, ?after, "Transaction not mined yet, polling again...");
    })
    .await;

    match polled {
        Ok(receipt) => receipt.into_receipt(),
        Err(ReceiptPoll::Pending) => Err(SubmitError::Timeout {
            tx_hash,
            waited: config.confirmation_timeout,
        }),
        Err(ReceiptPoll::Failed(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn tx_hash() -> TxHash {
        TxHash::repeat_byte(0xaa)
    }

    #[test]
    fn test_receipt_success() {
        let raw: RpcReceipt = serde_json::from_value(json!({
            "transactionHash": tx_hash(),
            "blockNumber": "0x10",
            "contractAddress": "0x5fbdb2315678afecb367f032d93f642f64180aa3",
            "status": "0x1"
        }))
        .unwrap();

        let receipt = raw.into_receipt().unwrap();
        assert_eq!(receipt.block_number, Some(16));
        assert_eq!(
            receipt.contract_address,
            Some("0x5fbdb2315678afecb367f032d93f642f64180aa3".parse().unwrap())
        );
    }

    #[test]
    fn test_receipt_reverted() {
        let raw: RpcReceipt = serde_json::from_value(json!({
            "transactionHash": tx_hash(),
            "blockNumber": "0x10",
            "contractAddress": null,
            "status": "0x0"
        }))
        .unwrap();

        assert!(matches!(
            raw.into_receipt(),
            Err(SubmitError::Reverted { tx_hash: hash }) if hash == tx_hash()
        ));
    }

    #[test]
    fn test_receipt_without_status() {
        let raw: RpcReceipt = serde_json::from_value(json!({
            "transactionHash": tx_hash(),
            "blockNumber": "0x2"
        }))
        .unwrap();

        let receipt = raw.into_receipt().unwrap();
        assert_eq!(receipt.contract_address, None);
    }

    #[test]
    fn test_creation_request_omits_to() {
        let request = TransactionRequest {
            from: Address::repeat_byte(0x01),
            to: None,
            data: Bytes::from(vec![0x60, 0x80]),
            gas: Some(U64::from(6_000_000u64)),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("to").is_none());
        assert_eq!(value["data"], "0x6080");
        assert_eq!(value["gas"], "0x5b8d80");
    }

    fn fast_config() -> RpcSubmitterConfig {
        let mut config = RpcSubmitterConfig::new("http://127.0.0.1:8545".parse().unwrap());
        config.poll_interval = Duration::from_millis(1);
        config.confirmation_timeout = Duration::from_millis(5);
        config
    }

    fn mined() -> RpcReceipt {
        RpcReceipt {
            transaction_hash: tx_hash(),
            block_number: Some(U64::from(7u64)),
            contract_address: Some(Address::repeat_byte(0x77)),
            status: Some(U64::from(1u64)),
        }
    }

    #[tokio::test]
    async fn test_poll_receipt_times_out() {
        let mut attempts = 0;
        let result = poll_receipt(&fast_config(), tx_hash(), || {
            attempts += 1;
            async { Ok(None) }
        })
        .await;

        assert!(matches!(
            result,
            Err(SubmitError::Timeout { tx_hash: hash, waited })
                if hash == tx_hash() && waited == Duration::from_millis(5)
        ));
        assert!(attempts > 1);
    }

    #[tokio::test]
    async fn test_poll_receipt_waits_for_mining() {
        let mut attempts = 0;
        let receipt = poll_receipt(&fast_config(), tx_hash(), || {
            attempts += 1;
            let found = (attempts == 3).then(mined);
            async move { Ok(found) }
        })
        .await
        .unwrap();

        assert_eq!(attempts, 3);
        assert_eq!(receipt.block_number, Some(7));
        assert_eq!(receipt.contract_address, Some(Address::repeat_byte(0x77)));
    }

    #[tokio::test]
    async fn test_poll_receipt_stops_on_rpc_error() {
        let mut attempts = 0;
        let result = poll_receipt(&fast_config(), tx_hash(), || {
            attempts += 1;
            async { Err(SubmitError::Rpc(anyhow::anyhow!("connection refused"))) }
        })
        .await;

        assert!(matches!(result, Err(SubmitError::Rpc(_))));
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn test_poll_receipt_reports_revert() {
        let reverted = RpcReceipt {
            status: Some(U64::ZERO),
            ..mined()
        };
        let mut pending = Some(reverted);
        let result = poll_receipt(&fast_config(), tx_hash(), || {
            let next = pending.take();
            async move { Ok(next) }
        })
        .await;

        assert!(matches!(result, Err(SubmitError::Reverted { .. })));
    }

    #[test]
    fn test_max_polls() {
        let mut config = RpcSubmitterConfig::new("http://127.0.0.1:8545".parse().unwrap());
        config.poll_interval = Duration::from_millis(500);
        config.confirmation_timeout = Duration::from_secs(10);
        assert_eq!(config.max_polls(), 20);

        config.confirmation_timeout = Duration::ZERO;
        assert_eq!(config.max_polls(), 1);
    }
}
