//! The boundary between the orchestrator and the chain.

mod rpc;

use std::future::Future;

use alloy_core::dyn_abi::DynSolValue;
use alloy_core::primitives::{Address, TxHash};

pub use rpc::{
    DEFAULT_CONFIRMATION_TIMEOUT, DEFAULT_POLL_INTERVAL, RpcSubmitter, RpcSubmitterConfig,
};

use crate::{ContractId, SubmitError};

/// A contract-creation transaction with fully resolved arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CreationRequest {
    pub contract: ContractId,
    pub args: Vec<DynSolValue>,
    pub from: Address,
}

/// A call on an already deployed contract.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    pub to: Address,
    pub from: Address,
    pub signature: String,
    pub args: Vec<DynSolValue>,
}

/// A confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
    /// Set for creation transactions.
    pub contract_address: Option<Address>,
}

/// Submits transactions and waits for them to be mined.
///
/// Compilation, signing and transport all live behind this trait. Implementations
/// report reverts and confirmation timeouts as errors rather than receipts.
pub trait TransactionSubmitter: Send + Sync {
    /// Send a creation transaction for `request.contract`, returning its hash.
    fn send_creation(
        &self,
        request: CreationRequest,
    ) -> impl Future<Output = Result<TxHash, SubmitError>> + Send;

    /// Send a call transaction, returning its hash.
    fn send_call(
        &self,
        request: CallRequest,
    ) -> impl Future<Output = Result<TxHash, SubmitError>> + Send;

    /// Block until `tx_hash` is mined successfully.
    fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<Receipt, SubmitError>> + Send;
}
