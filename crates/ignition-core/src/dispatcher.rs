use std::fmt::Debug;

use alloy_primitives::{Address, Bytes, TxHash, B256};
use alloy_rpc_types_eth::TransactionRequest;
use async_trait::async_trait;
use auto_impl::auto_impl;
use serde::{Deserialize, Serialize};

use crate::{
    Artifact, CallFunctionInteraction, DeployContractInteraction, EvmValue,
    ReadEventArgumentInteraction, StaticCallInteraction,
};

/// Errors reported by a [`ChainDispatcher`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    /// The node could not be reached or rejected the request.
    ///
    /// The core does not retry these: they are returned to the caller unchanged.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// The call or the transaction reverted.
    #[error("Execution reverted: {message}")]
    Reverted {
        /// The revert description given by the node.
        message: String,
        /// The revert data, if the node returned any.
        return_data: Option<Bytes>,
    },
}

/// Result type of [`ChainDispatcher`] operations.
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

/// A block header summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockInfo {
    /// The block number.
    pub number: u64,
    /// The block hash.
    pub hash: B256,
}

/// A transaction known to the node, mined or pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkTransaction {
    /// The transaction hash.
    pub hash: TxHash,
    /// The sender.
    pub from: Address,
    /// The sender nonce.
    pub nonce: u64,
    /// The block the transaction was mined in, or `None` while pending.
    pub block_number: Option<u64>,
}

/// The receipt of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    /// The transaction hash.
    pub tx_hash: TxHash,
    /// The block the transaction was mined in.
    pub block_number: u64,
    /// Whether the transaction succeeded.
    pub status: bool,
    /// The created contract, for deployments.
    pub contract_address: Option<Address>,
}

/// Access to the chain the deployment runs against.
///
/// Every operation is a single request: implementations do not retry, and ABI encoding of calls
/// and constructor arguments happens behind this interface.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait ChainDispatcher: Debug + Send + Sync {
    /// The number of transactions sent by `address`, including pending ones.
    async fn get_pending_transaction_count(&self, address: Address) -> DispatchResult<u64>;

    /// The number of transactions of `address` mined in the latest block.
    async fn get_latest_transaction_count(&self, address: Address) -> DispatchResult<u64>;

    /// The latest block.
    async fn get_current_block(&self) -> DispatchResult<BlockInfo>;

    /// Reserves the next nonce of `address`.
    async fn allocate_next_nonce_for_account(&self, address: Address) -> DispatchResult<u64>;

    /// Builds the deployment transaction of a contract, linking libraries and encoding the
    /// constructor arguments.
    async fn construct_deploy_transaction(
        &self,
        artifact: &Artifact,
        interaction: &DeployContractInteraction,
        nonce: u64,
    ) -> DispatchResult<TransactionRequest>;

    /// Builds a function call transaction.
    async fn construct_call_transaction(
        &self,
        artifact: &Artifact,
        interaction: &CallFunctionInteraction,
        nonce: u64,
    ) -> DispatchResult<TransactionRequest>;

    /// Sends a transaction, returning its hash once the node accepted it.
    async fn send_tx(&self, tx: &TransactionRequest) -> DispatchResult<TxHash>;

    /// Performs a read-only call, returning the raw return data.
    async fn static_call_query(
        &self,
        artifact: &Artifact,
        interaction: &StaticCallInteraction,
    ) -> DispatchResult<Bytes>;

    /// Looks a transaction up. `None` means the node does not know it.
    async fn get_transaction(&self, tx_hash: TxHash) -> DispatchResult<Option<NetworkTransaction>>;

    /// The receipt of a transaction, once mined.
    async fn get_transaction_receipt(
        &self,
        tx_hash: TxHash,
    ) -> DispatchResult<Option<TransactionReceipt>>;

    /// Reads one argument of an event emitted by a mined transaction.
    async fn get_event_argument(
        &self,
        artifact: &Artifact,
        interaction: &ReadEventArgumentInteraction,
    ) -> DispatchResult<EvmValue>;
}
