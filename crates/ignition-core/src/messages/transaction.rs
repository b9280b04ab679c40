//! Transaction-level journal messages: the lifecycle of one onchain action of a future.

use std::collections::BTreeMap;

use alloy_primitives::{Address, Bytes, TxHash, U256};
use alloy_rpc_types_eth::TransactionRequest;
use serde::{Deserialize, Serialize};

use crate::{EvmValue, ExecutionId, FutureId, NameOrIndex, OnchainActionKind};

/// A message folded into the onchain state of a future and kept in its history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, derive_more::From)]
#[serde(tag = "type")]
pub enum TransactionMessage {
    /// Requests an onchain action.
    #[serde(rename = "onchain-action")]
    Interaction(OnchainInteractionMessage),
    /// A transaction was built with an allocated nonce and is about to be sent.
    #[serde(rename = "onchain-transaction-request")]
    Request(OnchainTransactionRequest),
    /// A transaction was accepted by the node.
    #[serde(rename = "onchain-transaction-accept")]
    Accept(OnchainTransactionAccept),
    /// The current transaction is abandoned and may be sent again with a new nonce.
    #[serde(rename = "onchain-transaction-reset")]
    Reset(OnchainTransactionReset),
    /// The outcome of the current action.
    #[serde(rename = "onchain-result")]
    Result(OnchainResultMessage),
}

impl TransactionMessage {
    /// The id of the future this message belongs to.
    pub fn future_id(&self) -> &FutureId {
        match self {
            Self::Interaction(msg) => msg.future_id(),
            Self::Request(msg) => &msg.future_id,
            Self::Accept(msg) => &msg.future_id,
            Self::Reset(msg) => &msg.future_id,
            Self::Result(msg) => msg.future_id(),
        }
    }

    /// The execution this message belongs to.
    pub const fn execution_id(&self) -> ExecutionId {
        match self {
            Self::Interaction(msg) => msg.execution_id(),
            Self::Request(msg) => msg.execution_id,
            Self::Accept(msg) => msg.execution_id,
            Self::Reset(msg) => msg.execution_id,
            Self::Result(msg) => msg.execution_id(),
        }
    }
}

/// Requests one onchain action, transactional or read-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subtype")]
pub enum OnchainInteractionMessage {
    /// Deploys a contract.
    #[serde(rename = "deploy-contract")]
    DeployContract(DeployContractInteraction),
    /// Calls a contract function in a transaction.
    #[serde(rename = "call-function")]
    CallFunction(CallFunctionInteraction),
    /// Performs a read-only call.
    #[serde(rename = "static-call")]
    StaticCall(StaticCallInteraction),
    /// Reads an event argument from a mined transaction.
    #[serde(rename = "read-event-arg")]
    ReadEventArgument(ReadEventArgumentInteraction),
    /// Sends raw data.
    #[serde(rename = "send-data")]
    SendData(SendDataInteraction),
    /// Binds an existing contract.
    #[serde(rename = "contract-at")]
    ContractAt(ContractAtInteraction),
}

impl OnchainInteractionMessage {
    /// The id of the future this interaction belongs to.
    pub fn future_id(&self) -> &FutureId {
        match self {
            Self::DeployContract(msg) => &msg.future_id,
            Self::CallFunction(msg) => &msg.future_id,
            Self::StaticCall(msg) => &msg.future_id,
            Self::ReadEventArgument(msg) => &msg.future_id,
            Self::SendData(msg) => &msg.future_id,
            Self::ContractAt(msg) => &msg.future_id,
        }
    }

    /// The execution this interaction opens.
    pub const fn execution_id(&self) -> ExecutionId {
        match self {
            Self::DeployContract(msg) => msg.execution_id,
            Self::CallFunction(msg) => msg.execution_id,
            Self::StaticCall(msg) => msg.execution_id,
            Self::ReadEventArgument(msg) => msg.execution_id,
            Self::SendData(msg) => msg.execution_id,
            Self::ContractAt(msg) => msg.execution_id,
        }
    }

    /// The kind of onchain action.
    pub const fn kind(&self) -> OnchainActionKind {
        match self {
            Self::DeployContract(_) => OnchainActionKind::DeployContract,
            Self::CallFunction(_) => OnchainActionKind::CallFunction,
            Self::StaticCall(_) => OnchainActionKind::StaticCall,
            Self::ReadEventArgument(_) => OnchainActionKind::ReadEventArgument,
            Self::SendData(_) => OnchainActionKind::SendData,
            Self::ContractAt(_) => OnchainActionKind::ContractAt,
        }
    }

    /// The sender of the transaction, for transactional kinds.
    pub const fn from(&self) -> Option<Address> {
        match self {
            Self::DeployContract(msg) => Some(msg.from),
            Self::CallFunction(msg) => Some(msg.from),
            Self::SendData(msg) => Some(msg.from),
            Self::StaticCall(_) | Self::ReadEventArgument(_) | Self::ContractAt(_) => None,
        }
    }
}

/// Deploys a contract from its artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployContractInteraction {
    /// The future id.
    pub future_id: FutureId,
    /// The execution this message belongs to.
    pub execution_id: ExecutionId,
    /// The id of the future that owns the contract artifact.
    pub artifact_future_id: FutureId,
    /// The contract name.
    pub contract_name: String,
    /// The constructor arguments.
    pub constructor_args: Vec<EvmValue>,
    /// Library addresses to link, by library name.
    pub libraries: BTreeMap<String, Address>,
    /// Wei sent with the transaction.
    pub value: U256,
    /// The sender.
    pub from: Address,
}

/// Calls a contract function in a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFunctionInteraction {
    /// The future id.
    pub future_id: FutureId,
    /// The execution this message belongs to.
    pub execution_id: ExecutionId,
    /// The id of the future that owns the contract artifact.
    pub artifact_future_id: FutureId,
    /// The contract address.
    pub contract_address: Address,
    /// The function name or signature.
    pub function_name: String,
    /// The function arguments.
    pub args: Vec<EvmValue>,
    /// Wei sent with the transaction.
    pub value: U256,
    /// The sender.
    pub from: Address,
}

/// Performs a read-only call. The raw return data is decoded by the strategy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticCallInteraction {
    /// The future id.
    pub future_id: FutureId,
    /// The execution this message belongs to.
    pub execution_id: ExecutionId,
    /// The id of the future that owns the contract artifact.
    pub artifact_future_id: FutureId,
    /// The contract address.
    pub contract_address: Address,
    /// The function name or signature.
    pub function_name: String,
    /// The function arguments.
    pub args: Vec<EvmValue>,
    /// The sender.
    pub from: Address,
}

/// Reads one argument of an event emitted by a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadEventArgumentInteraction {
    /// The future id.
    pub future_id: FutureId,
    /// The execution this message belongs to.
    pub execution_id: ExecutionId,
    /// The id of the future that owns the contract artifact.
    pub artifact_future_id: FutureId,
    /// The event name.
    pub event_name: String,
    /// The event argument to read.
    pub argument_name: NameOrIndex,
    /// Which occurrence of the event to read.
    pub event_index: usize,
    /// The contract that emitted the event.
    pub emitter_address: Address,
    /// The transaction that emitted the event.
    pub tx_to_read_from: TxHash,
}

/// Sends raw data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendDataInteraction {
    /// The future id.
    pub future_id: FutureId,
    /// The execution this message belongs to.
    pub execution_id: ExecutionId,
    /// The recipient.
    pub to: Address,
    /// The transaction data.
    pub data: Bytes,
    /// Wei sent with the transaction.
    pub value: U256,
    /// The sender.
    pub from: Address,
}

/// Binds an existing contract to an artifact. Performing it needs no chain I/O.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAtInteraction {
    /// The future id.
    pub future_id: FutureId,
    /// The execution this message belongs to.
    pub execution_id: ExecutionId,
    /// The id of the future that owns the contract artifact.
    pub artifact_future_id: FutureId,
    /// The contract name.
    pub contract_name: String,
    /// The contract address.
    pub contract_address: Address,
}

/// A transaction built with an allocated nonce.
///
/// It is recorded before the transaction is sent, so that after a crash the engine knows the
/// nonce may already be consumed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnchainTransactionRequest {
    /// The future id.
    pub future_id: FutureId,
    /// The execution this message belongs to.
    pub execution_id: ExecutionId,
    /// The sender.
    pub from: Address,
    /// The allocated nonce.
    pub nonce: u64,
    /// The transaction to send.
    pub tx: TransactionRequest,
}

/// A transaction was accepted by the node under `tx_hash`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnchainTransactionAccept {
    /// The future id.
    pub future_id: FutureId,
    /// The execution this message belongs to.
    pub execution_id: ExecutionId,
    /// The hash of the accepted transaction.
    pub tx_hash: TxHash,
}

/// The current transaction of an execution is abandoned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnchainTransactionReset {
    /// The future id.
    pub future_id: FutureId,
    /// The execution this message belongs to.
    pub execution_id: ExecutionId,
}

/// The outcome of an onchain action.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subtype")]
pub enum OnchainResultMessage {
    /// The deployment transaction was mined.
    #[serde(rename = "deploy-contract-success")]
    DeployContractSuccess(DeployContractSuccessMessage),
    /// The call transaction was mined.
    #[serde(rename = "call-function-success")]
    CallFunctionSuccess(CallFunctionSuccessMessage),
    /// The read-only call returned.
    #[serde(rename = "static-call-success")]
    StaticCallSuccess(StaticCallSuccessMessage),
    /// The event argument was read.
    #[serde(rename = "read-event-arg-success")]
    ReadEventArgumentSuccess(ReadEventArgumentSuccessMessage),
    /// The send-data transaction was mined.
    #[serde(rename = "send-data-success")]
    SendDataSuccess(SendDataSuccessMessage),
    /// The existing contract was bound.
    #[serde(rename = "contract-at-success")]
    ContractAtSuccess(ContractAtSuccessMessage),
    /// The action failed.
    #[serde(rename = "failure")]
    Failure(OnchainFailureMessage),
}

impl OnchainResultMessage {
    /// The id of the future this result belongs to.
    pub fn future_id(&self) -> &FutureId {
        match self {
            Self::DeployContractSuccess(msg) => &msg.future_id,
            Self::CallFunctionSuccess(msg) => &msg.future_id,
            Self::StaticCallSuccess(msg) => &msg.future_id,
            Self::ReadEventArgumentSuccess(msg) => &msg.future_id,
            Self::SendDataSuccess(msg) => &msg.future_id,
            Self::ContractAtSuccess(msg) => &msg.future_id,
            Self::Failure(msg) => &msg.future_id,
        }
    }

    /// The execution this result closes.
    pub const fn execution_id(&self) -> ExecutionId {
        match self {
            Self::DeployContractSuccess(msg) => msg.execution_id,
            Self::CallFunctionSuccess(msg) => msg.execution_id,
            Self::StaticCallSuccess(msg) => msg.execution_id,
            Self::ReadEventArgumentSuccess(msg) => msg.execution_id,
            Self::SendDataSuccess(msg) => msg.execution_id,
            Self::ContractAtSuccess(msg) => msg.execution_id,
            Self::Failure(msg) => msg.execution_id,
        }
    }

    /// The action kind a success belongs to, or `None` for a failure.
    pub const fn success_kind(&self) -> Option<OnchainActionKind> {
        match self {
            Self::DeployContractSuccess(_) => Some(OnchainActionKind::DeployContract),
            Self::CallFunctionSuccess(_) => Some(OnchainActionKind::CallFunction),
            Self::StaticCallSuccess(_) => Some(OnchainActionKind::StaticCall),
            Self::ReadEventArgumentSuccess(_) => Some(OnchainActionKind::ReadEventArgument),
            Self::SendDataSuccess(_) => Some(OnchainActionKind::SendData),
            Self::ContractAtSuccess(_) => Some(OnchainActionKind::ContractAt),
            Self::Failure(_) => None,
        }
    }
}

/// The deployment transaction was mined.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployContractSuccessMessage {
    /// The future id.
    pub future_id: FutureId,
    /// The execution this message belongs to.
    pub execution_id: ExecutionId,
    /// The contract address.
    pub contract_address: Address,
    /// The mined transaction.
    pub tx_id: TxHash,
}

/// The call transaction was mined.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFunctionSuccessMessage {
    /// The future id.
    pub future_id: FutureId,
    /// The execution this message belongs to.
    pub execution_id: ExecutionId,
    /// The mined transaction.
    pub tx_id: TxHash,
}

/// The read-only call returned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticCallSuccessMessage {
    /// The future id.
    pub future_id: FutureId,
    /// The execution this message belongs to.
    pub execution_id: ExecutionId,
    /// The raw return data of the call.
    pub return_data: Bytes,
}

/// The event argument was read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadEventArgumentSuccessMessage {
    /// The future id.
    pub future_id: FutureId,
    /// The execution this message belongs to.
    pub execution_id: ExecutionId,
    /// The decoded value.
    pub result: EvmValue,
}

/// The send-data transaction was mined.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendDataSuccessMessage {
    /// The future id.
    pub future_id: FutureId,
    /// The execution this message belongs to.
    pub execution_id: ExecutionId,
    /// The mined transaction.
    pub tx_id: TxHash,
}

/// The existing contract was bound.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAtSuccessMessage {
    /// The future id.
    pub future_id: FutureId,
    /// The execution this message belongs to.
    pub execution_id: ExecutionId,
    /// The contract address.
    pub contract_address: Address,
}

/// An onchain action failed: the transaction reverted, or the call or query was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnchainFailureMessage {
    /// The future id.
    pub future_id: FutureId,
    /// The execution this message belongs to.
    pub execution_id: ExecutionId,
    /// Description of the failure as reported by the node.
    pub error: String,
    /// Revert data, when the node returned any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_data: Option<Bytes>,
}
