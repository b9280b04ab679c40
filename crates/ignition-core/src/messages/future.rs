//! Future-level journal messages: the start of a future and its terminal outcome.

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::{Address, Bytes, TxHash, U256};
use serde::{Deserialize, Serialize};

use crate::{EvmValue, ExecutionId, FutureId, FutureType, NameOrIndex};

/// Starts the execution of a future.
///
/// Every input is concrete at this point: references to other futures and runtime values have
/// already been resolved by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "futureType", rename_all = "kebab-case")]
pub enum FutureStartMessage {
    /// Starts a contract deployment.
    Deployment(DeploymentExecutionStartMessage),
    /// Starts a contract function call.
    Call(CallExecutionStartMessage),
    /// Starts a read-only function call.
    StaticCall(StaticCallExecutionStartMessage),
    /// Starts binding an existing contract.
    ContractAt(ContractAtExecutionStartMessage),
    /// Starts reading an event argument.
    ReadEventArgument(ReadEventArgumentExecutionStartMessage),
    /// Starts sending raw data.
    SendData(SendDataExecutionStartMessage),
}

impl FutureStartMessage {
    /// The id of the started future.
    pub fn future_id(&self) -> &FutureId {
        match self {
            Self::Deployment(msg) => &msg.future_id,
            Self::Call(msg) => &msg.future_id,
            Self::StaticCall(msg) => &msg.future_id,
            Self::ContractAt(msg) => &msg.future_id,
            Self::ReadEventArgument(msg) => &msg.future_id,
            Self::SendData(msg) => &msg.future_id,
        }
    }

    /// The type of the started future.
    pub const fn future_type(&self) -> FutureType {
        match self {
            Self::Deployment(_) => FutureType::Deployment,
            Self::Call(_) => FutureType::Call,
            Self::StaticCall(_) => FutureType::StaticCall,
            Self::ContractAt(_) => FutureType::ContractAt,
            Self::ReadEventArgument(_) => FutureType::ReadEventArgument,
            Self::SendData(_) => FutureType::SendData,
        }
    }

    /// The futures the started future waited on.
    pub fn dependencies(&self) -> &BTreeSet<FutureId> {
        match self {
            Self::Deployment(msg) => &msg.dependencies,
            Self::Call(msg) => &msg.dependencies,
            Self::StaticCall(msg) => &msg.dependencies,
            Self::ContractAt(msg) => &msg.dependencies,
            Self::ReadEventArgument(msg) => &msg.dependencies,
            Self::SendData(msg) => &msg.dependencies,
        }
    }

    /// Returns the message with `sender` as the sender of a future that does not name one.
    pub fn with_default_sender(mut self, sender: Address) -> Self {
        if let Some(from) = self.from_mut() {
            from.get_or_insert(sender);
        }
        self
    }

    fn from_mut(&mut self) -> Option<&mut Option<Address>> {
        match self {
            Self::Deployment(msg) => Some(&mut msg.from),
            Self::Call(msg) => Some(&mut msg.from),
            Self::StaticCall(msg) => Some(&mut msg.from),
            Self::SendData(msg) => Some(&mut msg.from),
            Self::ContractAt(_) | Self::ReadEventArgument(_) => None,
        }
    }
}

/// Starts a contract deployment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentExecutionStartMessage {
    /// The future id.
    pub future_id: FutureId,
    /// The name of the execution strategy.
    pub strategy: String,
    /// The futures this future waited on.
    pub dependencies: BTreeSet<FutureId>,
    /// The id of the future that owns the contract artifact.
    pub artifact_future_id: FutureId,
    /// The contract name.
    pub contract_name: String,
    /// The constructor arguments.
    pub constructor_args: Vec<EvmValue>,
    /// Library addresses to link, by library name.
    pub libraries: BTreeMap<String, Address>,
    /// Wei sent with the deployment.
    pub value: U256,
    /// The sender, or `None` for the default sender of the engine.
    ///
    /// The engine fills it in before recording the message.
    pub from: Option<Address>,
}

/// Starts a contract function call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallExecutionStartMessage {
    /// The future id.
    pub future_id: FutureId,
    /// The name of the execution strategy.
    pub strategy: String,
    /// The futures this future waited on.
    pub dependencies: BTreeSet<FutureId>,
    /// The id of the future that owns the contract artifact.
    pub artifact_future_id: FutureId,
    /// The called contract.
    pub contract_address: Address,
    /// The function name or signature.
    pub function_name: String,
    /// The function arguments.
    pub args: Vec<EvmValue>,
    /// Wei sent with the call.
    pub value: U256,
    /// The sender, or `None` for the default sender of the engine.
    ///
    /// The engine fills it in before recording the message.
    pub from: Option<Address>,
}

/// Starts a read-only function call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticCallExecutionStartMessage {
    /// The future id.
    pub future_id: FutureId,
    /// The name of the execution strategy.
    pub strategy: String,
    /// The futures this future waited on.
    pub dependencies: BTreeSet<FutureId>,
    /// The id of the future that owns the contract artifact.
    pub artifact_future_id: FutureId,
    /// The called contract.
    pub contract_address: Address,
    /// The function name or signature.
    pub function_name: String,
    /// The function arguments.
    pub args: Vec<EvmValue>,
    /// The output kept as the result of the future.
    #[serde(default)]
    pub name_or_index: NameOrIndex,
    /// The sender, or `None` for the default sender of the engine.
    ///
    /// The engine fills it in before recording the message.
    pub from: Option<Address>,
}

/// Starts binding an existing contract to an artifact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAtExecutionStartMessage {
    /// The future id.
    pub future_id: FutureId,
    /// The name of the execution strategy.
    pub strategy: String,
    /// The futures this future waited on.
    pub dependencies: BTreeSet<FutureId>,
    /// The id of the future that owns the contract artifact.
    pub artifact_future_id: FutureId,
    /// The contract name.
    pub contract_name: String,
    /// The address of the existing contract.
    pub address: Address,
}

/// Starts reading an event argument from a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadEventArgumentExecutionStartMessage {
    /// The future id.
    pub future_id: FutureId,
    /// The name of the execution strategy.
    pub strategy: String,
    /// The futures this future waited on.
    pub dependencies: BTreeSet<FutureId>,
    /// The id of the future that owns the emitter artifact.
    pub artifact_future_id: FutureId,
    /// The event name.
    pub event_name: String,
    /// The event argument to read.
    pub argument_name: NameOrIndex,
    /// The transaction that emitted the event.
    pub tx_to_read_from: TxHash,
    /// The contract that emitted the event.
    pub emitter_address: Address,
    /// Which occurrence of the event to read.
    pub event_index: usize,
}

/// Starts sending raw data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendDataExecutionStartMessage {
    /// The future id.
    pub future_id: FutureId,
    /// The name of the execution strategy.
    pub strategy: String,
    /// The futures this future waited on.
    pub dependencies: BTreeSet<FutureId>,
    /// The recipient.
    pub to: Address,
    /// The transaction data.
    pub data: Bytes,
    /// Wei sent with the transaction.
    pub value: U256,
    /// The sender, or `None` for the default sender of the engine.
    ///
    /// The engine fills it in before recording the message.
    pub from: Option<Address>,
}

/// The terminal (or pausing) outcome of a future.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, derive_more::From)]
#[serde(tag = "type")]
pub enum ExecutionResultMessage {
    /// The future succeeded.
    #[serde(rename = "execution-success")]
    Success(ExecutionSuccessMessage),
    /// The future failed.
    #[serde(rename = "execution-failure")]
    Failure(ExecutionFailureMessage),
    /// A transaction of the future was not mined in time.
    #[serde(rename = "execution-timeout")]
    Timeout(ExecutionTimeoutMessage),
    /// The future waits for external intervention.
    #[serde(rename = "execution-hold")]
    Hold(ExecutionHoldMessage),
}

impl ExecutionResultMessage {
    /// The id of the future this outcome belongs to.
    pub fn future_id(&self) -> &FutureId {
        match self {
            Self::Success(msg) => msg.future_id(),
            Self::Failure(msg) => &msg.future_id,
            Self::Timeout(msg) => &msg.future_id,
            Self::Hold(msg) => &msg.future_id,
        }
    }
}

/// The successful outcome of a future, one variant per future type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "subtype")]
pub enum ExecutionSuccessMessage {
    /// A contract was deployed.
    #[serde(rename = "deploy-contract")]
    DeployedContract(DeployedContractExecutionSuccess),
    /// A function was called.
    #[serde(rename = "call-function")]
    CalledFunction(CalledFunctionExecutionSuccess),
    /// A read-only call returned.
    #[serde(rename = "static-call")]
    StaticCall(StaticCallExecutionSuccess),
    /// An event argument was read.
    #[serde(rename = "read-event-arg")]
    ReadEventArgument(ReadEventArgumentExecutionSuccess),
    /// Raw data was sent.
    #[serde(rename = "send-data")]
    SendData(SendDataExecutionSuccess),
    /// An existing contract was bound.
    #[serde(rename = "contract-at")]
    ContractAt(ContractAtExecutionSuccess),
}

impl ExecutionSuccessMessage {
    /// The id of the future that succeeded.
    pub fn future_id(&self) -> &FutureId {
        match self {
            Self::DeployedContract(msg) => &msg.future_id,
            Self::CalledFunction(msg) => &msg.future_id,
            Self::StaticCall(msg) => &msg.future_id,
            Self::ReadEventArgument(msg) => &msg.future_id,
            Self::SendData(msg) => &msg.future_id,
            Self::ContractAt(msg) => &msg.future_id,
        }
    }

    /// The future type this success belongs to.
    pub const fn future_type(&self) -> FutureType {
        match self {
            Self::DeployedContract(_) => FutureType::Deployment,
            Self::CalledFunction(_) => FutureType::Call,
            Self::StaticCall(_) => FutureType::StaticCall,
            Self::ReadEventArgument(_) => FutureType::ReadEventArgument,
            Self::SendData(_) => FutureType::SendData,
            Self::ContractAt(_) => FutureType::ContractAt,
        }
    }
}

/// A contract was deployed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployedContractExecutionSuccess {
    /// The future id.
    pub future_id: FutureId,
    /// The deployed contract name.
    pub contract_name: String,
    /// The deployed contract address.
    pub contract_address: Address,
    /// The deployment transaction.
    pub tx_id: TxHash,
}

/// A function was called.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalledFunctionExecutionSuccess {
    /// The future id.
    pub future_id: FutureId,
    /// The called function.
    pub function_name: String,
    /// The called contract.
    pub contract_address: Address,
    /// The call transaction.
    pub tx_id: TxHash,
}

/// A read-only call returned.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaticCallExecutionSuccess {
    /// The future id.
    pub future_id: FutureId,
    /// The called function.
    pub function_name: String,
    /// The called contract.
    pub contract_address: Address,
    /// The selected output.
    pub result: EvmValue,
}

/// An event argument was read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadEventArgumentExecutionSuccess {
    /// The future id.
    pub future_id: FutureId,
    /// The event name.
    pub event_name: String,
    /// The read argument.
    pub argument_name: NameOrIndex,
    /// The argument value.
    pub result: EvmValue,
}

/// Raw data was sent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendDataExecutionSuccess {
    /// The future id.
    pub future_id: FutureId,
    /// The sent transaction.
    pub tx_id: TxHash,
}

/// An existing contract was bound.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractAtExecutionSuccess {
    /// The future id.
    pub future_id: FutureId,
    /// The contract name.
    pub contract_name: String,
    /// The contract address.
    pub contract_address: Address,
}

/// The future failed. Fixing it requires a change of the deployment module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFailureMessage {
    /// The future id.
    pub future_id: FutureId,
    /// Description of the failure.
    pub error: String,
}

/// A transaction of the future was not mined in time. The future is retried on the next run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTimeoutMessage {
    /// The future id.
    pub future_id: FutureId,
    /// The execution the transaction belongs to.
    pub execution_id: ExecutionId,
    /// The transaction that timed out.
    pub tx_hash: TxHash,
}

/// The future waits for manual intervention.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionHoldMessage {
    /// The future id.
    pub future_id: FutureId,
    /// Why the future was put on hold.
    pub reason: String,
}
