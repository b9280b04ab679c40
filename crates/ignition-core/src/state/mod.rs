//! Execution state of futures.
//!
//! The coarse [`ExecutionStatus`] of a future is layered on top of its [`OnchainState`] and its
//! history of transaction-level messages, which is what a strategy is replayed from.

use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::{Address, Bytes, TxHash, U256};
use serde::{Deserialize, Serialize};

use crate::{
    error::ensure_invariant, EvmValue, FutureId, FutureType, NameOrIndex, Result,
    TransactionMessage,
};

mod map;
pub use map::*;

mod onchain;
pub use onchain::*;

/// Coarse status of a future.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    /// The future is being executed.
    #[display("STARTED")]
    Started,
    /// The future waits for external intervention.
    #[display("HOLD")]
    Hold,
    /// A transaction of the future was not mined in time. Retried on the next run.
    #[display("TIMEOUT")]
    Timeout,
    /// The future succeeded.
    #[display("SUCCESS")]
    Success,
    /// The future failed.
    #[display("FAILED")]
    Failed,
}

/// Fields shared by the execution states of every future type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStateBase {
    /// The future id.
    pub id: FutureId,
    /// The name of the execution strategy.
    pub strategy: String,
    /// The coarse status.
    pub status: ExecutionStatus,
    /// The futures this future waited on.
    pub dependencies: BTreeSet<FutureId>,
    /// Every transaction-level message of the future, in order.
    pub history: Vec<TransactionMessage>,
    /// The current onchain action.
    pub onchain: OnchainState,
    /// The recorded error of a failed future, or the reason of a held one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ExecutionStateBase {
    /// Creates the base of a freshly started future.
    pub fn new(id: FutureId, strategy: String, dependencies: BTreeSet<FutureId>) -> Self {
        Self {
            id,
            strategy,
            status: ExecutionStatus::Started,
            dependencies,
            history: Vec::new(),
            onchain: OnchainState::default(),
            reason: None,
        }
    }

    fn ensure_success(&self, field: &str) -> Result<()> {
        ensure_invariant!(
            self.status == ExecutionStatus::Success,
            "Cannot read {field} of future {} with status {}",
            self.id,
            self.status
        );
        Ok(())
    }
}

macro_rules! result_accessor {
    ($(#[$doc:meta])* $name:ident: $ty:ty) => {
        $(#[$doc])*
        ///
        /// Reading it before the future succeeded is an invariant violation.
        pub fn $name(&self) -> Result<$ty> {
            self.base.ensure_success(stringify!($name))?;
            self.$name.clone().ok_or_else(|| {
                $crate::IgnitionError::invariant(format!(
                    "Future {} succeeded without {}",
                    self.base.id,
                    stringify!($name)
                ))
            })
        }
    };
}

/// Execution state of a contract deployment.
#[derive(
    Clone, Debug, PartialEq, Serialize, Deserialize, derive_more::Deref, derive_more::DerefMut,
)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentExecutionState {
    /// Common fields.
    #[serde(flatten)]
    #[deref]
    #[deref_mut]
    pub base: ExecutionStateBase,
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
    /// The sender, or `None` for the default sender.
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) contract_address: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) tx_id: Option<TxHash>,
}

impl DeploymentExecutionState {
    result_accessor!(
        /// The address of the deployed contract.
        contract_address: Address
    );
    result_accessor!(
        /// The deployment transaction.
        tx_id: TxHash
    );
}

/// Execution state of a contract function call.
#[derive(
    Clone, Debug, PartialEq, Serialize, Deserialize, derive_more::Deref, derive_more::DerefMut,
)]
#[serde(rename_all = "camelCase")]
pub struct CallExecutionState {
    /// Common fields.
    #[serde(flatten)]
    #[deref]
    #[deref_mut]
    pub base: ExecutionStateBase,
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
    /// The sender, or `None` for the default sender.
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) tx_id: Option<TxHash>,
}

impl CallExecutionState {
    result_accessor!(
        /// The call transaction.
        tx_id: TxHash
    );
}

/// Execution state of a read-only call.
#[derive(
    Clone, Debug, PartialEq, Serialize, Deserialize, derive_more::Deref, derive_more::DerefMut,
)]
#[serde(rename_all = "camelCase")]
pub struct StaticCallExecutionState {
    /// Common fields.
    #[serde(flatten)]
    #[deref]
    #[deref_mut]
    pub base: ExecutionStateBase,
    /// The id of the future that owns the contract artifact.
    pub artifact_future_id: FutureId,
    /// The called contract.
    pub contract_address: Address,
    /// The function name or signature.
    pub function_name: String,
    /// The function arguments.
    pub args: Vec<EvmValue>,
    /// The output kept as the result.
    pub name_or_index: NameOrIndex,
    /// The sender, or `None` for the default sender.
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) result: Option<EvmValue>,
}

impl StaticCallExecutionState {
    result_accessor!(
        /// The selected output of the call.
        result: EvmValue
    );
}

/// Execution state of the binding of an existing contract.
#[derive(
    Clone, Debug, PartialEq, Serialize, Deserialize, derive_more::Deref, derive_more::DerefMut,
)]
#[serde(rename_all = "camelCase")]
pub struct ContractAtExecutionState {
    /// Common fields.
    #[serde(flatten)]
    #[deref]
    #[deref_mut]
    pub base: ExecutionStateBase,
    /// The id of the future that owns the contract artifact.
    pub artifact_future_id: FutureId,
    /// The contract name.
    pub contract_name: String,
    /// The address given by the module.
    pub address: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) contract_address: Option<Address>,
}

impl ContractAtExecutionState {
    result_accessor!(
        /// The bound contract address.
        contract_address: Address
    );
}

/// Execution state of an event argument read.
#[derive(
    Clone, Debug, PartialEq, Serialize, Deserialize, derive_more::Deref, derive_more::DerefMut,
)]
#[serde(rename_all = "camelCase")]
pub struct ReadEventArgumentExecutionState {
    /// Common fields.
    #[serde(flatten)]
    #[deref]
    #[deref_mut]
    pub base: ExecutionStateBase,
    /// The id of the future that owns the emitter artifact.
    pub artifact_future_id: FutureId,
    /// The event name.
    pub event_name: String,
    /// The argument to read.
    pub argument_name: NameOrIndex,
    /// The transaction that emitted the event.
    pub tx_to_read_from: TxHash,
    /// The contract that emitted the event.
    pub emitter_address: Address,
    /// Which occurrence of the event to read.
    pub event_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) result: Option<EvmValue>,
}

impl ReadEventArgumentExecutionState {
    result_accessor!(
        /// The value of the argument.
        result: EvmValue
    );
}

/// Execution state of a raw data send.
#[derive(
    Clone, Debug, PartialEq, Serialize, Deserialize, derive_more::Deref, derive_more::DerefMut,
)]
#[serde(rename_all = "camelCase")]
pub struct SendDataExecutionState {
    /// Common fields.
    #[serde(flatten)]
    #[deref]
    #[deref_mut]
    pub base: ExecutionStateBase,
    /// The recipient.
    pub to: Address,
    /// The transaction data.
    pub data: Bytes,
    /// Wei sent with the transaction.
    pub value: U256,
    /// The sender, or `None` for the default sender.
    pub from: Option<Address>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) tx_id: Option<TxHash>,
}

impl SendDataExecutionState {
    result_accessor!(
        /// The sent transaction.
        tx_id: TxHash
    );
}

/// Execution state of a future, one variant per future type.
///
/// The variant is fixed when the future starts and never changes afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "futureType", rename_all = "kebab-case")]
pub enum ExecutionState {
    /// A contract deployment.
    Deployment(DeploymentExecutionState),
    /// A function call.
    Call(CallExecutionState),
    /// A read-only call.
    StaticCall(StaticCallExecutionState),
    /// An existing contract.
    ContractAt(ContractAtExecutionState),
    /// An event argument read.
    ReadEventArgument(ReadEventArgumentExecutionState),
    /// A raw data send.
    SendData(SendDataExecutionState),
}

impl ExecutionState {
    /// The type of the future.
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

    /// The fields shared by every future type.
    pub const fn base(&self) -> &ExecutionStateBase {
        match self {
            Self::Deployment(state) => &state.base,
            Self::Call(state) => &state.base,
            Self::StaticCall(state) => &state.base,
            Self::ContractAt(state) => &state.base,
            Self::ReadEventArgument(state) => &state.base,
            Self::SendData(state) => &state.base,
        }
    }

    /// Mutable access to the fields shared by every future type.
    pub fn base_mut(&mut self) -> &mut ExecutionStateBase {
        match self {
            Self::Deployment(state) => &mut state.base,
            Self::Call(state) => &mut state.base,
            Self::StaticCall(state) => &mut state.base,
            Self::ContractAt(state) => &mut state.base,
            Self::ReadEventArgument(state) => &mut state.base,
            Self::SendData(state) => &mut state.base,
        }
    }

    /// The future id.
    pub fn id(&self) -> &FutureId {
        &self.base().id
    }

    /// The coarse status.
    pub const fn status(&self) -> ExecutionStatus {
        self.base().status
    }

    /// The sender requested by the future, if any.
    pub const fn from(&self) -> Option<Address> {
        match self {
            Self::Deployment(state) => state.from,
            Self::Call(state) => state.from,
            Self::StaticCall(state) => state.from,
            Self::SendData(state) => state.from,
            Self::ContractAt(_) | Self::ReadEventArgument(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_rpc_types_eth::{TransactionInput, TransactionRequest};

    use super::*;
    use crate::{
        reduce_all,
        test_utils::{deployment_start, static_call_start, tx_hash, SENDER},
        DeployContractInteraction, DeployContractSuccessMessage, DeployedContractExecutionSuccess,
        ExecutionId,
        ExecutionSuccessMessage, JournalMessage, OnchainInteractionMessage, OnchainResultMessage,
        OnchainTransactionAccept, OnchainTransactionRequest, OnchainTransactionReset,
        StaticCallInteraction,
    };

    const TOKEN: &str = "Module#Token";
    const OWNER: &str = "Module#Token.owner";

    fn deploy_request(execution_id: ExecutionId, nonce: u64) -> JournalMessage {
        OnchainTransactionRequest {
            future_id: TOKEN.to_string(),
            execution_id,
            from: SENDER,
            nonce,
            tx: TransactionRequest {
                from: Some(SENDER),
                value: Some(U256::ZERO),
                nonce: Some(nonce),
                input: TransactionInput::new(Bytes::from_static(&[0x60, 0x80])),
                ..Default::default()
            },
        }
        .into()
    }

    fn state() -> ExecutionStateMap {
        let deploy = |execution_id| {
            OnchainInteractionMessage::DeployContract(DeployContractInteraction {
                future_id: TOKEN.to_string(),
                execution_id,
                artifact_future_id: TOKEN.to_string(),
                contract_name: "Token".to_string(),
                constructor_args: Vec::new(),
                libraries: BTreeMap::new(),
                value: U256::ZERO,
                from: SENDER,
            })
        };
        let messages: Vec<JournalMessage> = vec![
            deployment_start(TOKEN, "Token").into(),
            deploy(1).into(),
            deploy_request(1, 0),
            OnchainTransactionReset { future_id: TOKEN.to_string(), execution_id: 1 }.into(),
            deploy_request(1, 0),
            OnchainTransactionAccept {
                future_id: TOKEN.to_string(),
                execution_id: 1,
                tx_hash: tx_hash(1),
            }
            .into(),
            OnchainResultMessage::DeployContractSuccess(DeployContractSuccessMessage {
                future_id: TOKEN.to_string(),
                execution_id: 1,
                contract_address: SENDER.create(0),
                tx_id: tx_hash(1),
            })
            .into(),
            ExecutionSuccessMessage::DeployedContract(DeployedContractExecutionSuccess {
                future_id: TOKEN.to_string(),
                contract_name: "Token".to_string(),
                contract_address: SENDER.create(0),
                tx_id: tx_hash(1),
            })
            .into(),
            static_call_start(OWNER, TOKEN, SENDER.create(0), "owner", NameOrIndex::default())
                .into(),
            OnchainInteractionMessage::StaticCall(StaticCallInteraction {
                future_id: OWNER.to_string(),
                execution_id: 1,
                artifact_future_id: TOKEN.to_string(),
                contract_address: SENDER.create(0),
                function_name: "owner".to_string(),
                args: Vec::new(),
                from: SENDER,
            })
            .into(),
        ];
        reduce_all(&ExecutionStateMap::new(), &messages).unwrap()
    }

    #[test]
    fn test_execution_state_json_roundtrip() {
        let state = state();
        let token = state.get(TOKEN).unwrap();
        assert_eq!(token.base().onchain.actions.len(), 1);

        let json = serde_json::to_string(token).unwrap();
        assert!(json.contains("\"actions\":{\"1\":"), "{json}");
        let decoded: ExecutionState = serde_json::from_str(&json).unwrap();
        assert_eq!(&decoded, token);
    }

    #[test]
    fn test_execution_state_map_json_roundtrip() {
        let state = state();
        let json = serde_json::to_string(&state).unwrap();
        let decoded: ExecutionStateMap = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, state);
        assert_eq!(decoded.get(OWNER).unwrap().base().onchain.current_execution, Some(1));
    }

    #[test]
    fn test_invalid_execution_id_is_rejected() {
        let mut json = serde_json::to_value(state().get(TOKEN).unwrap()).unwrap();
        let actions = json["onchain"]["actions"].as_object_mut().unwrap();
        let action = actions.remove("1").unwrap();
        actions.insert("first".to_string(), action);

        let err = serde_json::from_value::<ExecutionState>(json).unwrap_err();
        assert!(err.to_string().contains("invalid execution id"), "{err}");
    }
}
