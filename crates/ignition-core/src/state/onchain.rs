//! The onchain sub-state of a future: where its single in-flight action stands.

use std::collections::BTreeMap;

use alloy_primitives::{Address, TxHash};
use alloy_rpc_types_eth::TransactionRequest;
use serde::{Deserialize, Serialize};

use crate::{ExecutionId, OnchainInteractionMessage, OnchainResultMessage};

/// The kinds of onchain actions.
#[derive(
    Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "kebab-case")]
pub enum OnchainActionKind {
    /// Contract deployment transaction.
    #[display("deploy-contract")]
    DeployContract,
    /// Function call transaction.
    #[display("call-function")]
    CallFunction,
    /// Read-only call.
    #[display("static-call")]
    StaticCall,
    /// Event argument lookup.
    #[display("read-event-arg")]
    #[serde(rename = "read-event-arg")]
    ReadEventArgument,
    /// Raw data transaction.
    #[display("send-data")]
    SendData,
    /// Binding of an existing contract.
    #[display("contract-at")]
    ContractAt,
}

impl OnchainActionKind {
    /// Returns `true` if the action sends a transaction, and therefore consumes a nonce.
    pub const fn is_transactional(self) -> bool {
        matches!(self, Self::DeployContract | Self::CallFunction | Self::SendData)
    }
}

/// The lifecycle stages shared by every onchain action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OnchainStage {
    /// No action in flight.
    Idle,
    /// The action was requested.
    Start,
    /// A transaction with an allocated nonce was recorded.
    TransactionRequest,
    /// The transaction was accepted by the node.
    TransactionAccept,
}

/// Where the current onchain action of a future stands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OnchainStatus {
    /// Idle, ready for the next action.
    #[default]
    Execute,
    DeployContractStart,
    DeployContractTransactionRequest,
    DeployContractTransactionAccept,
    CallFunctionStart,
    CallFunctionTransactionRequest,
    CallFunctionTransactionAccept,
    SendDataStart,
    SendDataTransactionRequest,
    SendDataTransactionAccept,
    StaticCallStart,
    ReadEventArgStart,
    ContractAtStart,
}

impl OnchainStatus {
    /// The START stage of an action kind.
    pub const fn start(kind: OnchainActionKind) -> Self {
        match kind {
            OnchainActionKind::DeployContract => Self::DeployContractStart,
            OnchainActionKind::CallFunction => Self::CallFunctionStart,
            OnchainActionKind::StaticCall => Self::StaticCallStart,
            OnchainActionKind::ReadEventArgument => Self::ReadEventArgStart,
            OnchainActionKind::SendData => Self::SendDataStart,
            OnchainActionKind::ContractAt => Self::ContractAtStart,
        }
    }

    /// The TRANSACTION_REQUEST stage of an action kind, if it sends transactions.
    pub const fn request(kind: OnchainActionKind) -> Option<Self> {
        match kind {
            OnchainActionKind::DeployContract => Some(Self::DeployContractTransactionRequest),
            OnchainActionKind::CallFunction => Some(Self::CallFunctionTransactionRequest),
            OnchainActionKind::SendData => Some(Self::SendDataTransactionRequest),
            _ => None,
        }
    }

    /// The TRANSACTION_ACCEPT stage of an action kind, if it sends transactions.
    pub const fn accept(kind: OnchainActionKind) -> Option<Self> {
        match kind {
            OnchainActionKind::DeployContract => Some(Self::DeployContractTransactionAccept),
            OnchainActionKind::CallFunction => Some(Self::CallFunctionTransactionAccept),
            OnchainActionKind::SendData => Some(Self::SendDataTransactionAccept),
            _ => None,
        }
    }

    /// The action kind this status belongs to, or `None` when idle.
    pub const fn kind(self) -> Option<OnchainActionKind> {
        match self {
            Self::Execute => None,
            Self::DeployContractStart |
            Self::DeployContractTransactionRequest |
            Self::DeployContractTransactionAccept => Some(OnchainActionKind::DeployContract),
            Self::CallFunctionStart |
            Self::CallFunctionTransactionRequest |
            Self::CallFunctionTransactionAccept => Some(OnchainActionKind::CallFunction),
            Self::SendDataStart |
            Self::SendDataTransactionRequest |
            Self::SendDataTransactionAccept => Some(OnchainActionKind::SendData),
            Self::StaticCallStart => Some(OnchainActionKind::StaticCall),
            Self::ReadEventArgStart => Some(OnchainActionKind::ReadEventArgument),
            Self::ContractAtStart => Some(OnchainActionKind::ContractAt),
        }
    }

    /// The lifecycle stage of this status.
    pub const fn stage(self) -> OnchainStage {
        match self {
            Self::Execute => OnchainStage::Idle,
            Self::DeployContractStart |
            Self::CallFunctionStart |
            Self::SendDataStart |
            Self::StaticCallStart |
            Self::ReadEventArgStart |
            Self::ContractAtStart => OnchainStage::Start,
            Self::DeployContractTransactionRequest |
            Self::CallFunctionTransactionRequest |
            Self::SendDataTransactionRequest => OnchainStage::TransactionRequest,
            Self::DeployContractTransactionAccept |
            Self::CallFunctionTransactionAccept |
            Self::SendDataTransactionAccept => OnchainStage::TransactionAccept,
        }
    }
}

/// Everything recorded about one execution of a future.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnchainAction {
    /// The requested action.
    pub interaction: OnchainInteractionMessage,
    /// The last transaction built for the action, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<TransactionRequest>,
    /// Every transaction hash accepted for the action, oldest first.
    #[serde(default)]
    pub tx_hashes: Vec<TxHash>,
    /// The outcome, once known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<OnchainResultMessage>,
}

impl OnchainAction {
    /// Creates a new [`OnchainAction`] for a freshly requested interaction.
    pub const fn new(interaction: OnchainInteractionMessage) -> Self {
        Self { interaction, request: None, tx_hashes: Vec::new(), result: None }
    }
}

/// The onchain sub-state of a future.
///
/// At most one execution is in flight at a time. `from`, `nonce` and `tx_hash` describe the
/// current transaction and are cleared when it is reset or the execution completes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnchainState {
    /// Where the current action stands.
    pub status: OnchainStatus,
    /// The execution in flight, if any.
    pub current_execution: Option<ExecutionId>,
    /// Every execution of the future, by id.
    #[serde(with = "execution_id_keys")]
    pub actions: BTreeMap<ExecutionId, OnchainAction>,
    /// The sender of the current transaction.
    pub from: Option<Address>,
    /// The nonce owned by the current transaction.
    pub nonce: Option<u64>,
    /// The hash of the current transaction, once accepted.
    pub tx_hash: Option<TxHash>,
}

impl OnchainState {
    /// Returns `true` when no action is in flight.
    pub const fn is_idle(&self) -> bool {
        matches!(self.status, OnchainStatus::Execute) && self.current_execution.is_none()
    }

    /// The action in flight, if any.
    pub fn current_action(&self) -> Option<&OnchainAction> {
        self.current_execution.and_then(|id| self.actions.get(&id))
    }

    /// The highest execution id used so far.
    pub fn last_execution_id(&self) -> Option<ExecutionId> {
        self.actions.keys().next_back().copied()
    }
}

/// Execution ids as string map keys.
///
/// Buffered content of tagged and flattened states does not parse integer keys from strings.
mod execution_id_keys {
    use std::collections::BTreeMap;

    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::OnchainAction;
    use crate::ExecutionId;

    pub(super) fn serialize<S>(
        actions: &BTreeMap<ExecutionId, OnchainAction>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_map(actions.iter().map(|(id, action)| (id.to_string(), action)))
    }

    pub(super) fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<ExecutionId, OnchainAction>, D::Error>
    where
        D: Deserializer<'de>,
    {
        BTreeMap::<String, OnchainAction>::deserialize(deserializer)?
            .into_iter()
            .map(|(id, action)| {
                let id = id.parse::<ExecutionId>().map_err(|err| {
                    D::Error::custom(format!("invalid execution id {id:?}: {err}"))
                })?;
                Ok((id, action))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(OnchainActionKind::DeployContract, true)]
    #[case(OnchainActionKind::CallFunction, true)]
    #[case(OnchainActionKind::SendData, true)]
    #[case(OnchainActionKind::StaticCall, false)]
    #[case(OnchainActionKind::ReadEventArgument, false)]
    #[case(OnchainActionKind::ContractAt, false)]
    fn test_status_stages(#[case] kind: OnchainActionKind, #[case] transactional: bool) {
        assert_eq!(kind.is_transactional(), transactional);

        let start = OnchainStatus::start(kind);
        assert_eq!(start.stage(), OnchainStage::Start);
        assert_eq!(start.kind(), Some(kind));

        assert_eq!(OnchainStatus::request(kind).is_some(), transactional);
        assert_eq!(OnchainStatus::accept(kind).is_some(), transactional);
        if let Some(accept) = OnchainStatus::accept(kind) {
            assert_eq!(accept.stage(), OnchainStage::TransactionAccept);
            assert_eq!(accept.kind(), Some(kind));
        }
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&OnchainStatus::DeployContractTransactionRequest).unwrap(),
            "\"DEPLOY_CONTRACT_TRANSACTION_REQUEST\""
        );
        assert_eq!(serde_json::to_string(&OnchainStatus::Execute).unwrap(), "\"EXECUTE\"");
        assert!(OnchainState::default().is_idle());
    }
}
