//! The messages of the execution journal.
//!
//! The `type`, `futureType` and `subtype` discriminators are the on-disk format of the journal
//! and must stay stable for journals written by earlier runs to remain replayable.

use serde::{Deserialize, Serialize};

use crate::FutureId;

mod future;
pub use future::*;

mod run;
pub use run::*;

mod transaction;
pub use transaction::*;

/// Any message that can be recorded in the journal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, derive_more::From)]
#[serde(tag = "type")]
pub enum JournalMessage {
    /// A new run started.
    #[serde(rename = "run-start")]
    RunStart(StartRunMessage),
    /// The state of a future was wiped.
    #[serde(rename = "wipe")]
    Wipe(WipeMessage),
    /// A future started executing.
    #[serde(rename = "execution-start")]
    ExecutionStart(FutureStartMessage),
    /// A future succeeded.
    #[serde(rename = "execution-success")]
    ExecutionSuccess(ExecutionSuccessMessage),
    /// A future failed.
    #[serde(rename = "execution-failure")]
    ExecutionFailure(ExecutionFailureMessage),
    /// A transaction of a future was not mined in time.
    #[serde(rename = "execution-timeout")]
    ExecutionTimeout(ExecutionTimeoutMessage),
    /// A future was put on hold.
    #[serde(rename = "execution-hold")]
    ExecutionHold(ExecutionHoldMessage),
    /// An onchain action was requested.
    #[serde(rename = "onchain-action")]
    OnchainAction(OnchainInteractionMessage),
    /// A transaction was built with an allocated nonce.
    #[serde(rename = "onchain-transaction-request")]
    OnchainTransactionRequest(OnchainTransactionRequest),
    /// A transaction was accepted by the node.
    #[serde(rename = "onchain-transaction-accept")]
    OnchainTransactionAccept(OnchainTransactionAccept),
    /// A transaction was abandoned.
    #[serde(rename = "onchain-transaction-reset")]
    OnchainTransactionReset(OnchainTransactionReset),
    /// An onchain action completed.
    #[serde(rename = "onchain-result")]
    OnchainResult(OnchainResultMessage),
}

impl JournalMessage {
    /// The future this message belongs to, or `None` for a run start.
    pub fn future_id(&self) -> Option<&FutureId> {
        match self {
            Self::RunStart(_) => None,
            Self::Wipe(msg) => Some(&msg.future_id),
            Self::ExecutionStart(msg) => Some(msg.future_id()),
            Self::ExecutionSuccess(msg) => Some(msg.future_id()),
            Self::ExecutionFailure(msg) => Some(&msg.future_id),
            Self::ExecutionTimeout(msg) => Some(&msg.future_id),
            Self::ExecutionHold(msg) => Some(&msg.future_id),
            Self::OnchainAction(msg) => Some(msg.future_id()),
            Self::OnchainTransactionRequest(msg) => Some(&msg.future_id),
            Self::OnchainTransactionAccept(msg) => Some(&msg.future_id),
            Self::OnchainTransactionReset(msg) => Some(&msg.future_id),
            Self::OnchainResult(msg) => Some(msg.future_id()),
        }
    }

    /// The transaction-level view of this message, if it is one.
    pub fn as_transaction_message(&self) -> Option<TransactionMessage> {
        match self {
            Self::OnchainAction(msg) => Some(msg.clone().into()),
            Self::OnchainTransactionRequest(msg) => Some(msg.clone().into()),
            Self::OnchainTransactionAccept(msg) => Some(msg.clone().into()),
            Self::OnchainTransactionReset(msg) => Some(msg.clone().into()),
            Self::OnchainResult(msg) => Some(msg.clone().into()),
            _ => None,
        }
    }
}

impl From<TransactionMessage> for JournalMessage {
    fn from(message: TransactionMessage) -> Self {
        match message {
            TransactionMessage::Interaction(msg) => Self::OnchainAction(msg),
            TransactionMessage::Request(msg) => Self::OnchainTransactionRequest(msg),
            TransactionMessage::Accept(msg) => Self::OnchainTransactionAccept(msg),
            TransactionMessage::Reset(msg) => Self::OnchainTransactionReset(msg),
            TransactionMessage::Result(msg) => Self::OnchainResult(msg),
        }
    }
}

impl From<ExecutionResultMessage> for JournalMessage {
    fn from(message: ExecutionResultMessage) -> Self {
        match message {
            ExecutionResultMessage::Success(msg) => Self::ExecutionSuccess(msg),
            ExecutionResultMessage::Failure(msg) => Self::ExecutionFailure(msg),
            ExecutionResultMessage::Timeout(msg) => Self::ExecutionTimeout(msg),
            ExecutionResultMessage::Hold(msg) => Self::ExecutionHold(msg),
        }
    }
}
