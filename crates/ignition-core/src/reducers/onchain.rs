//! The onchain action sub-reducer.
//!
//! An action goes through START, then for transactional kinds through TRANSACTION_REQUEST (nonce
//! allocated) and TRANSACTION_ACCEPT (hash known), and ends with a result that returns the state
//! to idle. A reset sends a transactional action back to START so that it can be sent again with
//! a fresh nonce. A nonce can only be allocated from START, so at most one is owned at a time.

use crate::{
    error::ensure_invariant, ExecutionId, IgnitionError, OnchainAction, OnchainActionKind,
    OnchainStage, OnchainState, OnchainStatus, Result, TransactionMessage,
};

pub(super) fn apply(onchain: &mut OnchainState, message: &TransactionMessage) -> Result<()> {
    match message {
        TransactionMessage::Interaction(msg) => {
            let execution_id = msg.execution_id();
            ensure_invariant!(
                onchain.is_idle(),
                "Cannot start execution {execution_id} of future {} while {:?} is in flight",
                msg.future_id(),
                onchain.current_execution
            );
            if let Some(last) = onchain.last_execution_id() {
                ensure_invariant!(
                    execution_id > last,
                    "Execution id {execution_id} of future {} does not follow {last}",
                    msg.future_id()
                );
            }

            onchain.status = OnchainStatus::start(msg.kind());
            onchain.current_execution = Some(execution_id);
            onchain.actions.insert(execution_id, OnchainAction::new(msg.clone()));
        }
        TransactionMessage::Request(msg) => {
            let kind = current_kind(onchain, msg.execution_id)?;
            let request = OnchainStatus::request(kind)
                .ok_or_else(|| not_transactional(kind, &msg.future_id))?;
            ensure_invariant!(
                onchain.status == OnchainStatus::start(kind),
                "Cannot allocate a nonce for future {} in status {:?}",
                msg.future_id,
                onchain.status
            );

            onchain.status = request;
            onchain.from = Some(msg.from);
            onchain.nonce = Some(msg.nonce);
            onchain.tx_hash = None;
            current_action(onchain, msg.execution_id)?.request = Some(msg.tx.clone());
        }
        TransactionMessage::Accept(msg) => {
            let kind = current_kind(onchain, msg.execution_id)?;
            let (Some(request), Some(accept)) =
                (OnchainStatus::request(kind), OnchainStatus::accept(kind))
            else {
                return Err(not_transactional(kind, &msg.future_id));
            };
            ensure_invariant!(
                onchain.status == request,
                "Cannot accept a transaction of future {} in status {:?}",
                msg.future_id,
                onchain.status
            );

            onchain.status = accept;
            onchain.tx_hash = Some(msg.tx_hash);
            current_action(onchain, msg.execution_id)?.tx_hashes.push(msg.tx_hash);
        }
        TransactionMessage::Reset(msg) => {
            let kind = current_kind(onchain, msg.execution_id)?;
            ensure_invariant!(
                matches!(
                    onchain.status.stage(),
                    OnchainStage::TransactionRequest | OnchainStage::TransactionAccept
                ),
                "Cannot reset the transaction of future {} in status {:?}",
                msg.future_id,
                onchain.status
            );

            onchain.status = OnchainStatus::start(kind);
            onchain.from = None;
            onchain.nonce = None;
            onchain.tx_hash = None;
        }
        TransactionMessage::Result(msg) => {
            let kind = current_kind(onchain, msg.execution_id())?;
            if let Some(success_kind) = msg.success_kind() {
                ensure_invariant!(
                    success_kind == kind,
                    "Cannot complete the {kind} action of future {} with a {success_kind} result",
                    msg.future_id()
                );
                let expected = if kind.is_transactional() {
                    OnchainStage::TransactionAccept
                } else {
                    OnchainStage::Start
                };
                ensure_invariant!(
                    onchain.status.stage() == expected,
                    "Cannot complete the {kind} action of future {} in status {:?}",
                    msg.future_id(),
                    onchain.status
                );
            }

            current_action(onchain, msg.execution_id())?.result = Some(msg.clone());
            onchain.status = OnchainStatus::Execute;
            onchain.current_execution = None;
            onchain.from = None;
            onchain.nonce = None;
            onchain.tx_hash = None;
        }
    }
    Ok(())
}

/// The kind of the action in flight, which must be `execution_id`.
fn current_kind(onchain: &OnchainState, execution_id: ExecutionId) -> Result<OnchainActionKind> {
    ensure_invariant!(
        onchain.current_execution == Some(execution_id),
        "Execution {execution_id} is not in flight (current: {:?})",
        onchain.current_execution
    );
    onchain.status.kind().ok_or_else(|| {
        IgnitionError::invariant(format!("Execution {execution_id} is in flight but idle"))
    })
}

fn not_transactional(kind: OnchainActionKind, future_id: &str) -> IgnitionError {
    IgnitionError::invariant(format!(
        "The {kind} action of future {future_id} does not send transactions"
    ))
}

fn current_action(
    onchain: &mut OnchainState,
    execution_id: ExecutionId,
) -> Result<&mut OnchainAction> {
    onchain.actions.get_mut(&execution_id).ok_or_else(|| {
        IgnitionError::invariant(format!("No onchain action recorded for execution {execution_id}"))
    })
}
