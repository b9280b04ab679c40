//! Reducers folding journal messages into the [`ExecutionStateMap`].
//!
//! Reducers are pure: they never mutate their input map, never perform I/O and always produce the
//! same output for the same input. Replaying a journal from an empty map therefore rebuilds the
//! exact state that was built live.

use crate::{ExecutionStateMap, JournalMessage, Result};

mod future;
mod onchain;
mod run;
mod transaction;

/// Folds one journal message into the execution state map, returning the new map.
///
/// Fails with [`IgnitionError::InvariantViolation`](crate::IgnitionError::InvariantViolation)
/// when the message is inconsistent with the current state.
pub fn execution_state_reducer(
    state: &ExecutionStateMap,
    message: &JournalMessage,
) -> Result<ExecutionStateMap> {
    match message {
        JournalMessage::RunStart(_) => Ok(run::start_run(state)),
        JournalMessage::Wipe(msg) => Ok(run::wipe(state, msg)),
        JournalMessage::ExecutionStart(msg) => future::start_future(state, msg),
        JournalMessage::ExecutionSuccess(msg) => future::set_success(state, msg),
        JournalMessage::ExecutionFailure(msg) => future::set_failure(state, msg),
        JournalMessage::ExecutionTimeout(msg) => future::set_timeout(state, msg),
        JournalMessage::ExecutionHold(msg) => future::set_hold(state, msg),
        JournalMessage::OnchainAction(msg) => transaction::apply(state, msg.clone().into()),
        JournalMessage::OnchainTransactionRequest(msg) => {
            transaction::apply(state, msg.clone().into())
        }
        JournalMessage::OnchainTransactionAccept(msg) => {
            transaction::apply(state, msg.clone().into())
        }
        JournalMessage::OnchainTransactionReset(msg) => {
            transaction::apply(state, msg.clone().into())
        }
        JournalMessage::OnchainResult(msg) => transaction::apply(state, msg.clone().into()),
    }
}

/// Folds a sequence of messages, in order, starting from `state`.
pub fn reduce_all<'a>(
    state: &ExecutionStateMap,
    messages: impl IntoIterator<Item = &'a JournalMessage>,
) -> Result<ExecutionStateMap> {
    messages
        .into_iter()
        .try_fold(state.clone(), |state, message| execution_state_reducer(&state, message))
}
