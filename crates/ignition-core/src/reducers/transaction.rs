use crate::{
    error::ensure_invariant, ExecutionStateMap, ExecutionStatus, IgnitionError, Result,
    TransactionMessage,
};

use super::onchain;

/// Appends a transaction-level message to the history of its future and folds it into the
/// onchain state.
pub(super) fn apply(
    state: &ExecutionStateMap,
    message: TransactionMessage,
) -> Result<ExecutionStateMap> {
    let future_id = message.future_id();
    let mut execution_state = state.get(future_id).cloned().ok_or_else(|| {
        IgnitionError::invariant(format!(
            "Transaction message for future {future_id} without execution state"
        ))
    })?;

    let base = execution_state.base_mut();
    ensure_invariant!(
        base.status == ExecutionStatus::Started,
        "Transaction message for future {} with status {}",
        base.id,
        base.status
    );

    onchain::apply(&mut base.onchain, &message)?;
    base.history.push(message);
    Ok(state.with(execution_state))
}
