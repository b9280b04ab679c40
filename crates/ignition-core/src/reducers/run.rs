use crate::{ExecutionStateMap, ExecutionStatus, WipeMessage};

/// Moves every timed out future back to [`ExecutionStatus::Started`].
pub(super) fn start_run(state: &ExecutionStateMap) -> ExecutionStateMap {
    let timed_out = state
        .iter()
        .filter(|(_, execution_state)| execution_state.status() == ExecutionStatus::Timeout)
        .map(|(_, execution_state)| execution_state.as_ref().clone());

    let mut next = state.clone();
    for mut execution_state in timed_out {
        execution_state.base_mut().status = ExecutionStatus::Started;
        next = next.with(execution_state);
    }
    next
}

/// Deletes the state of a future. Wiping an unknown future is a no-op.
pub(super) fn wipe(state: &ExecutionStateMap, message: &WipeMessage) -> ExecutionStateMap {
    state.without(&message.future_id)
}
