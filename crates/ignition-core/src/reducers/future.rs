use crate::{
    error::ensure_invariant, CallExecutionState, ContractAtExecutionState,
    DeploymentExecutionState, ExecutionFailureMessage, ExecutionHoldMessage, ExecutionState,
    ExecutionStateBase, ExecutionStateMap, ExecutionStatus, ExecutionSuccessMessage,
    ExecutionTimeoutMessage, FutureStartMessage, IgnitionError, ReadEventArgumentExecutionState,
    Result, SendDataExecutionState, StaticCallExecutionState,
};

/// Creates the execution state of a future. This is the only place states are created.
pub(super) fn start_future(
    state: &ExecutionStateMap,
    message: &FutureStartMessage,
) -> Result<ExecutionStateMap> {
    let future_id = message.future_id();
    ensure_invariant!(
        !state.contains(future_id),
        "Execution state for future {future_id} already exists"
    );

    let execution_state = match message.clone() {
        FutureStartMessage::Deployment(msg) => {
            ExecutionState::Deployment(DeploymentExecutionState {
                base: ExecutionStateBase::new(msg.future_id, msg.strategy, msg.dependencies),
                artifact_future_id: msg.artifact_future_id,
                contract_name: msg.contract_name,
                constructor_args: msg.constructor_args,
                libraries: msg.libraries,
                value: msg.value,
                from: msg.from,
                contract_address: None,
                tx_id: None,
            })
        }
        FutureStartMessage::Call(msg) => ExecutionState::Call(CallExecutionState {
            base: ExecutionStateBase::new(msg.future_id, msg.strategy, msg.dependencies),
            artifact_future_id: msg.artifact_future_id,
            contract_address: msg.contract_address,
            function_name: msg.function_name,
            args: msg.args,
            value: msg.value,
            from: msg.from,
            tx_id: None,
        }),
        FutureStartMessage::StaticCall(msg) => {
            ExecutionState::StaticCall(StaticCallExecutionState {
                base: ExecutionStateBase::new(msg.future_id, msg.strategy, msg.dependencies),
                artifact_future_id: msg.artifact_future_id,
                contract_address: msg.contract_address,
                function_name: msg.function_name,
                args: msg.args,
                name_or_index: msg.name_or_index,
                from: msg.from,
                result: None,
            })
        }
        FutureStartMessage::ContractAt(msg) => {
            ExecutionState::ContractAt(ContractAtExecutionState {
                base: ExecutionStateBase::new(msg.future_id, msg.strategy, msg.dependencies),
                artifact_future_id: msg.artifact_future_id,
                contract_name: msg.contract_name,
                address: msg.address,
                contract_address: None,
            })
        }
        FutureStartMessage::ReadEventArgument(msg) => {
            ExecutionState::ReadEventArgument(ReadEventArgumentExecutionState {
                base: ExecutionStateBase::new(msg.future_id, msg.strategy, msg.dependencies),
                artifact_future_id: msg.artifact_future_id,
                event_name: msg.event_name,
                argument_name: msg.argument_name,
                tx_to_read_from: msg.tx_to_read_from,
                emitter_address: msg.emitter_address,
                event_index: msg.event_index,
                result: None,
            })
        }
        FutureStartMessage::SendData(msg) => ExecutionState::SendData(SendDataExecutionState {
            base: ExecutionStateBase::new(msg.future_id, msg.strategy, msg.dependencies),
            to: msg.to,
            data: msg.data,
            value: msg.value,
            from: msg.from,
            tx_id: None,
        }),
    };

    Ok(state.with(execution_state))
}

/// Records the result of a successful future.
///
/// The success variant must match the type of the future it completes.
pub(super) fn set_success(
    state: &ExecutionStateMap,
    message: &ExecutionSuccessMessage,
) -> Result<ExecutionStateMap> {
    let mut execution_state = existing(state, message.future_id())?;

    match (&mut execution_state, message) {
        (ExecutionState::Deployment(target), ExecutionSuccessMessage::DeployedContract(msg)) => {
            target.contract_address = Some(msg.contract_address);
            target.tx_id = Some(msg.tx_id);
        }
        (ExecutionState::Call(target), ExecutionSuccessMessage::CalledFunction(msg)) => {
            target.tx_id = Some(msg.tx_id);
        }
        (ExecutionState::StaticCall(target), ExecutionSuccessMessage::StaticCall(msg)) => {
            target.result = Some(msg.result.clone());
        }
        (
            ExecutionState::ReadEventArgument(target),
            ExecutionSuccessMessage::ReadEventArgument(msg),
        ) => {
            target.result = Some(msg.result.clone());
        }
        (ExecutionState::SendData(target), ExecutionSuccessMessage::SendData(msg)) => {
            target.tx_id = Some(msg.tx_id);
        }
        (ExecutionState::ContractAt(target), ExecutionSuccessMessage::ContractAt(msg)) => {
            target.contract_address = Some(msg.contract_address);
        }
        (execution_state, message) => {
            return Err(IgnitionError::invariant(format!(
                "Cannot apply a {} success to {} future {}",
                message.future_type(),
                execution_state.future_type(),
                execution_state.id()
            )))
        }
    }

    let base = execution_state.base_mut();
    base.status = ExecutionStatus::Success;
    base.reason = None;
    Ok(state.with(execution_state))
}

pub(super) fn set_failure(
    state: &ExecutionStateMap,
    message: &ExecutionFailureMessage,
) -> Result<ExecutionStateMap> {
    set_status(state, &message.future_id, ExecutionStatus::Failed, Some(message.error.clone()))
}

pub(super) fn set_timeout(
    state: &ExecutionStateMap,
    message: &ExecutionTimeoutMessage,
) -> Result<ExecutionStateMap> {
    set_status(state, &message.future_id, ExecutionStatus::Timeout, None)
}

pub(super) fn set_hold(
    state: &ExecutionStateMap,
    message: &ExecutionHoldMessage,
) -> Result<ExecutionStateMap> {
    set_status(state, &message.future_id, ExecutionStatus::Hold, Some(message.reason.clone()))
}

fn set_status(
    state: &ExecutionStateMap,
    future_id: &str,
    status: ExecutionStatus,
    reason: Option<String>,
) -> Result<ExecutionStateMap> {
    let mut execution_state = existing(state, future_id)?;
    let base = execution_state.base_mut();
    base.status = status;
    base.reason = reason;
    Ok(state.with(execution_state))
}

/// A private copy of the state of a future that must exist.
fn existing(state: &ExecutionStateMap, future_id: &str) -> Result<ExecutionState> {
    state.get(future_id).cloned().ok_or_else(|| {
        IgnitionError::invariant(format!("No execution state for future {future_id}"))
    })
}
