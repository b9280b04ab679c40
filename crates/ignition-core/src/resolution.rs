//! Resolution of future references to the values they produced.
//!
//! Resolution only reads recorded state: it never triggers an execution.

use alloy_primitives::Address;

use crate::{
    error::ensure_invariant, EvmValue, ExecutionState, ExecutionStateMap, FutureRef,
    IgnitionError, Result,
};

/// Resolves a deployment or contract-at future to the address of its contract.
pub fn resolve_contract_future_to_address(
    future: &FutureRef,
    state: &ExecutionStateMap,
) -> Result<Address> {
    match execution_state_of(future, state)? {
        ExecutionState::Deployment(state) => state.contract_address(),
        ExecutionState::ContractAt(state) => state.contract_address(),
        other => Err(IgnitionError::invariant(format!(
            "Future {} of type {} does not produce a contract",
            future.id,
            other.future_type()
        ))),
    }
}

/// Resolves a future to the value it produced.
///
/// Deployments and contract-at futures resolve to their address, static calls and event reads to
/// their recorded result. Calls and sends produce no value.
pub fn resolve_future_to_value(future: &FutureRef, state: &ExecutionStateMap) -> Result<EvmValue> {
    match execution_state_of(future, state)? {
        ExecutionState::Deployment(state) => {
            Ok(EvmValue::String(state.contract_address()?.to_checksum(None)))
        }
        ExecutionState::ContractAt(state) => {
            Ok(EvmValue::String(state.contract_address()?.to_checksum(None)))
        }
        ExecutionState::StaticCall(state) => state.result(),
        ExecutionState::ReadEventArgument(state) => state.result(),
        other @ (ExecutionState::Call(_) | ExecutionState::SendData(_)) => {
            Err(IgnitionError::invariant(format!(
                "Future {} of type {} does not produce a value",
                future.id,
                other.future_type()
            )))
        }
    }
}

fn execution_state_of<'a>(
    future: &FutureRef,
    state: &'a ExecutionStateMap,
) -> Result<&'a ExecutionState> {
    let execution_state = state.get(&future.id).ok_or_else(|| {
        IgnitionError::invariant(format!(
            "No history of previous execution for future {}",
            future.id
        ))
    })?;
    ensure_invariant!(
        execution_state.future_type() == future.future_type,
        "Future {} is a {} but its execution state is a {}",
        future.id,
        future.future_type,
        execution_state.future_type()
    );
    Ok(execution_state)
}

