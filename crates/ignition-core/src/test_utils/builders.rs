use std::collections::{BTreeMap, BTreeSet};

use alloy_primitives::{address, Address, Bytes, TxHash, B256, U256};

use crate::{
    constants::BASIC_STRATEGY_NAME, CallExecutionStartMessage, ContractAtExecutionStartMessage,
    DeploymentExecutionStartMessage, FutureId, FutureStartMessage, NameOrIndex,
    ReadEventArgumentExecutionStartMessage, SendDataExecutionStartMessage,
    StaticCallExecutionStartMessage,
};

/// The default sender of test deployments.
pub const SENDER: Address = address!("0xf39Fd6e51aad88F6F4Ce6aB8827279cffFb92266");

/// A transaction hash whose bytes are all `byte`.
pub fn tx_hash(byte: u8) -> TxHash {
    B256::repeat_byte(byte)
}

/// Starts a deployment of `contract_name` from the artifact owned by the future itself.
pub fn deployment_start(future_id: &str, contract_name: &str) -> FutureStartMessage {
    FutureStartMessage::Deployment(DeploymentExecutionStartMessage {
        future_id: future_id.to_string(),
        strategy: BASIC_STRATEGY_NAME.to_string(),
        dependencies: BTreeSet::new(),
        artifact_future_id: future_id.to_string(),
        contract_name: contract_name.to_string(),
        constructor_args: Vec::new(),
        libraries: BTreeMap::new(),
        value: U256::ZERO,
        from: None,
    })
}

/// Starts a call of `function_name` on `contract_address`.
pub fn call_start(
    future_id: &str,
    artifact_future_id: &str,
    contract_address: Address,
    function_name: &str,
) -> FutureStartMessage {
    FutureStartMessage::Call(CallExecutionStartMessage {
        future_id: future_id.to_string(),
        strategy: BASIC_STRATEGY_NAME.to_string(),
        dependencies: BTreeSet::new(),
        artifact_future_id: artifact_future_id.to_string(),
        contract_address,
        function_name: function_name.to_string(),
        args: Vec::new(),
        value: U256::ZERO,
        from: None,
    })
}

/// Starts a read-only call of `function_name` on `contract_address`.
pub fn static_call_start(
    future_id: &str,
    artifact_future_id: &str,
    contract_address: Address,
    function_name: &str,
    name_or_index: NameOrIndex,
) -> FutureStartMessage {
    FutureStartMessage::StaticCall(StaticCallExecutionStartMessage {
        future_id: future_id.to_string(),
        strategy: BASIC_STRATEGY_NAME.to_string(),
        dependencies: BTreeSet::new(),
        artifact_future_id: artifact_future_id.to_string(),
        contract_address,
        function_name: function_name.to_string(),
        args: Vec::new(),
        name_or_index,
        from: None,
    })
}

/// Starts binding the contract at `address`.
pub fn contract_at_start(
    future_id: &str,
    contract_name: &str,
    address: Address,
) -> FutureStartMessage {
    FutureStartMessage::ContractAt(ContractAtExecutionStartMessage {
        future_id: future_id.to_string(),
        strategy: BASIC_STRATEGY_NAME.to_string(),
        dependencies: BTreeSet::new(),
        artifact_future_id: future_id.to_string(),
        contract_name: contract_name.to_string(),
        address,
    })
}

/// Starts reading the first occurrence of `argument_name` of `event_name`.
pub fn read_event_argument_start(
    future_id: &str,
    artifact_future_id: &str,
    event_name: &str,
    argument_name: NameOrIndex,
    tx_to_read_from: TxHash,
    emitter_address: Address,
) -> FutureStartMessage {
    FutureStartMessage::ReadEventArgument(ReadEventArgumentExecutionStartMessage {
        future_id: future_id.to_string(),
        strategy: BASIC_STRATEGY_NAME.to_string(),
        dependencies: BTreeSet::new(),
        artifact_future_id: artifact_future_id.to_string(),
        event_name: event_name.to_string(),
        argument_name,
        tx_to_read_from,
        emitter_address,
        event_index: 0,
    })
}

/// Starts sending `data` to `to`.
pub fn send_data_start(future_id: &str, to: Address, data: Bytes) -> FutureStartMessage {
    FutureStartMessage::SendData(SendDataExecutionStartMessage {
        future_id: future_id.to_string(),
        strategy: BASIC_STRATEGY_NAME.to_string(),
        dependencies: BTreeSet::new(),
        to,
        data,
        value: U256::ZERO,
        from: None,
    })
}

/// Adds dependencies to a start message.
pub fn depends_on(mut message: FutureStartMessage, dependencies: &[&str]) -> FutureStartMessage {
    let (_, deps) = common_fields_mut(&mut message);
    deps.extend(dependencies.iter().map(|dependency| dependency.to_string()));
    message
}

/// Replaces the strategy of a start message.
pub fn with_strategy(mut message: FutureStartMessage, strategy: &str) -> FutureStartMessage {
    let (name, _) = common_fields_mut(&mut message);
    *name = strategy.to_string();
    message
}

fn common_fields_mut(message: &mut FutureStartMessage) -> (&mut String, &mut BTreeSet<FutureId>) {
    match message {
        FutureStartMessage::Deployment(msg) => (&mut msg.strategy, &mut msg.dependencies),
        FutureStartMessage::Call(msg) => (&mut msg.strategy, &mut msg.dependencies),
        FutureStartMessage::StaticCall(msg) => (&mut msg.strategy, &mut msg.dependencies),
        FutureStartMessage::ContractAt(msg) => (&mut msg.strategy, &mut msg.dependencies),
        FutureStartMessage::ReadEventArgument(msg) => (&mut msg.strategy, &mut msg.dependencies),
        FutureStartMessage::SendData(msg) => (&mut msg.strategy, &mut msg.dependencies),
    }
}
