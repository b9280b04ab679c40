use alloy_primitives::{address, Address, Bytes};
use ignition_core::{
    reduce_all, resolve_contract_future_to_address, resolve_future_to_value,
    test_utils::{contract_at_start, deployment_start, send_data_start, static_call_start},
    ContractAtExecutionSuccess, ExecutionFailureMessage, ExecutionStateMap, ExecutionSuccessMessage,
    FutureRef, FutureType, JournalMessage, NameOrIndex, StaticCallExecutionSuccess,
};
use rstest::rstest;
use serde_json::json;

const REGISTRY: Address = address!("0x0000000000000000000000000000000000001234");

fn state() -> ExecutionStateMap {
    let messages: Vec<JournalMessage> = vec![
        contract_at_start("Module#Registry", "Registry", REGISTRY).into(),
        ExecutionSuccessMessage::ContractAt(ContractAtExecutionSuccess {
            future_id: "Module#Registry".to_string(),
            contract_name: "Registry".to_string(),
            contract_address: REGISTRY,
        })
        .into(),
        static_call_start(
            "Module#Registry.owner",
            "Module#Registry",
            REGISTRY,
            "owner",
            NameOrIndex::default(),
        )
        .into(),
        ExecutionSuccessMessage::StaticCall(StaticCallExecutionSuccess {
            future_id: "Module#Registry.owner".to_string(),
            function_name: "owner".to_string(),
            contract_address: REGISTRY,
            result: json!("0x000000000000000000000000000000000000dEaD"),
        })
        .into(),
        deployment_start("Module#Token", "Token").into(),
        ExecutionFailureMessage {
            future_id: "Module#Token".to_string(),
            error: "reverted".to_string(),
        }
        .into(),
        send_data_start("Module#Fund", REGISTRY, Bytes::new()).into(),
    ];
    reduce_all(&ExecutionStateMap::new(), &messages).unwrap()
}

#[test]
fn test_resolves_contract_address() {
    let future = FutureRef::new("Module#Registry", FutureType::ContractAt);
    assert_eq!(resolve_contract_future_to_address(&future, &state()).unwrap(), REGISTRY);
    assert_eq!(
        resolve_future_to_value(&future, &state()).unwrap(),
        json!(REGISTRY.to_checksum(None))
    );
}

#[test]
fn test_resolves_static_call_result() {
    let future = FutureRef::new("Module#Registry.owner", FutureType::StaticCall);
    assert_eq!(
        resolve_future_to_value(&future, &state()).unwrap(),
        json!("0x000000000000000000000000000000000000dEaD")
    );
}

#[rstest]
#[case::never_executed(FutureRef::new("Module#Other", FutureType::Deployment))]
#[case::wrong_type(FutureRef::new("Module#Registry", FutureType::Deployment))]
#[case::not_succeeded(FutureRef::new("Module#Token", FutureType::Deployment))]
#[case::not_a_contract(FutureRef::new("Module#Registry.owner", FutureType::StaticCall))]
fn test_unresolvable_contracts(#[case] future: FutureRef) {
    let err = resolve_contract_future_to_address(&future, &state()).unwrap_err();
    assert!(err.is_invariant_violation(), "{err}");
}

#[test]
fn test_missing_state_is_reported() {
    let future = FutureRef::new("Module#Other", FutureType::StaticCall);
    let err = resolve_future_to_value(&future, &state()).unwrap_err();
    assert!(err.to_string().contains("No history of previous execution"), "{err}");
}

#[test]
fn test_sends_produce_no_value() {
    let future = FutureRef::new("Module#Fund", FutureType::SendData);
    assert!(resolve_future_to_value(&future, &state()).unwrap_err().is_invariant_violation());
}
