//! Decoding of return data and revert data against a contract ABI.
//!
//! Malformed data is an expected outcome of an onchain interaction, so decoding never fails on
//! it: callers branch on [`DecodeOutcome`] and [`CustomErrorOutcome`] instead.

use std::collections::BTreeMap;

use alloy_dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy_json_abi::{Function, JsonAbi, Param};
use alloy_primitives::hex;
use alloy_sol_types::{Panic, Revert, SolError};
use serde::{Deserialize, Serialize};

use crate::{constants::SELECTOR_LEN, EvmValue, IgnitionError, Result};

/// Decoded values, by position and by name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Every value, in declaration order.
    pub numbered: Vec<EvmValue>,
    /// The values of named parameters.
    pub named: BTreeMap<String, EvmValue>,
}

impl ExecutionResult {
    fn from_values(params: &[Param], values: &[DynSolValue]) -> Self {
        let numbered: Vec<_> = values.iter().map(dyn_sol_value_to_json).collect();
        let named = params
            .iter()
            .zip(&numbered)
            .filter(|(param, _)| !param.name.is_empty())
            .map(|(param, value)| (param.name.clone(), value.clone()))
            .collect();
        Self { numbered, named }
    }
}

/// The outcome of decoding the return data of a function.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecodeOutcome {
    /// The data matched the function outputs.
    #[serde(rename = "SUCCESSFUL_EVM_EXECUTION_RESULT")]
    Result(ExecutionResult),
    /// The data did not match the function outputs.
    InvalidReturnData,
}

/// The outcome of decoding revert data as a custom error of the ABI.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustomErrorOutcome {
    /// The data is a custom error of the ABI.
    #[serde(rename_all = "camelCase")]
    CustomError {
        /// The error name.
        error_name: String,
        /// The error arguments.
        args: ExecutionResult,
    },
    /// The selector matched a custom error but its arguments could not be decoded.
    InvalidCustomError,
}

/// Decodes the return data of `function_name`.
///
/// `function_name` is either a bare name or a full signature such as `transfer(address,uint256)`;
/// an overloaded function must be referenced by signature. A function missing from the ABI is a
/// misconfiguration and fails.
pub fn decode_network_interaction_result(
    abi: &JsonAbi,
    function_name: &str,
    data: &[u8],
) -> Result<DecodeOutcome> {
    let function = find_function(abi, function_name)?;
    Ok(match function.abi_decode_output(data) {
        Ok(values) => {
            DecodeOutcome::Result(ExecutionResult::from_values(&function.outputs, &values))
        }
        Err(_) => DecodeOutcome::InvalidReturnData,
    })
}

/// The result of a send-data interaction. Arbitrary payloads have no ABI, so there is nothing to
/// decode.
pub fn decode_send_data_result() -> DecodeOutcome {
    DecodeOutcome::Result(ExecutionResult::default())
}

/// Decodes revert data as one of the custom errors of the ABI.
///
/// Returns `None` when the data does not start with the selector of any of them.
pub fn decode_custom_error(abi: &JsonAbi, data: &[u8]) -> Option<CustomErrorOutcome> {
    let (selector, args) = data.split_at_checked(SELECTOR_LEN)?;
    let error = abi.errors().find(|error| error.selector().as_slice() == selector)?;

    Some(match error.abi_decode_input(args) {
        Ok(values) => CustomErrorOutcome::CustomError {
            error_name: error.name.clone(),
            args: ExecutionResult::from_values(&error.inputs, &values),
        },
        Err(_) => CustomErrorOutcome::InvalidCustomError,
    })
}

/// Describes a failed onchain interaction.
///
/// Revert data is tried as a custom error of the ABI, then as `Error(string)`, then as
/// `Panic(uint256)`. Without revert data, or when none of them matches, the error reported by the
/// node is used.
pub fn describe_failure(abi: Option<&JsonAbi>, error: &str, return_data: Option<&[u8]>) -> String {
    let Some(data) = return_data.filter(|data| !data.is_empty()) else {
        return error.to_string();
    };

    if let Some(outcome) = abi.and_then(|abi| decode_custom_error(abi, data)) {
        return match outcome {
            CustomErrorOutcome::CustomError { error_name, args } => {
                let args: Vec<_> = args.numbered.iter().map(display_value).collect();
                format!("Reverted with custom error {error_name}({})", args.join(", "))
            }
            CustomErrorOutcome::InvalidCustomError => {
                "Reverted with a custom error that could not be decoded".to_string()
            }
        };
    }

    if let Ok(revert) = Revert::abi_decode(data) {
        return format!("Reverted with reason \"{}\"", revert.reason());
    }

    if let Ok(panic) = Panic::abi_decode(data) {
        return match panic.kind() {
            Some(kind) => format!("Reverted with panic code 0x{:x} ({kind})", panic.code),
            None => format!("Reverted with panic code 0x{:x}", panic.code),
        };
    }

    format!("{error} (return data: {})", hex::encode_prefixed(data))
}

/// Converts a decoded value to its JSON form.
pub fn dyn_sol_value_to_json(value: &DynSolValue) -> EvmValue {
    match value {
        DynSolValue::Bool(value) => EvmValue::Bool(*value),
        DynSolValue::Int(value, _) => EvmValue::String(value.to_string()),
        DynSolValue::Uint(value, _) => EvmValue::String(value.to_string()),
        DynSolValue::FixedBytes(word, size) => {
            EvmValue::String(hex::encode_prefixed(&word[..(*size).min(32)]))
        }
        DynSolValue::Address(address) => EvmValue::String(address.to_checksum(None)),
        DynSolValue::Function(function) => EvmValue::String(hex::encode_prefixed(function)),
        DynSolValue::Bytes(bytes) => EvmValue::String(hex::encode_prefixed(bytes)),
        DynSolValue::String(value) => EvmValue::String(value.clone()),
        DynSolValue::Array(values) |
        DynSolValue::FixedArray(values) |
        DynSolValue::Tuple(values) => {
            EvmValue::Array(values.iter().map(dyn_sol_value_to_json).collect())
        }
        DynSolValue::CustomStruct { prop_names, tuple, .. } => EvmValue::Object(
            prop_names.iter().cloned().zip(tuple.iter().map(dyn_sol_value_to_json)).collect(),
        ),
    }
}

fn display_value(value: &EvmValue) -> String {
    match value {
        EvmValue::String(value) => value.clone(),
        other => other.to_string(),
    }
}

fn find_function<'a>(abi: &'a JsonAbi, function_name: &str) -> Result<&'a Function> {
    if function_name.contains('(') {
        return abi.functions().find(|function| function.signature() == function_name).ok_or_else(
            || IgnitionError::invariant(format!("Function {function_name} not found in the ABI")),
        );
    }

    match abi.function(function_name).map(Vec::as_slice) {
        Some([function]) => Ok(function),
        Some([]) | None => {
            Err(IgnitionError::invariant(format!("Function {function_name} not found in the ABI")))
        }
        Some(_) => Err(IgnitionError::invariant(format!(
            "Function {function_name} is overloaded and must be referenced by its signature"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, Address, U256};
    use alloy_sol_types::{sol, SolError};
    use serde_json::json;

    use super::*;

    sol! {
        error InsufficientBalance(uint256 available, uint256 required);
    }

    fn abi() -> JsonAbi {
        JsonAbi::parse([
            "function owner() external view returns (address)",
            "function balances(address account) external view \
             returns (uint256 balance, bool frozen)",
            "function transfer(address to, uint256 amount) external returns (bool)",
            "function transfer(address to) external returns (bool)",
            "error InsufficientBalance(uint256 available, uint256 required)",
        ])
        .unwrap()
    }

    #[test]
    fn test_decode_named_outputs() {
        let data = DynSolValue::Tuple(vec![
            DynSolValue::Uint(U256::from(42), 256),
            DynSolValue::Bool(true),
        ])
        .abi_encode_params();

        let outcome = decode_network_interaction_result(&abi(), "balances", &data).unwrap();
        let DecodeOutcome::Result(result) = outcome else { panic!("expected a result") };
        assert_eq!(result.numbered, vec![json!("42"), json!(true)]);
        assert_eq!(result.named["balance"], json!("42"));
        assert_eq!(result.named["frozen"], json!(true));
    }

    #[test]
    fn test_decode_address_is_checksummed() {
        let owner = address!("0x5FbDB2315678afecb367f032d93F642f64180aa3");
        let data = DynSolValue::Address(owner).abi_encode();

        let outcome = decode_network_interaction_result(&abi(), "owner", &data).unwrap();
        let DecodeOutcome::Result(result) = outcome else { panic!("expected a result") };
        assert_eq!(result.numbered, vec![json!("0x5FbDB2315678afecb367f032d93F642f64180aa3")]);
        assert!(result.named.is_empty());
    }

    #[test]
    fn test_struct_values_keep_property_names() {
        let value = DynSolValue::CustomStruct {
            name: "Position".to_string(),
            prop_names: vec!["owner".to_string(), "amounts".to_string()],
            tuple: vec![
                DynSolValue::Address(Address::ZERO),
                DynSolValue::Array(vec![DynSolValue::Uint(U256::from(7), 256)]),
            ],
        };
        assert_eq!(
            dyn_sol_value_to_json(&value),
            json!({
                "owner": "0x0000000000000000000000000000000000000000",
                "amounts": ["7"],
            })
        );
    }

    #[test]
    fn test_unexpected_return_data_is_not_an_error() {
        let outcome = decode_network_interaction_result(&abi(), "owner", &[0x12, 0x34]).unwrap();
        assert_eq!(outcome, DecodeOutcome::InvalidReturnData);
    }

    #[test]
    fn test_missing_or_overloaded_function_fails() {
        let err = decode_network_interaction_result(&abi(), "mint", &[]).unwrap_err();
        assert!(err.is_invariant_violation());

        let err = decode_network_interaction_result(&abi(), "transfer", &[]).unwrap_err();
        assert!(err.to_string().contains("overloaded"));

        let data = DynSolValue::Bool(true).abi_encode();
        let outcome =
            decode_network_interaction_result(&abi(), "transfer(address)", &data).unwrap();
        assert_eq!(
            outcome,
            DecodeOutcome::Result(ExecutionResult {
                numbered: vec![json!(true)],
                named: BTreeMap::new(),
            })
        );
    }

    #[test]
    fn test_send_data_result_is_empty() {
        assert_eq!(decode_send_data_result(), DecodeOutcome::Result(ExecutionResult::default()));
    }

    #[test]
    fn test_decode_custom_error() {
        let data =
            InsufficientBalance { available: U256::from(1), required: U256::from(2) }.abi_encode();

        let outcome = decode_custom_error(&abi(), &data).unwrap();
        let CustomErrorOutcome::CustomError { error_name, args } = outcome else {
            panic!("expected a custom error");
        };
        assert_eq!(error_name, "InsufficientBalance");
        assert_eq!(args.numbered, vec![json!("1"), json!("2")]);
        assert_eq!(args.named["required"], json!("2"));
    }

    #[test]
    fn test_custom_error_with_bad_arguments() {
        let data = InsufficientBalance::SELECTOR.to_vec();
        assert_eq!(
            decode_custom_error(&abi(), &data),
            Some(CustomErrorOutcome::InvalidCustomError)
        );
    }

    #[test]
    fn test_custom_error_selector_mismatch() {
        assert_eq!(decode_custom_error(&abi(), &[0xde, 0xad, 0xbe, 0xef, 0x00]), None);
        assert_eq!(decode_custom_error(&abi(), &[0xde, 0xad]), None);
    }

    #[test]
    fn test_describe_failure() {
        let custom =
            InsufficientBalance { available: U256::from(1), required: U256::from(2) }.abi_encode();
        assert_eq!(
            describe_failure(Some(&abi()), "execution reverted", Some(&custom)),
            "Reverted with custom error InsufficientBalance(1, 2)"
        );

        let revert = Revert::from("not owner").abi_encode();
        assert_eq!(
            describe_failure(Some(&abi()), "execution reverted", Some(&revert)),
            "Reverted with reason \"not owner\""
        );

        let panic = Panic::from(0x11).abi_encode();
        assert!(describe_failure(None, "execution reverted", Some(&panic))
            .starts_with("Reverted with panic code 0x11"));

        assert_eq!(describe_failure(None, "out of gas", None), "out of gas");
    }
}
