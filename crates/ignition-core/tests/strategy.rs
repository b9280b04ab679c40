//! A strategy with more than one onchain interaction per future.

use std::sync::Arc;

use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use ignition_core::{
    test_utils::{
        artifact, call_start, with_strategy, MockChainDispatcher, SendBehavior,
        StaticArtifactLoader, SENDER,
    },
    CallFunctionInteraction, CalledFunctionExecutionSuccess, ExecutionEngine,
    ExecutionFailureMessage, ExecutionState, ExecutionStrategy, ExecutionStrategyContext,
    ExecutionSuccessMessage, FutureStartMessage, IgnitionError, MemoryJournal,
    OnchainInteractionMessage, OnchainResultMessage, Result, StaticCallInteraction,
    StrategyInstance, StrategyOutput,
};

const TOKEN: &str = "Module#Token";
const MINT: &str = "Module#Token.mint";
const CHECKED: &str = "checked";

/// Reads `paused()` before sending the call, and fails the future if the contract is paused.
#[derive(Debug)]
struct CheckedCallStrategy;

impl ExecutionStrategy for CheckedCallStrategy {
    fn name(&self) -> &str {
        CHECKED
    }

    fn execute_strategy(&self, context: ExecutionStrategyContext) -> Box<dyn StrategyInstance> {
        Box::new(CheckedCall { context, step: 0 })
    }
}

#[derive(Debug)]
struct CheckedCall {
    context: ExecutionStrategyContext,
    step: u8,
}

#[async_trait]
impl StrategyInstance for CheckedCall {
    async fn step(&mut self, result: Option<OnchainResultMessage>) -> Result<StrategyOutput> {
        let ExecutionState::Call(state) = self.context.execution_state.as_ref() else {
            return Err(IgnitionError::invariant("checked strategy only runs calls"));
        };
        self.step += 1;

        match (self.step, result) {
            (1, None) => Ok(StrategyOutput::Interaction(OnchainInteractionMessage::StaticCall(
                StaticCallInteraction {
                    future_id: state.id.clone(),
                    execution_id: 1,
                    artifact_future_id: state.artifact_future_id.clone(),
                    contract_address: state.contract_address,
                    function_name: "paused".to_string(),
                    args: Vec::new(),
                    from: self.context.sender,
                },
            ))),
            (2, Some(OnchainResultMessage::StaticCallSuccess(paused))) => {
                if paused.return_data.iter().any(|byte| *byte != 0) {
                    return Ok(StrategyOutput::Done(
                        ExecutionFailureMessage {
                            future_id: state.id.clone(),
                            error: "Contract is paused".to_string(),
                        }
                        .into(),
                    ));
                }
                Ok(StrategyOutput::Interaction(OnchainInteractionMessage::CallFunction(
                    CallFunctionInteraction {
                        future_id: state.id.clone(),
                        execution_id: 2,
                        artifact_future_id: state.artifact_future_id.clone(),
                        contract_address: state.contract_address,
                        function_name: state.function_name.clone(),
                        args: state.args.clone(),
                        value: state.value,
                        from: self.context.sender,
                    },
                )))
            }
            (3, Some(OnchainResultMessage::CallFunctionSuccess(call))) => Ok(StrategyOutput::Done(
                ExecutionSuccessMessage::CalledFunction(CalledFunctionExecutionSuccess {
                    future_id: state.id.clone(),
                    function_name: state.function_name.clone(),
                    contract_address: state.contract_address,
                    tx_id: call.tx_id,
                })
                .into(),
            )),
            (step, result) => Err(IgnitionError::invariant(format!(
                "unexpected result {result:?} at step {step}"
            ))),
        }
    }
}

fn contract() -> Address {
    Address::repeat_byte(0x42)
}

fn new_engine(chain: Arc<MockChainDispatcher>) -> ExecutionEngine {
    let artifacts = StaticArtifactLoader::new().artifact(
        TOKEN,
        artifact(
            "Token",
            &["function paused() view returns (bool)", "function mint(uint256 amount)"],
            &[],
        ),
    );
    ExecutionEngine::new(Arc::new(MemoryJournal::new()), chain, Arc::new(artifacts), SENDER)
        .with_strategy(Arc::new(CheckedCallStrategy))
}

fn mint() -> FutureStartMessage {
    with_strategy(call_start(MINT, TOKEN, contract(), "mint"), CHECKED)
}

fn paused(value: bool) -> Bytes {
    let mut word = [0u8; 32];
    word[31] = u8::from(value);
    Bytes::copy_from_slice(&word)
}

#[tokio::test]
async fn test_runs_every_interaction() {
    let chain = Arc::new(MockChainDispatcher::new());
    chain.set_static_call_result(contract(), "paused", Ok(paused(false)));
    let mut engine = new_engine(chain.clone());

    let result = engine.execute(&[mint()]).await.unwrap();

    assert!(result.is_success(), "{result:?}");
    assert_eq!(chain.sent_transactions().len(), 1);
    let onchain = &engine.state().get(MINT).unwrap().base().onchain;
    assert_eq!(onchain.actions.keys().copied().collect::<Vec<_>>(), vec![1, 2]);
    assert!(onchain.actions.values().all(|action| action.result.is_some()));
}

#[tokio::test]
async fn test_strategy_can_fail_between_interactions() {
    let chain = Arc::new(MockChainDispatcher::new());
    chain.set_static_call_result(contract(), "paused", Ok(paused(true)));
    let mut engine = new_engine(chain.clone());

    let result = engine.execute(&[mint()]).await.unwrap();

    assert_eq!(result.failed.len(), 1);
    assert_eq!(result.failed[0].error, "Contract is paused");
    assert!(chain.sent_transactions().is_empty());
}

#[tokio::test]
async fn test_resumes_at_second_interaction() {
    let chain = Arc::new(MockChainDispatcher::new());
    chain.set_static_call_result(contract(), "paused", Ok(paused(false)));
    chain.push_send_behavior(SendBehavior::RpcFailure("connection reset".to_string()));
    let mut engine = new_engine(chain.clone());

    assert!(engine.execute(&[mint()]).await.is_err());

    // The first interaction is replayed from the history, not performed again.
    chain.set_static_call_result(contract(), "paused", Ok(paused(true)));
    let result = engine.execute(&[mint()]).await.unwrap();

    assert!(result.is_success(), "{result:?}");
    assert_eq!(chain.sent_transactions().len(), 1);
}
