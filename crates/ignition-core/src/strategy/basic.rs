use std::sync::Arc;

use alloy_json_abi::JsonAbi;
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;

use crate::{
    constants::{BASIC_STRATEGY_NAME, FIRST_EXECUTION_ID},
    decode_network_interaction_result, describe_failure, ArtifactLoader, CallFunctionInteraction,
    CalledFunctionExecutionSuccess, ContractAtExecutionSuccess, ContractAtInteraction,
    DecodeOutcome, DeployContractInteraction, DeployedContractExecutionSuccess, EvmValue,
    ExecutionFailureMessage, ExecutionResult, ExecutionResultMessage, ExecutionState,
    ExecutionStrategy, ExecutionStrategyContext, ExecutionSuccessMessage, FutureId, IgnitionError,
    NameOrIndex, OnchainFailureMessage, OnchainInteractionMessage, OnchainResultMessage,
    ReadEventArgumentExecutionSuccess, ReadEventArgumentInteraction, Result,
    SendDataExecutionSuccess, SendDataInteraction, StaticCallExecutionState,
    StaticCallExecutionSuccess, StaticCallInteraction, StrategyInstance, StrategyOutput,
};

/// Executes every future with a single onchain interaction.
#[derive(Clone, Debug)]
pub struct BasicStrategy {
    artifacts: Arc<dyn ArtifactLoader>,
}

impl BasicStrategy {
    /// Creates a new [`BasicStrategy`] that loads ABIs from `artifacts`.
    pub fn new(artifacts: Arc<dyn ArtifactLoader>) -> Self {
        Self { artifacts }
    }
}

impl ExecutionStrategy for BasicStrategy {
    fn name(&self) -> &str {
        BASIC_STRATEGY_NAME
    }

    fn execute_strategy(&self, context: ExecutionStrategyContext) -> Box<dyn StrategyInstance> {
        Box::new(BasicStrategyInstance {
            execution_state: context.execution_state,
            sender: context.sender,
            artifacts: Arc::clone(&self.artifacts),
            step: BasicStep::NotStarted,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BasicStep {
    NotStarted,
    AwaitingResult,
    Finished,
}

#[derive(Debug)]
struct BasicStrategyInstance {
    execution_state: Arc<ExecutionState>,
    sender: Address,
    artifacts: Arc<dyn ArtifactLoader>,
    step: BasicStep,
}

#[async_trait]
impl StrategyInstance for BasicStrategyInstance {
    async fn step(&mut self, result: Option<OnchainResultMessage>) -> Result<StrategyOutput> {
        match (self.step, result) {
            (BasicStep::NotStarted, None) => {
                self.step = BasicStep::AwaitingResult;
                Ok(StrategyOutput::Interaction(self.interaction()))
            }
            (BasicStep::AwaitingResult, Some(result)) => {
                let done = self.finish(result).await?;
                self.step = BasicStep::Finished;
                Ok(StrategyOutput::Done(done))
            }
            (step, result) => Err(IgnitionError::invariant(format!(
                "Basic strategy of future {} cannot be resumed with {} in step {step:?}",
                self.execution_state.id(),
                if result.is_some() { "a result" } else { "no result" },
            ))),
        }
    }
}

impl BasicStrategyInstance {
    fn future_id(&self) -> FutureId {
        self.execution_state.id().clone()
    }

    fn interaction(&self) -> OnchainInteractionMessage {
        let future_id = self.future_id();
        let execution_id = FIRST_EXECUTION_ID;
        let sender = self.execution_state.from().unwrap_or(self.sender);

        match self.execution_state.as_ref() {
            ExecutionState::Deployment(state) => {
                OnchainInteractionMessage::DeployContract(DeployContractInteraction {
                    future_id,
                    execution_id,
                    artifact_future_id: state.artifact_future_id.clone(),
                    contract_name: state.contract_name.clone(),
                    constructor_args: state.constructor_args.clone(),
                    libraries: state.libraries.clone(),
                    value: state.value,
                    from: sender,
                })
            }
            ExecutionState::Call(state) => {
                OnchainInteractionMessage::CallFunction(CallFunctionInteraction {
                    future_id,
                    execution_id,
                    artifact_future_id: state.artifact_future_id.clone(),
                    contract_address: state.contract_address,
                    function_name: state.function_name.clone(),
                    args: state.args.clone(),
                    value: state.value,
                    from: sender,
                })
            }
            ExecutionState::StaticCall(state) => {
                OnchainInteractionMessage::StaticCall(StaticCallInteraction {
                    future_id,
                    execution_id,
                    artifact_future_id: state.artifact_future_id.clone(),
                    contract_address: state.contract_address,
                    function_name: state.function_name.clone(),
                    args: state.args.clone(),
                    from: sender,
                })
            }
            ExecutionState::ContractAt(state) => {
                OnchainInteractionMessage::ContractAt(ContractAtInteraction {
                    future_id,
                    execution_id,
                    artifact_future_id: state.artifact_future_id.clone(),
                    contract_name: state.contract_name.clone(),
                    contract_address: state.address,
                })
            }
            ExecutionState::ReadEventArgument(state) => {
                OnchainInteractionMessage::ReadEventArgument(ReadEventArgumentInteraction {
                    future_id,
                    execution_id,
                    artifact_future_id: state.artifact_future_id.clone(),
                    event_name: state.event_name.clone(),
                    argument_name: state.argument_name.clone(),
                    event_index: state.event_index,
                    emitter_address: state.emitter_address,
                    tx_to_read_from: state.tx_to_read_from,
                })
            }
            ExecutionState::SendData(state) => {
                OnchainInteractionMessage::SendData(SendDataInteraction {
                    future_id,
                    execution_id,
                    to: state.to,
                    data: state.data.clone(),
                    value: state.value,
                    from: sender,
                })
            }
        }
    }

    async fn finish(&self, result: OnchainResultMessage) -> Result<ExecutionResultMessage> {
        let future_id = self.future_id();
        let success = match (self.execution_state.as_ref(), result) {
            (
                ExecutionState::Deployment(state),
                OnchainResultMessage::DeployContractSuccess(msg),
            ) => ExecutionSuccessMessage::DeployedContract(DeployedContractExecutionSuccess {
                future_id,
                contract_name: state.contract_name.clone(),
                contract_address: msg.contract_address,
                tx_id: msg.tx_id,
            }),
            (ExecutionState::Call(state), OnchainResultMessage::CallFunctionSuccess(msg)) => {
                ExecutionSuccessMessage::CalledFunction(CalledFunctionExecutionSuccess {
                    future_id,
                    function_name: state.function_name.clone(),
                    contract_address: state.contract_address,
                    tx_id: msg.tx_id,
                })
            }
            (ExecutionState::StaticCall(state), OnchainResultMessage::StaticCallSuccess(msg)) => {
                return self.static_call_result(state, &msg.return_data).await;
            }
            (
                ExecutionState::ReadEventArgument(state),
                OnchainResultMessage::ReadEventArgumentSuccess(msg),
            ) => ExecutionSuccessMessage::ReadEventArgument(ReadEventArgumentExecutionSuccess {
                future_id,
                event_name: state.event_name.clone(),
                argument_name: state.argument_name.clone(),
                result: msg.result,
            }),
            (ExecutionState::SendData(_), OnchainResultMessage::SendDataSuccess(msg)) => {
                ExecutionSuccessMessage::SendData(SendDataExecutionSuccess {
                    future_id,
                    tx_id: msg.tx_id,
                })
            }
            (ExecutionState::ContractAt(state), OnchainResultMessage::ContractAtSuccess(msg)) => {
                ExecutionSuccessMessage::ContractAt(ContractAtExecutionSuccess {
                    future_id,
                    contract_name: state.contract_name.clone(),
                    contract_address: msg.contract_address,
                })
            }
            (_, OnchainResultMessage::Failure(msg)) => return self.failure_result(&msg).await,
            (state, result) => {
                return Err(IgnitionError::invariant(format!(
                    "Basic strategy of {} future {future_id} got an unexpected result {:?}",
                    state.future_type(),
                    result.success_kind()
                )))
            }
        };
        Ok(success.into())
    }

    async fn static_call_result(
        &self,
        state: &StaticCallExecutionState,
        return_data: &Bytes,
    ) -> Result<ExecutionResultMessage> {
        let artifact = self.artifacts.load_artifact(&state.artifact_future_id).await?;
        let outcome =
            decode_network_interaction_result(&artifact.abi, &state.function_name, return_data)?;

        let DecodeOutcome::Result(result) = outcome else {
            return Ok(self.failure(format!(
                "Function {} returned data that does not match its outputs",
                state.function_name
            )));
        };
        let Some(value) = select_output(&result, &state.name_or_index) else {
            return Ok(self.failure(format!(
                "Function {} has no output {}",
                state.function_name, state.name_or_index
            )));
        };

        Ok(ExecutionSuccessMessage::StaticCall(StaticCallExecutionSuccess {
            future_id: self.future_id(),
            function_name: state.function_name.clone(),
            contract_address: state.contract_address,
            result: value,
        })
        .into())
    }

    async fn failure_result(&self, msg: &OnchainFailureMessage) -> Result<ExecutionResultMessage> {
        let abi = self.abi().await?;
        let return_data = msg.return_data.as_ref().map(|data| &data[..]);
        let error = describe_failure(abi.as_ref(), &msg.error, return_data);
        Ok(self.failure(error))
    }

    /// The ABI of the target contract. Sends have none.
    async fn abi(&self) -> Result<Option<JsonAbi>> {
        let artifact_future_id = match self.execution_state.as_ref() {
            ExecutionState::Deployment(state) => &state.artifact_future_id,
            ExecutionState::Call(state) => &state.artifact_future_id,
            ExecutionState::StaticCall(state) => &state.artifact_future_id,
            ExecutionState::ContractAt(state) => &state.artifact_future_id,
            ExecutionState::ReadEventArgument(state) => &state.artifact_future_id,
            ExecutionState::SendData(_) => return Ok(None),
        };
        Ok(Some(self.artifacts.load_artifact(artifact_future_id).await?.abi))
    }

    fn failure(&self, error: String) -> ExecutionResultMessage {
        ExecutionFailureMessage { future_id: self.future_id(), error }.into()
    }
}

/// Selects one decoded output.
pub fn select_output(result: &ExecutionResult, name_or_index: &NameOrIndex) -> Option<EvmValue> {
    match name_or_index {
        NameOrIndex::Index(index) => result.numbered.get(*index).cloned(),
        NameOrIndex::Name(name) => result.named.get(name).cloned(),
    }
}
