//! The loop that drives futures to completion against a chain.

use std::sync::Arc;

use alloy_primitives::{Address, TxHash, TxKind};
use alloy_rpc_types_eth::{TransactionInput, TransactionRequest};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    error::ensure_invariant, execution_state_reducer, fast_forward, load_execution_state,
    ArtifactLoader, BasicStrategy, CallFunctionSuccessMessage, ChainDispatcher, Clock,
    ContractAtSuccessMessage, DeployContractSuccessMessage, DispatchError, ExecutionConfig,
    ExecutionHoldMessage, ExecutionId, ExecutionStateMap,
    ExecutionStatus, ExecutionStrategy, ExecutionStrategyContext, ExecutionTimeoutMessage,
    FastForward, FutureId, FutureStartMessage, IgnitionError, Journal, JournalMessage,
    LastMessage, MonotonicClock, OnchainFailureMessage, OnchainInteractionMessage,
    OnchainResultMessage, OnchainTransactionAccept, OnchainTransactionRequest,
    OnchainTransactionReset, ReadEventArgumentSuccessMessage, Result, SendDataSuccessMessage,
    StartRunMessage, StaticCallSuccessMessage, StrategyOutput, StrategyRegistry,
    TransactionLookup, TransactionLookupTimer, TransactionMessage, TransactionReceipt,
};

/// A future that failed, with its recorded error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedFuture {
    /// The future id.
    pub future_id: FutureId,
    /// The recorded error.
    pub error: String,
}

/// A future on hold, with the reason it was put on hold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeldFuture {
    /// The future id.
    pub future_id: FutureId,
    /// Why the future was put on hold.
    pub reason: String,
}

/// A future whose transaction was not mined in time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedOutFuture {
    /// The future id.
    pub future_id: FutureId,
    /// The execution the transaction belongs to.
    pub execution_id: ExecutionId,
    /// The pending transaction.
    pub tx_hash: TxHash,
}

/// The outcome of a run, per future.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    /// Futures that succeeded, in this run or an earlier one.
    pub successful: Vec<FutureId>,
    /// Futures that failed.
    pub failed: Vec<FailedFuture>,
    /// Futures waiting for manual intervention.
    pub held: Vec<HeldFuture>,
    /// Futures that will be retried on the next run.
    pub timed_out: Vec<TimedOutFuture>,
    /// Futures not executed because one of their dependencies did not succeed.
    pub blocked: Vec<FutureId>,
}

impl DeploymentResult {
    /// Returns `true` if every future succeeded.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() &&
            self.held.is_empty() &&
            self.timed_out.is_empty() &&
            self.blocked.is_empty()
    }
}

/// Where the onchain side of a future stands after the engine acted on it.
#[derive(Debug)]
enum Advance {
    /// The interaction completed; resume the strategy with its result.
    Resume(OnchainResultMessage),
    /// The future was put on hold or timed out; stop driving it for this run.
    Stop,
}

/// The lifecycle of one transaction of a future.
#[derive(Debug)]
enum TransactionStep {
    Send,
    Wait(TxHash),
    Done(Advance),
}

/// Drives futures through their strategies, recording every step in the journal.
///
/// Every message is recorded in the journal before it is folded into the in-memory state, so the
/// state can always be rebuilt from the journal after a crash.
#[derive(Debug)]
pub struct ExecutionEngine {
    journal: Arc<dyn Journal>,
    dispatcher: Arc<dyn ChainDispatcher>,
    artifacts: Arc<dyn ArtifactLoader>,
    strategies: StrategyRegistry,
    config: ExecutionConfig,
    default_sender: Address,
    clock: Arc<dyn Clock>,
    timer: TransactionLookupTimer<Arc<dyn Clock>>,
    state: ExecutionStateMap,
}

impl ExecutionEngine {
    /// Creates an engine with the basic strategy registered and the default configuration.
    pub fn new(
        journal: Arc<dyn Journal>,
        dispatcher: Arc<dyn ChainDispatcher>,
        artifacts: Arc<dyn ArtifactLoader>,
        default_sender: Address,
    ) -> Self {
        let config = ExecutionConfig::default();
        let strategies = StrategyRegistry::new()
            .with_strategy(Arc::new(BasicStrategy::new(Arc::clone(&artifacts))));
        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
        Self {
            journal,
            dispatcher,
            artifacts,
            strategies,
            config,
            default_sender,
            timer: TransactionLookupTimer::with_clock(
                config.transaction_timeout_ms,
                Arc::clone(&clock),
            ),
            clock,
            state: ExecutionStateMap::new(),
        }
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: ExecutionConfig) -> Self {
        self.config = config;
        self.timer = TransactionLookupTimer::with_clock(
            config.transaction_timeout_ms,
            Arc::clone(&self.clock),
        );
        self
    }

    /// Sets the clock of the transaction lookup timer.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.timer = TransactionLookupTimer::with_clock(
            self.config.transaction_timeout_ms,
            Arc::clone(&clock),
        );
        self.clock = clock;
        self
    }

    /// Registers an additional strategy.
    pub fn with_strategy(mut self, strategy: Arc<dyn ExecutionStrategy>) -> Self {
        self.strategies.register(strategy);
        self
    }

    /// The current execution state.
    pub const fn state(&self) -> &ExecutionStateMap {
        &self.state
    }

    /// Rebuilds the execution state from the journal.
    pub fn load(&mut self) -> Result<()> {
        self.state = load_execution_state(self.journal.as_ref())?;
        debug!(futures = self.state.len(), "Loaded execution state from journal");
        Ok(())
    }

    /// Runs the given futures, in order.
    ///
    /// Futures that already succeeded are skipped, failed and held futures are reported as they
    /// are, and futures whose dependencies did not all succeed are not started.
    pub async fn execute(&mut self, futures: &[FutureStartMessage]) -> Result<DeploymentResult> {
        info!(futures = futures.len(), "Starting deployment run");
        self.record(StartRunMessage {}.into())?;

        let mut result = DeploymentResult::default();
        for future in futures {
            let future_id = future.future_id();
            if let Some(existing) = self.state.get(future_id) {
                ensure_invariant!(
                    existing.future_type() == future.future_type(),
                    "Future {future_id} is a {} but was previously executed as a {}",
                    future.future_type(),
                    existing.future_type()
                );
            } else {
                let blocked = future.dependencies().iter().any(|dependency| {
                    self.state.get(dependency).map(|state| state.status()) !=
                        Some(ExecutionStatus::Success)
                });
                if blocked {
                    warn!(
                        future_id = %future_id,
                        "Dependencies did not succeed, not starting future"
                    );
                    result.blocked.push(future_id.clone());
                    continue;
                }
                // Recorded start messages always name their sender.
                self.record(future.clone().with_default_sender(self.default_sender).into())?;
            }

            let status = self.state.get(future_id).map(|state| state.status());
            if status == Some(ExecutionStatus::Started) {
                self.execute_future(future_id).await?;
            }
            self.collect(future_id, &mut result)?;
        }

        info!(
            successful = result.successful.len(),
            failed = result.failed.len(),
            held = result.held.len(),
            timed_out = result.timed_out.len(),
            blocked = result.blocked.len(),
            "Deployment run finished"
        );
        Ok(result)
    }

    /// Records a message in the journal, then folds it into the state.
    fn record(&mut self, message: JournalMessage) -> Result<()> {
        self.journal.record(&message)?;
        self.state = execution_state_reducer(&self.state, &message)?;
        Ok(())
    }

    fn collect(&self, future_id: &FutureId, result: &mut DeploymentResult) -> Result<()> {
        let state = self.state.get(future_id).ok_or_else(|| {
            IgnitionError::invariant(format!("No execution state for future {future_id}"))
        })?;
        let base = state.base();
        match base.status {
            ExecutionStatus::Success => result.successful.push(future_id.clone()),
            ExecutionStatus::Failed => result.failed.push(FailedFuture {
                future_id: future_id.clone(),
                error: base.reason.clone().unwrap_or_default(),
            }),
            ExecutionStatus::Hold => result.held.push(HeldFuture {
                future_id: future_id.clone(),
                reason: base.reason.clone().unwrap_or_default(),
            }),
            ExecutionStatus::Timeout => {
                let (Some(execution_id), Some(tx_hash)) =
                    (base.onchain.current_execution, base.onchain.tx_hash)
                else {
                    return Err(IgnitionError::invariant(format!(
                        "Future {future_id} timed out without a pending transaction"
                    )));
                };
                result.timed_out.push(TimedOutFuture {
                    future_id: future_id.clone(),
                    execution_id,
                    tx_hash,
                });
            }
            ExecutionStatus::Started => {
                return Err(IgnitionError::invariant(format!(
                    "Future {future_id} is still started after being executed"
                )))
            }
        }
        Ok(())
    }

    /// Drives one started future until it finishes, is put on hold or times out.
    async fn execute_future(&mut self, future_id: &FutureId) -> Result<()> {
        let execution_state = self.state.get_shared(future_id).cloned().ok_or_else(|| {
            IgnitionError::invariant(format!("No execution state for future {future_id}"))
        })?;
        let strategy = self.strategies.get(&execution_state.base().strategy)?;
        let instance = strategy.execute_strategy(ExecutionStrategyContext {
            execution_state: Arc::clone(&execution_state),
            sender: execution_state.from().unwrap_or(self.default_sender),
        });

        let FastForward { mut strategy, mut last_message } =
            fast_forward(&execution_state, instance).await?;
        info!(
            future_id = %future_id,
            strategy = %execution_state.base().strategy,
            resumed = last_message.is_some(),
            "Executing future"
        );

        loop {
            let output = match last_message.take() {
                None => strategy.step(None).await?,
                Some(LastMessage::Result(result)) => {
                    self.record(result.into())?;
                    return Ok(());
                }
                Some(LastMessage::Transaction(message)) => match self.advance(message).await? {
                    Advance::Resume(result) => strategy.step(Some(result)).await?,
                    Advance::Stop => return Ok(()),
                },
            };

            last_message = Some(match output {
                StrategyOutput::Interaction(interaction) => {
                    LastMessage::Transaction(interaction.into())
                }
                StrategyOutput::Done(result) => LastMessage::Result(result),
            });
        }
    }

    /// Acts on the last transaction-level message of a future.
    async fn advance(&mut self, message: TransactionMessage) -> Result<Advance> {
        match message {
            TransactionMessage::Interaction(interaction) => {
                let recorded = self.state.get(interaction.future_id()).is_some_and(|state| {
                    state.base().onchain.actions.contains_key(&interaction.execution_id())
                });
                if !recorded {
                    self.record(interaction.clone().into())?;
                }
                self.perform(&interaction).await
            }
            TransactionMessage::Request(request) => {
                let pending = self.dispatcher.get_pending_transaction_count(request.from).await?;
                if pending > request.nonce {
                    let reason = format!(
                        "The transaction with nonce {} from {} may have been sent, but its hash \
                         was not recorded",
                        request.nonce, request.from
                    );
                    warn!(
                        future_id = %request.future_id,
                        nonce = request.nonce,
                        "Putting future on hold"
                    );
                    let hold = ExecutionHoldMessage { future_id: request.future_id, reason };
                    self.record(hold.into())?;
                    return Ok(Advance::Stop);
                }

                info!(
                    future_id = %request.future_id,
                    nonce = request.nonce,
                    "Transaction was never sent, resending"
                );
                self.record(
                    OnchainTransactionReset {
                        future_id: request.future_id.clone(),
                        execution_id: request.execution_id,
                    }
                    .into(),
                )?;
                let interaction = self.current_interaction(&request.future_id)?;
                self.drive_transaction(&interaction, TransactionStep::Send).await
            }
            TransactionMessage::Accept(accept) => {
                let interaction = self.current_interaction(&accept.future_id)?;
                self.drive_transaction(&interaction, TransactionStep::Wait(accept.tx_hash)).await
            }
            TransactionMessage::Reset(reset) => {
                let interaction = self.current_interaction(&reset.future_id)?;
                self.drive_transaction(&interaction, TransactionStep::Send).await
            }
            TransactionMessage::Result(result) => Err(IgnitionError::invariant(format!(
                "Onchain result of future {} was not handed to its strategy",
                result.future_id()
            ))),
        }
    }

    /// Performs a recorded interaction.
    async fn perform(&mut self, interaction: &OnchainInteractionMessage) -> Result<Advance> {
        let future_id = interaction.future_id().clone();
        let execution_id = interaction.execution_id();

        let outcome = match interaction {
            OnchainInteractionMessage::DeployContract(_) |
            OnchainInteractionMessage::CallFunction(_) |
            OnchainInteractionMessage::SendData(_) => {
                return self.drive_transaction(interaction, TransactionStep::Send).await
            }
            OnchainInteractionMessage::StaticCall(call) => {
                let artifact = self.artifacts.load_artifact(&call.artifact_future_id).await?;
                debug!(
                    future_id = %future_id,
                    function = %call.function_name,
                    "Performing static call"
                );
                self.dispatcher.static_call_query(&artifact, call).await.map(|return_data| {
                    OnchainResultMessage::StaticCallSuccess(StaticCallSuccessMessage {
                        future_id: future_id.clone(),
                        execution_id,
                        return_data,
                    })
                })
            }
            OnchainInteractionMessage::ReadEventArgument(read) => {
                let artifact = self.artifacts.load_artifact(&read.artifact_future_id).await?;
                debug!(future_id = %future_id, event = %read.event_name, "Reading event argument");
                self.dispatcher.get_event_argument(&artifact, read).await.map(|result| {
                    OnchainResultMessage::ReadEventArgumentSuccess(ReadEventArgumentSuccessMessage {
                        future_id: future_id.clone(),
                        execution_id,
                        result,
                    })
                })
            }
            OnchainInteractionMessage::ContractAt(contract_at) => {
                Ok(OnchainResultMessage::ContractAtSuccess(ContractAtSuccessMessage {
                    future_id: future_id.clone(),
                    execution_id,
                    contract_address: contract_at.contract_address,
                }))
            }
        };

        let result = match outcome {
            Ok(result) => result,
            Err(err) => failure_result(future_id, execution_id, err)?,
        };
        self.record(result.clone().into())?;
        Ok(Advance::Resume(result))
    }

    /// Sends the transaction of an interaction and waits for it, resending it when the node drops
    /// it.
    async fn drive_transaction(
        &mut self,
        interaction: &OnchainInteractionMessage,
        mut step: TransactionStep,
    ) -> Result<Advance> {
        loop {
            step = match step {
                TransactionStep::Send => self.send(interaction).await?,
                TransactionStep::Wait(tx_hash) => self.wait_for(interaction, tx_hash).await?,
                TransactionStep::Done(advance) => return Ok(advance),
            };
        }
    }

    async fn send(&mut self, interaction: &OnchainInteractionMessage) -> Result<TransactionStep> {
        let future_id = interaction.future_id().clone();
        let execution_id = interaction.execution_id();
        let from = interaction.from().ok_or_else(|| {
            IgnitionError::invariant(format!(
                "The {} action of future {future_id} does not send transactions",
                interaction.kind()
            ))
        })?;

        let nonce = self.dispatcher.allocate_next_nonce_for_account(from).await?;
        let tx = match interaction {
            OnchainInteractionMessage::DeployContract(deploy) => {
                let artifact = self.artifacts.load_artifact(&deploy.artifact_future_id).await?;
                self.dispatcher.construct_deploy_transaction(&artifact, deploy, nonce).await
            }
            OnchainInteractionMessage::CallFunction(call) => {
                let artifact = self.artifacts.load_artifact(&call.artifact_future_id).await?;
                self.dispatcher.construct_call_transaction(&artifact, call, nonce).await
            }
            OnchainInteractionMessage::SendData(send) => Ok(TransactionRequest {
                from: Some(send.from),
                to: Some(TxKind::Call(send.to)),
                value: Some(send.value),
                nonce: Some(nonce),
                input: TransactionInput::new(send.data.clone()),
                ..Default::default()
            }),
            OnchainInteractionMessage::StaticCall(_) |
            OnchainInteractionMessage::ReadEventArgument(_) |
            OnchainInteractionMessage::ContractAt(_) => {
                return Err(IgnitionError::invariant(format!(
                    "Cannot send a transaction for the {} action of future {future_id}",
                    interaction.kind()
                )))
            }
        };
        let tx = match tx {
            Ok(tx) => tx,
            Err(err) => return self.record_failure(future_id, execution_id, err),
        };

        self.record(
            OnchainTransactionRequest {
                future_id: future_id.clone(),
                execution_id,
                from,
                nonce,
                tx: tx.clone(),
            }
            .into(),
        )?;

        info!(future_id = %future_id, %from, nonce, "Sending transaction");
        let tx_hash = match self.dispatcher.send_tx(&tx).await {
            Ok(tx_hash) => tx_hash,
            Err(err) => return self.record_failure(future_id, execution_id, err),
        };

        self.record(OnchainTransactionAccept { future_id, execution_id, tx_hash }.into())?;
        Ok(TransactionStep::Wait(tx_hash))
    }

    async fn wait_for(
        &mut self,
        interaction: &OnchainInteractionMessage,
        tx_hash: TxHash,
    ) -> Result<TransactionStep> {
        let future_id = interaction.future_id().clone();
        let execution_id = interaction.execution_id();
        self.timer.register_start_time_if_needed(TransactionLookup {
            future_id: future_id.clone(),
            execution_id,
            tx_hash,
        });
        debug!(future_id = %future_id, %tx_hash, "Waiting for transaction");

        loop {
            if let Some(receipt) = self.dispatcher.get_transaction_receipt(tx_hash).await? {
                let block = self.dispatcher.get_current_block().await?;
                let confirmations = block.number.saturating_sub(receipt.block_number) + 1;
                if confirmations >= self.config.required_confirmations {
                    self.timer.remove(tx_hash);
                    info!(
                        future_id = %future_id,
                        %tx_hash,
                        block = receipt.block_number,
                        "Transaction mined"
                    );
                    let result = receipt_result(interaction, &receipt);
                    self.record(result.clone().into())?;
                    return Ok(TransactionStep::Done(Advance::Resume(result)));
                }
            } else if self.dispatcher.get_transaction(tx_hash).await?.is_none() {
                warn!(
                    future_id = %future_id,
                    %tx_hash,
                    "Transaction dropped by the node, resending"
                );
                self.timer.remove(tx_hash);
                self.record(OnchainTransactionReset { future_id, execution_id }.into())?;
                return Ok(TransactionStep::Send);
            }

            if self.timer.is_timed_out(tx_hash)? {
                warn!(future_id = %future_id, %tx_hash, "Transaction timed out");
                self.timer.remove(tx_hash);
                self.record(ExecutionTimeoutMessage { future_id, execution_id, tx_hash }.into())?;
                return Ok(TransactionStep::Done(Advance::Stop));
            }

            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    /// Records the failure of an interaction reported by the dispatcher. RPC errors are returned
    /// to the caller instead.
    fn record_failure(
        &mut self,
        future_id: FutureId,
        execution_id: ExecutionId,
        err: DispatchError,
    ) -> Result<TransactionStep> {
        let result = failure_result(future_id, execution_id, err)?;
        self.record(result.clone().into())?;
        Ok(TransactionStep::Done(Advance::Resume(result)))
    }

    fn current_interaction(&self, future_id: &str) -> Result<OnchainInteractionMessage> {
        self.state
            .get(future_id)
            .and_then(|state| state.base().onchain.current_action())
            .map(|action| action.interaction.clone())
            .ok_or_else(|| {
                IgnitionError::invariant(format!("Future {future_id} has no action in flight"))
            })
    }
}

/// Turns a revert into an onchain failure. Other dispatch errors are not domain outcomes.
fn failure_result(
    future_id: FutureId,
    execution_id: ExecutionId,
    err: DispatchError,
) -> Result<OnchainResultMessage> {
    match err {
        DispatchError::Reverted { message, return_data } => {
            Ok(OnchainResultMessage::Failure(OnchainFailureMessage {
                future_id,
                execution_id,
                error: message,
                return_data,
            }))
        }
        err @ DispatchError::Rpc(_) => Err(err.into()),
    }
}

fn receipt_result(
    interaction: &OnchainInteractionMessage,
    receipt: &TransactionReceipt,
) -> OnchainResultMessage {
    let future_id = interaction.future_id().clone();
    let execution_id = interaction.execution_id();
    let tx_id = receipt.tx_hash;

    if !receipt.status {
        return OnchainResultMessage::Failure(OnchainFailureMessage {
            future_id,
            execution_id,
            error: format!("Transaction {tx_id} reverted"),
            return_data: None,
        });
    }

    match interaction {
        OnchainInteractionMessage::DeployContract(_) => match receipt.contract_address {
            Some(contract_address) => {
                OnchainResultMessage::DeployContractSuccess(DeployContractSuccessMessage {
                    future_id,
                    execution_id,
                    contract_address,
                    tx_id,
                })
            }
            None => OnchainResultMessage::Failure(OnchainFailureMessage {
                future_id,
                execution_id,
                error: format!("Deployment transaction {tx_id} created no contract"),
                return_data: None,
            }),
        },
        OnchainInteractionMessage::SendData(_) => {
            OnchainResultMessage::SendDataSuccess(SendDataSuccessMessage {
                future_id,
                execution_id,
                tx_id,
            })
        }
        _ => OnchainResultMessage::CallFunctionSuccess(CallFunctionSuccessMessage {
            future_id,
            execution_id,
            tx_id,
        }),
    }
}
