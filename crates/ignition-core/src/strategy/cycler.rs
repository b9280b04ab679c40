//! Replays the recorded history of a future through a fresh strategy instance.

use crate::{
    ExecutionResultMessage, ExecutionState, IgnitionError, Result, StrategyInstance, StrategyOutput,
    TransactionMessage,
};

/// The last thing that happened to a future, as seen after a replay.
#[derive(Clone, Debug, PartialEq)]
pub enum LastMessage {
    /// A recorded transaction-level message, or an interaction the strategy asked for and that
    /// has not been recorded yet.
    Transaction(TransactionMessage),
    /// The strategy finished but its result has not been recorded yet.
    Result(ExecutionResultMessage),
}

/// A strategy instance brought up to date with the history of its future.
#[derive(Debug)]
pub struct FastForward {
    /// The strategy instance, ready to be resumed with the result of the pending interaction.
    pub strategy: Box<dyn StrategyInstance>,
    /// The last message, or `None` if the future has no history yet.
    pub last_message: Option<LastMessage>,
}

/// Drives `strategy` through the history of `execution_state` without performing any
/// interaction.
///
/// The strategy is stepped once with `None`, then with every recorded onchain result, in order.
/// Every interaction found in the history must be the one the strategy asked for at that point:
/// a strategy that asks for something else on replay cannot be resumed safely.
pub async fn fast_forward(
    execution_state: &ExecutionState,
    mut strategy: Box<dyn StrategyInstance>,
) -> Result<FastForward> {
    let history = &execution_state.base().history;
    if history.is_empty() {
        return Ok(FastForward { strategy, last_message: None });
    }

    let mut pending = Some(strategy.step(None).await?);
    let mut last_message = None;

    for message in history {
        match message {
            TransactionMessage::Interaction(recorded) => {
                match pending.take() {
                    Some(StrategyOutput::Interaction(requested)) if requested == *recorded => {}
                    other => {
                        return Err(IgnitionError::invariant(format!(
                            "Replay of future {} diverged: history has {recorded:?} but the \
                             strategy produced {other:?}",
                            execution_state.id()
                        )))
                    }
                }
                last_message = Some(LastMessage::Transaction(message.clone()));
            }
            TransactionMessage::Result(result) => {
                let output = strategy.step(Some(result.clone())).await?;
                last_message = Some(match &output {
                    StrategyOutput::Interaction(interaction) => {
                        LastMessage::Transaction(interaction.clone().into())
                    }
                    StrategyOutput::Done(result) => LastMessage::Result(result.clone()),
                });
                pending = Some(output);
            }
            TransactionMessage::Request(_) |
            TransactionMessage::Accept(_) |
            TransactionMessage::Reset(_) => {
                last_message = Some(LastMessage::Transaction(message.clone()));
            }
        }
    }

    Ok(FastForward { strategy, last_message })
}
