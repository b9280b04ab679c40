//! Execution strategies: resumable coroutines that drive a future through its onchain
//! interactions.
//!
//! A strategy instance is stepped with `None` first, then with the result of every interaction
//! it asked for, until it is done. It performs no chain I/O itself: the driver performs each
//! interaction and records its result before resuming the instance.

use std::{collections::BTreeMap, fmt::Debug, sync::Arc};

use alloy_primitives::Address;
use async_trait::async_trait;

use crate::{
    ExecutionResultMessage, ExecutionState, IgnitionError, OnchainInteractionMessage,
    OnchainResultMessage, Result,
};

mod basic;
pub use basic::*;

mod cycler;
pub use cycler::*;

mod decode;
pub use decode::*;

/// The input of a strategy.
#[derive(Clone, Debug)]
pub struct ExecutionStrategyContext {
    /// The state of the future at the time the strategy is instantiated.
    pub execution_state: Arc<ExecutionState>,
    /// The recorded sender of the future, or the default sender for futures that send nothing.
    pub sender: Address,
}

/// What a strategy asks for after a step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StrategyOutput {
    /// Perform this interaction and resume the strategy with its result.
    Interaction(OnchainInteractionMessage),
    /// The future is finished.
    Done(ExecutionResultMessage),
}

/// A running strategy.
#[async_trait]
pub trait StrategyInstance: Debug + Send {
    /// Resumes the strategy.
    ///
    /// `result` is `None` on the first step and the result of the last requested interaction on
    /// every following step. Stepping a finished instance is an invariant violation.
    async fn step(&mut self, result: Option<OnchainResultMessage>) -> Result<StrategyOutput>;
}

/// A way of executing futures.
pub trait ExecutionStrategy: Debug + Send + Sync {
    /// The name recorded in the execution state of the futures it executes.
    fn name(&self) -> &str;

    /// Instantiates the strategy for one future.
    fn execute_strategy(&self, context: ExecutionStrategyContext) -> Box<dyn StrategyInstance>;
}

/// The available strategies, by name.
#[derive(Clone, Debug, Default)]
pub struct StrategyRegistry {
    strategies: BTreeMap<String, Arc<dyn ExecutionStrategy>>,
}

impl StrategyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a strategy, replacing any strategy with the same name.
    pub fn register(&mut self, strategy: Arc<dyn ExecutionStrategy>) -> &mut Self {
        self.strategies.insert(strategy.name().to_string(), strategy);
        self
    }

    /// Adds a strategy, builder style.
    pub fn with_strategy(mut self, strategy: Arc<dyn ExecutionStrategy>) -> Self {
        self.register(strategy);
        self
    }

    /// The strategy registered under `name`.
    pub fn get(&self, name: &str) -> Result<&Arc<dyn ExecutionStrategy>> {
        self.strategies.get(name).ok_or_else(|| IgnitionError::UnknownStrategy(name.to_string()))
    }

    /// The names of the registered strategies.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }
}
