use std::{collections::BTreeMap, sync::Arc};

use serde::{Deserialize, Serialize};

use crate::{ExecutionState, FutureId};

/// The execution state of every started future, by future id.
///
/// Entries are shared: a reducer returns a new map in which every entry it did not touch is the
/// same allocation as in its input.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionStateMap {
    states: BTreeMap<FutureId, Arc<ExecutionState>>,
}

impl ExecutionStateMap {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// The state of a future.
    pub fn get(&self, future_id: &str) -> Option<&ExecutionState> {
        self.states.get(future_id).map(Arc::as_ref)
    }

    /// The shared state of a future.
    pub fn get_shared(&self, future_id: &str) -> Option<&Arc<ExecutionState>> {
        self.states.get(future_id)
    }

    /// Returns `true` if the future has a state.
    pub fn contains(&self, future_id: &str) -> bool {
        self.states.contains_key(future_id)
    }

    /// The number of futures with a state.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` if no future has a state.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Iterates over the states in future id order.
    pub fn iter(&self) -> impl Iterator<Item = (&FutureId, &Arc<ExecutionState>)> {
        self.states.iter()
    }

    /// Returns a copy of this map with the state of a future replaced.
    pub(crate) fn with(&self, state: ExecutionState) -> Self {
        let mut states = self.states.clone();
        states.insert(state.id().clone(), Arc::new(state));
        Self { states }
    }

    /// Returns a copy of this map without the state of a future.
    pub(crate) fn without(&self, future_id: &str) -> Self {
        let mut states = self.states.clone();
        states.remove(future_id);
        Self { states }
    }
}

impl<'a> IntoIterator for &'a ExecutionStateMap {
    type Item = (&'a FutureId, &'a Arc<ExecutionState>);
    type IntoIter = std::collections::btree_map::Iter<'a, FutureId, Arc<ExecutionState>>;

    fn into_iter(self) -> Self::IntoIter {
        self.states.iter()
    }
}
