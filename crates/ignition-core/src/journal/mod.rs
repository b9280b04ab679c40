//! The append-only journal every execution step is recorded in.

use std::fmt::Debug;

use auto_impl::auto_impl;

use crate::{execution_state_reducer, ExecutionStateMap, JournalMessage, Result};

mod file;
pub use file::*;

mod memory;
pub use memory::*;

/// An iterator over the persisted messages of a journal.
pub type JournalIter<'a> = Box<dyn Iterator<Item = Result<JournalMessage>> + 'a>;

/// Durable, ordered storage of journal messages.
#[auto_impl(&, Box, Arc)]
pub trait Journal: Debug + Send + Sync {
    /// Appends a message. The message is durable when this returns.
    fn record(&self, message: &JournalMessage) -> Result<()>;

    /// Reads every persisted message, in order, from the start of the journal.
    fn read(&self) -> Result<JournalIter<'_>>;
}

/// Rebuilds the execution state map by folding every message of the journal, in order, from an
/// empty map.
pub fn load_execution_state(journal: &dyn Journal) -> Result<ExecutionStateMap> {
    journal.read()?.try_fold(ExecutionStateMap::new(), |state, message| {
        execution_state_reducer(&state, &message?)
    })
}
