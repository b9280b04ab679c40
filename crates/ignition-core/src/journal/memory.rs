use parking_lot::RwLock;

use crate::{Journal, JournalIter, JournalMessage, Result};

/// A journal kept in memory, for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    messages: RwLock<Vec<JournalMessage>>,
}

impl MemoryJournal {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a journal holding `messages`.
    pub fn from_messages(messages: Vec<JournalMessage>) -> Self {
        Self { messages: RwLock::new(messages) }
    }

    /// A copy of every recorded message.
    pub fn messages(&self) -> Vec<JournalMessage> {
        self.messages.read().clone()
    }

    /// The number of recorded messages.
    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    /// Returns `true` if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }
}

impl Journal for MemoryJournal {
    fn record(&self, message: &JournalMessage) -> Result<()> {
        self.messages.write().push(message.clone());
        Ok(())
    }

    fn read(&self) -> Result<JournalIter<'_>> {
        Ok(Box::new(self.messages().into_iter().map(Ok)))
    }
}
