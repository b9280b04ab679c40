use std::path::PathBuf;

use crate::{DispatchError, FutureId};

/// Error types for the deployment execution engine.
#[derive(Debug, thiserror::Error)]
pub enum IgnitionError {
    /// An internal consistency rule was broken.
    ///
    /// This is never a recoverable condition: it points at a bug in the caller or at a corrupted
    /// journal, and continuing could lead to a duplicated transaction.
    #[error("Internal invariant violated: {0}")]
    InvariantViolation(String),

    /// Failed to read from or append to the journal file
    #[error("Journal I/O error on '{path}': {source}")]
    JournalIo {
        /// The journal file path
        path: PathBuf,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// A persisted journal entry could not be parsed
    #[error("Failed to parse journal entry at line {line} of '{path}': {source}")]
    JournalParse {
        /// The journal file path
        path: PathBuf,
        /// The 1-based line number of the malformed entry
        line: usize,
        /// The underlying JSON error
        source: serde_json::Error,
    },

    /// A message could not be serialized for the journal
    #[error("Failed to serialize journal message: {0}")]
    JournalSerialize(#[source] serde_json::Error),

    /// The artifact for a future could not be loaded
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(FutureId),

    /// No strategy is registered under the requested name
    #[error("Unknown execution strategy: {0}")]
    UnknownStrategy(String),

    /// The chain dispatcher failed
    #[error("Chain dispatcher error: {0}")]
    Dispatch(#[from] DispatchError),
}

impl IgnitionError {
    /// Creates an [`IgnitionError::InvariantViolation`] from a message.
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }

    /// Returns `true` if this error reports a broken internal invariant rather than a failure of
    /// the chain or of the environment.
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::InvariantViolation(_))
    }
}

/// Result type for the deployment execution engine.
pub type Result<T> = std::result::Result<T, IgnitionError>;

/// Returns an [`IgnitionError::InvariantViolation`] from the enclosing function unless the
/// condition holds.
macro_rules! ensure_invariant {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::IgnitionError::InvariantViolation(format!($($arg)+)));
        }
    };
}

pub(crate) use ensure_invariant;

#[cfg(test)]
mod tests {
    use super::*;

    fn checked(value: u64) -> Result<u64> {
        ensure_invariant!(value > 1, "value {value} is too small");
        Ok(value)
    }

    #[test]
    fn test_ensure_invariant_returns_violation() {
        let err = checked(1).unwrap_err();
        assert!(err.is_invariant_violation());
        assert_eq!(err.to_string(), "Internal invariant violated: value 1 is too small");
        assert_eq!(checked(2).unwrap(), 2);
    }

    #[test]
    fn test_dispatch_error_is_not_invariant_violation() {
        let err = IgnitionError::from(DispatchError::Rpc("connection refused".to_string()));
        assert!(!err.is_invariant_violation());
    }
}
