use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_REQUIRED_CONFIRMATIONS, DEFAULT_TRANSACTION_TIMEOUT_MS,
};

/// Runtime settings of the [`ExecutionEngine`](crate::ExecutionEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionConfig {
    /// Time after which a transaction that has not been mined is considered timed out.
    pub transaction_timeout_ms: u64,
    /// Period between two receipt lookups of a pending transaction.
    pub poll_interval_ms: u64,
    /// Number of blocks, including the block of the receipt, before a transaction is considered
    /// mined.
    pub required_confirmations: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            transaction_timeout_ms: DEFAULT_TRANSACTION_TIMEOUT_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            required_confirmations: DEFAULT_REQUIRED_CONFIRMATIONS,
        }
    }
}

impl ExecutionConfig {
    /// Sets the transaction timeout.
    pub fn with_transaction_timeout_ms(mut self, transaction_timeout_ms: u64) -> Self {
        self.transaction_timeout_ms = transaction_timeout_ms;
        self
    }

    /// Sets the receipt polling period.
    pub fn with_poll_interval_ms(mut self, poll_interval_ms: u64) -> Self {
        self.poll_interval_ms = poll_interval_ms;
        self
    }

    /// Sets the number of confirmations.
    pub fn with_required_confirmations(mut self, required_confirmations: u64) -> Self {
        self.required_confirmations = required_confirmations;
        self
    }

    /// The receipt polling period.
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ExecutionConfig =
            serde_json::from_str(r#"{ "requiredConfirmations": 5 }"#).unwrap();
        assert_eq!(config, ExecutionConfig::default().with_required_confirmations(5));
        assert_eq!(config.transaction_timeout_ms, DEFAULT_TRANSACTION_TIMEOUT_MS);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }
}
