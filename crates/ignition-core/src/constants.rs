//! Constants for the deployment execution engine.

/// The name of the strategy that performs one onchain interaction per future.
pub const BASIC_STRATEGY_NAME: &str = "basic";

/// The execution id of the first onchain interaction of a future.
pub const FIRST_EXECUTION_ID: u64 = 1;

/// Default time after which a sent transaction that has not been mined is considered timed out,
/// in milliseconds.
pub const DEFAULT_TRANSACTION_TIMEOUT_MS: u64 = 180_000;

/// Default period between two receipt lookups of a pending transaction, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Default number of confirmations, including the block of the receipt, before a transaction is
/// considered mined.
pub const DEFAULT_REQUIRED_CONFIRMATIONS: u64 = 1;

/// Length of the selector that prefixes custom error revert data.
pub const SELECTOR_LEN: usize = 4;
