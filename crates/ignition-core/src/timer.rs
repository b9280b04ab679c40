//! Wall-clock bookkeeping of pending transaction lookups.

use std::{
    collections::HashMap,
    fmt::Debug,
    time::{SystemTime, UNIX_EPOCH},
};

use alloy_primitives::TxHash;
use auto_impl::auto_impl;
use serde::{Deserialize, Serialize};

use crate::{ExecutionId, FutureId, IgnitionError, Result};

/// A source of wall-clock time.
#[auto_impl(&, Box, Arc)]
pub trait Clock: Debug + Send + Sync {
    /// Milliseconds since the unix epoch.
    fn now_ms(&self) -> u64;
}

/// The system wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or_default()
    }
}

/// A monotonic clock driven by the tokio timer, so that paused test runtimes control it.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: tokio::time::Instant,
}

impl MonotonicClock {
    /// Creates a clock starting at zero now.
    pub fn new() -> Self {
        Self { origin: tokio::time::Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// A pending lookup of a transaction of a future.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionLookup {
    /// The future that sent the transaction.
    pub future_id: FutureId,
    /// The execution the transaction belongs to.
    pub execution_id: ExecutionId,
    /// The transaction hash.
    pub tx_hash: TxHash,
}

/// Tracks when each pending transaction started being looked up, and reports the ones that
/// have been pending for longer than the timeout.
///
/// The timer lives only for the current run. It is never persisted: a resumed run registers its
/// in-flight transactions again as it rediscovers them in the journal.
#[derive(Debug)]
pub struct TransactionLookupTimer<C = SystemClock> {
    timeout_ms: u64,
    clock: C,
    lookups: HashMap<TxHash, (TransactionLookup, u64)>,
}

impl TransactionLookupTimer<SystemClock> {
    /// Creates a timer on the system clock.
    pub fn new(timeout_ms: u64) -> Self {
        Self::with_clock(timeout_ms, SystemClock)
    }
}

impl<C: Clock> TransactionLookupTimer<C> {
    /// Creates a timer on the given clock.
    pub fn with_clock(timeout_ms: u64, clock: C) -> Self {
        Self { timeout_ms, clock, lookups: HashMap::new() }
    }

    /// Records the current time as the start of the lookup, unless the transaction is already
    /// registered.
    pub fn register_start_time_if_needed(&mut self, lookup: TransactionLookup) {
        let now = self.clock.now_ms();
        self.lookups.entry(lookup.tx_hash).or_insert((lookup, now));
    }

    /// Returns `true` if the transaction has been looked up for longer than the timeout.
    ///
    /// Asking about a transaction that was never registered is an invariant violation.
    pub fn is_timed_out(&self, tx_hash: TxHash) -> Result<bool> {
        let (_, start) = self.lookups.get(&tx_hash).ok_or_else(|| {
            IgnitionError::invariant(format!("Transaction lookup {tx_hash} was never registered"))
        })?;
        Ok(self.clock.now_ms().saturating_sub(*start) > self.timeout_ms)
    }

    /// Every lookup that has timed out.
    pub fn get_timed_out_transactions(&self) -> Vec<TransactionLookup> {
        let now = self.clock.now_ms();
        let mut timed_out: Vec<_> = self
            .lookups
            .values()
            .filter(|(_, start)| now.saturating_sub(*start) > self.timeout_ms)
            .map(|(lookup, _)| lookup.clone())
            .collect();
        timed_out.sort_by(|a, b| {
            (&a.future_id, a.execution_id).cmp(&(&b.future_id, b.execution_id))
        });
        timed_out
    }

    /// Forgets a lookup once it is resolved.
    pub fn remove(&mut self, tx_hash: TxHash) -> Option<TransactionLookup> {
        self.lookups.remove(&tx_hash).map(|(lookup, _)| lookup)
    }

    /// The number of pending lookups.
    pub fn len(&self) -> usize {
        self.lookups.len()
    }

    /// Returns `true` if no lookup is pending.
    pub fn is_empty(&self) -> bool {
        self.lookups.is_empty()
    }
}
