//! Run-level journal messages.

use serde::{Deserialize, Serialize};

use crate::FutureId;

/// Marks the start of a new invocation of the engine.
///
/// Futures that timed out in a previous run are retried from this point.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartRunMessage {}

/// Deletes the execution state of a future, so that it is executed again from scratch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WipeMessage {
    /// The future to wipe.
    pub future_id: FutureId,
}

impl WipeMessage {
    /// Creates a new [`WipeMessage`].
    pub fn new(future_id: impl Into<FutureId>) -> Self {
        Self { future_id: future_id.into() }
    }
}
