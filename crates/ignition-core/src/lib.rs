//! Journaled execution engine for multi-step contract deployments.
//!
//! A deployment is a graph of futures (deployments, calls, static calls, event reads, raw
//! sends). Every step of their execution is recorded as a [`JournalMessage`] and folded into an
//! [`ExecutionStateMap`] by [`execution_state_reducer`], so a deployment can be resumed, retried
//! or re-run after a crash, a dropped transaction or a timed-out confirmation.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod constants;

mod artifact;
pub use artifact::*;

mod config;
pub use config::*;

mod dispatcher;
pub use dispatcher::*;

mod engine;
pub use engine::*;

mod error;
pub use error::*;

mod future;
pub use future::*;

mod journal;
pub use journal::*;

mod messages;
pub use messages::*;

mod reducers;
pub use reducers::*;

mod resolution;
pub use resolution::*;

mod state;
pub use state::*;

mod strategy;
pub use strategy::*;

mod timer;
pub use timer::*;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
