//! Test utilities for the deployment execution engine.

mod artifacts;
mod builders;
mod clock;
mod dispatcher;

pub use artifacts::*;
pub use builders::*;
pub use clock::*;
pub use dispatcher::*;
