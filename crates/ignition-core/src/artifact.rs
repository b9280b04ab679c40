use std::fmt::Debug;

use alloy_json_abi::JsonAbi;
use alloy_primitives::Bytes;
use async_trait::async_trait;
use auto_impl::auto_impl;
use serde::{Deserialize, Serialize};

use crate::Result;

/// A compiled contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// The contract name.
    pub contract_name: String,
    /// The contract ABI.
    pub abi: JsonAbi,
    /// The creation bytecode, possibly with unlinked library placeholders.
    pub bytecode: Bytes,
}

/// Loads the artifact of the contract a future is built from.
#[async_trait]
#[auto_impl(&, Box, Arc)]
pub trait ArtifactLoader: Debug + Send + Sync {
    /// Loads the artifact owned by `artifact_future_id`.
    ///
    /// Fails with [`IgnitionError::ArtifactNotFound`](crate::IgnitionError::ArtifactNotFound)
    /// when no artifact is known for it.
    async fn load_artifact(&self, artifact_future_id: &str) -> Result<Artifact>;
}
