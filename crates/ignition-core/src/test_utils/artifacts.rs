use std::collections::HashMap;

use alloy_json_abi::JsonAbi;
use alloy_primitives::Bytes;
use async_trait::async_trait;
use parking_lot::RwLock;

use crate::{Artifact, ArtifactLoader, IgnitionError, Result};

/// An artifact loader serving a fixed set of artifacts.
#[derive(Debug, Default)]
pub struct StaticArtifactLoader {
    artifacts: RwLock<HashMap<String, Artifact>>,
}

impl StaticArtifactLoader {
    /// Creates an empty loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the artifact owned by `artifact_future_id`.
    pub fn set_artifact(&self, artifact_future_id: &str, artifact: Artifact) {
        self.artifacts.write().insert(artifact_future_id.to_string(), artifact);
    }

    /// Adds the artifact owned by `artifact_future_id`.
    pub fn artifact(self, artifact_future_id: &str, artifact: Artifact) -> Self {
        self.set_artifact(artifact_future_id, artifact);
        self
    }
}

#[async_trait]
impl ArtifactLoader for StaticArtifactLoader {
    async fn load_artifact(&self, artifact_future_id: &str) -> Result<Artifact> {
        self.artifacts
            .read()
            .get(artifact_future_id)
            .cloned()
            .ok_or_else(|| IgnitionError::ArtifactNotFound(artifact_future_id.to_string()))
    }
}

/// Builds an artifact from human-readable ABI items, e.g. `"function owner() returns (address)"`.
///
/// # Panics
///
/// Panics if an item cannot be parsed.
pub fn artifact(contract_name: &str, abi: &[&str], bytecode: &[u8]) -> Artifact {
    Artifact {
        contract_name: contract_name.to_string(),
        abi: JsonAbi::parse(abi.iter().copied()).expect("invalid human-readable ABI"),
        bytecode: Bytes::copy_from_slice(bytecode),
    }
}
