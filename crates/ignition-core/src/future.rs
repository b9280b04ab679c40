use serde::{Deserialize, Serialize};

/// Identifier of a future, unique within a deployment.
pub type FutureId = String;

/// Identifier of one onchain attempt of a future. Ids grow monotonically per future.
pub type ExecutionId = u64;

/// A decoded EVM value, in its JSON form.
///
/// Integers are decimal strings, addresses are checksummed strings, byte strings are `0x`
/// prefixed hex, arrays and tuples are JSON arrays.
pub type EvmValue = serde_json::Value;

/// The kinds of futures a deployment is made of.
#[derive(
    Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "kebab-case")]
pub enum FutureType {
    /// Deploys a contract from an artifact.
    #[display("deployment")]
    Deployment,
    /// Sends a transaction calling a contract function.
    #[display("call")]
    Call,
    /// Performs a read-only call of a contract function.
    #[display("static-call")]
    StaticCall,
    /// Binds an already deployed contract to an artifact.
    #[display("contract-at")]
    ContractAt,
    /// Reads an argument of an event emitted by a previous transaction.
    #[display("read-event-argument")]
    ReadEventArgument,
    /// Sends a raw transaction.
    #[display("send-data")]
    SendData,
}

/// A reference to a future of the deployment graph.
///
/// The graph itself is built outside of this crate; resolution only needs the id and the
/// declared type of the future.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FutureRef {
    /// The future id.
    pub id: FutureId,
    /// The declared type of the future.
    pub future_type: FutureType,
}

impl FutureRef {
    /// Creates a new [`FutureRef`].
    pub fn new(id: impl Into<FutureId>, future_type: FutureType) -> Self {
        Self { id: id.into(), future_type }
    }
}

/// Selects one output of a function, or one argument of an event, by name or by position.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(untagged)]
pub enum NameOrIndex {
    /// Position of the value.
    Index(usize),
    /// Name of the value.
    Name(String),
}

impl Default for NameOrIndex {
    fn default() -> Self {
        Self::Index(0)
    }
}

impl From<usize> for NameOrIndex {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for NameOrIndex {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}
