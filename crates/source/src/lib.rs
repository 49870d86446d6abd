//! Source chain state reader.
//!
//! The relayer only needs three things from the source chain: the current
//! finality committee with its epoch markers, verbose blocks by epoch, and
//! the head height. [`SourceChainReader`] captures that capability; the
//! [`rpc`] module implements it over JSON-RPC.

use async_trait::async_trait;
use relay_types::{BlockKind, BlockRecord, EpochId};

pub mod rpc;

pub use rpc::JsonRpcSourceReader;

/// Errors returned by a source chain reader.
///
/// `Transient` failures are worth polling again; `NotFound` means the
/// requested item does not exist (yet) on the chain.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transient source chain failure: {0}")]
    Transient(String),
    #[error("malformed source chain response: {0}")]
    Malformed(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// Finality committee together with the epochs it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitteeState {
    /// Member public keys in the chain's canonical order.
    pub committee: Vec<String>,
    /// Epoch at which the committee's authority starts.
    pub boundary: EpochId,
    /// Epoch of the first block to be trusted going forward.
    pub content: EpochId,
    /// Number of guard nodes in the committee, when reported.
    pub guard_count: Option<u32>,
}

#[async_trait]
pub trait SourceChainReader: Send + Sync {
    async fn current_finality_committee(&self) -> Result<CommitteeState>;

    /// Verbose block of `kind` at `id`.
    async fn block_at(&self, kind: BlockKind, id: &EpochId) -> Result<BlockRecord>;

    async fn head_height(&self) -> Result<u64>;

    async fn network_id(&self) -> Result<String>;
}
