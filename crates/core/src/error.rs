use relay_dest::DestError;
use relay_source::SourceError;
use relay_types::{ChainId, EpochId, TxHash};

/// Fatal failures of a relayer operation.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("source chain read failed: {0}")]
    Source(#[source] SourceError),

    #[error("failed to fetch {what}: {source}")]
    SourceRead {
        what: String,
        #[source]
        source: SourceError,
    },

    #[error("epoch {0} is not a block height")]
    InvalidEpoch(EpochId),

    #[error("cancelled while waiting for height {target}")]
    Cancelled { target: u64 },

    #[error("deadline exceeded waiting for height {target} (last seen {last_seen:?})")]
    DeadlineExceeded { target: u64, last_seen: Option<u64> },

    #[error("failed to encode genesis snapshot: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("destination storage read of {key} failed: {source}")]
    DestinationRead {
        key: String,
        #[source]
        source: DestError,
    },

    #[error("no value stored under {0}")]
    NotFound(String),

    #[error("malformed state under {key}: {reason}")]
    MalformedState { key: String, reason: String },

    #[error("chain {requested} is not served by this relayer (source chain is {configured})")]
    UnsupportedChain {
        requested: ChainId,
        configured: ChainId,
    },

    #[error(transparent)]
    Submission(#[from] SubmitError),
}

/// Reasons a bootstrap submission did not complete.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("genesis submission rejected: {0}")]
    Rejected(#[source] DestError),

    #[error("transaction {tx_hash} still unconfirmed after {attempts} waits")]
    Unconfirmed { tx_hash: TxHash, attempts: u32 },

    #[error("confirmation of {tx_hash} failed: {source}")]
    Confirmation {
        tx_hash: TxHash,
        #[source]
        source: DestError,
    },
}

pub type Result<T> = std::result::Result<T, RelayError>;
