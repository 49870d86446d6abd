use std::path::PathBuf;
use thiserror::Error;

/// Failures opening or writing a single key file.
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("wrong password")]
    WrongPassword,

    #[error("sealed key is not a valid ed25519 seed: {0}")]
    InvalidKey(String),

    #[error("failed to seal key: {0}")]
    Seal(String),

    #[error("failed to open sealed key: {0}")]
    Open(String),

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("key file storage: {0}")]
    Storage(String),

    #[error("malformed key file: {0}")]
    Format(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WalletError>;

/// Failure to turn the configured wallets into a complete signer set.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no wallet files configured")]
    NoSigners,

    #[error("{wallets} wallet files but {passwords} passwords supplied")]
    LengthMismatch { wallets: usize, passwords: usize },

    #[error("failed to decode wallet no.{index} ({}): {source}", path.display())]
    Decryption {
        index: usize,
        path: PathBuf,
        #[source]
        source: WalletError,
    },
}
