//! Destination chain client capability.
//!
//! Storage reads, multi-signed native contract invocations and transaction
//! confirmation. [`JsonRpcDestinationClient`] talks to a node over JSON-RPC;
//! tests substitute in-memory implementations of [`DestinationClient`].

use async_trait::async_trait;
use relay_types::tx::NativeInvocation;
use relay_types::{Address, TxHash};
use relay_wallet::SigningIdentity;

pub mod rpc;

pub use rpc::{ConfirmationPolicy, JsonRpcDestinationClient};

/// Native header-sync contract.
pub const HEADER_SYNC_CONTRACT: Address = Address::native(0x01);
/// Native node-manager (governance) contract.
pub const NODE_MANAGER_CONTRACT: Address = Address::native(0x04);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DestError {
    #[error("destination chain unreachable: {0}")]
    Transport(String),
    #[error("destination chain rejected request (code {code}): {message}")]
    Rejected { code: i64, message: String },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("malformed destination chain response: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, DestError>;

/// Outcome of waiting for a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed { height: u32 },
    TimedOut,
}

#[async_trait]
pub trait DestinationClient: Send + Sync {
    /// Raw value stored under `key` in `contract`, `None` if unset.
    async fn get_storage(&self, contract: &Address, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Sign `invocation` with every signer and broadcast it.
    async fn submit_transaction(
        &self,
        invocation: &NativeInvocation,
        signers: &[SigningIdentity],
    ) -> Result<TxHash>;

    async fn wait_for_confirmation(&self, tx_hash: &TxHash) -> Result<Confirmation>;
}
