//! Single-shot submission of the genesis snapshot to the header-sync
//! contract.
//!
//! A chain can only be bootstrapped once. The contract rejects a second
//! submission with an error mentioning that the header "had been
//! initialized"; that rejection is reported as
//! [`BootstrapResult::AlreadyInitialized`] so reruns are harmless.

use std::sync::Arc;

use relay_dest::{Confirmation, DestError, DestinationClient, HEADER_SYNC_CONTRACT};
use relay_types::tx::NativeInvocation;
use relay_types::{Address, ChainId, GenesisPayload, TxHash};
use relay_wallet::SigningIdentity;
use tracing::{info, warn};

use crate::error::SubmitError;

/// Text the header-sync contract puts in its rejection of a repeat bootstrap.
pub const ALREADY_INITIALIZED_SIGNAL: &str = "had been initialized";

/// Default number of confirmation waits before giving up.
pub const DEFAULT_CONFIRM_ATTEMPTS: u32 = 30;

/// True when `err` is the contract refusing a second genesis header.
pub fn is_already_initialized(err: &DestError) -> bool {
    err.to_string().contains(ALREADY_INITIALIZED_SIGNAL)
}

#[derive(Debug)]
pub enum BootstrapResult {
    Confirmed(TxHash),
    AlreadyInitialized,
    Failed(SubmitError),
}

impl BootstrapResult {
    /// Confirmed and already-initialized both leave the chain bootstrapped.
    pub fn is_success(&self) -> bool {
        !matches!(self, BootstrapResult::Failed(_))
    }
}

pub struct BootstrapSubmitter {
    client: Arc<dyn DestinationClient>,
    contract: Address,
    confirm_attempts: u32,
}

impl BootstrapSubmitter {
    pub fn new(client: Arc<dyn DestinationClient>) -> Self {
        Self {
            client,
            contract: HEADER_SYNC_CONTRACT,
            confirm_attempts: DEFAULT_CONFIRM_ATTEMPTS,
        }
    }

    pub fn with_contract(mut self, contract: Address) -> Self {
        self.contract = contract;
        self
    }

    pub fn with_confirm_attempts(mut self, attempts: u32) -> Self {
        self.confirm_attempts = attempts.max(1);
        self
    }

    pub async fn submit(
        &self,
        chain_id: ChainId,
        payload: &GenesisPayload,
        signers: &[SigningIdentity],
    ) -> BootstrapResult {
        let invocation =
            NativeInvocation::sync_genesis_header(self.contract, chain_id, payload.as_bytes());
        info!(
            %chain_id,
            payload_len = payload.len(),
            payload_digest = %payload.digest_hex(),
            signers = signers.len(),
            "submitting genesis header"
        );

        let tx_hash = match self.client.submit_transaction(&invocation, signers).await {
            Ok(hash) => hash,
            Err(err) if is_already_initialized(&err) => {
                info!(%chain_id, "genesis header already initialized");
                return BootstrapResult::AlreadyInitialized;
            }
            Err(err) => {
                warn!(%chain_id, error = %err, "genesis header submission rejected");
                return BootstrapResult::Failed(SubmitError::Rejected(err));
            }
        };

        self.await_confirmation(chain_id, tx_hash).await
    }

    async fn await_confirmation(&self, chain_id: ChainId, tx_hash: TxHash) -> BootstrapResult {
        for attempt in 1..=self.confirm_attempts {
            match self.client.wait_for_confirmation(&tx_hash).await {
                Ok(Confirmation::Confirmed { height }) => {
                    info!(%chain_id, %tx_hash, height, "genesis header confirmed");
                    return BootstrapResult::Confirmed(tx_hash);
                }
                Ok(Confirmation::TimedOut) => {
                    warn!(%tx_hash, attempt, "transaction not confirmed yet");
                }
                Err(source) => {
                    return BootstrapResult::Failed(SubmitError::Confirmation { tx_hash, source });
                }
            }
        }
        BootstrapResult::Failed(SubmitError::Unconfirmed {
            tx_hash,
            attempts: self.confirm_attempts,
        })
    }
}
