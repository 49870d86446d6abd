use std::sync::Arc;

use relay_dest::{DestinationClient, NODE_MANAGER_CONTRACT};
use relay_types::codec::CodecError;
use relay_types::{
    decode_peer_pool, peer_pool_key, Address, ConsensusConfig, GovernanceView, PeerPoolItem,
    GOVERNANCE_VIEW_KEY, PEER_POOL_PREFIX, VBFT_CONFIG_KEY,
};
use tracing::debug;

use crate::error::{RelayError, Result};

/// Reads consensus state from the node-manager contract's storage.
pub struct ConsensusInspector {
    client: Arc<dyn DestinationClient>,
    contract: Address,
}

impl ConsensusInspector {
    pub fn new(client: Arc<dyn DestinationClient>) -> Self {
        Self {
            client,
            contract: NODE_MANAGER_CONTRACT,
        }
    }

    pub fn with_contract(mut self, contract: Address) -> Self {
        self.contract = contract;
        self
    }

    pub async fn read_config(&self) -> Result<ConsensusConfig> {
        let raw = self.read(VBFT_CONFIG_KEY).await?;
        ConsensusConfig::decode(&raw).map_err(|err| malformed(VBFT_CONFIG_KEY, err))
    }

    pub async fn read_governance_view(&self) -> Result<GovernanceView> {
        let raw = self.read(GOVERNANCE_VIEW_KEY).await?;
        GovernanceView::decode(&raw).map_err(|err| malformed(GOVERNANCE_VIEW_KEY, err))
    }

    /// Current governance view and its peer pool, ordered by index.
    pub async fn read_peer_pool(&self) -> Result<(GovernanceView, Vec<PeerPoolItem>)> {
        let view = self.read_governance_view().await?;
        let key = peer_pool_key(view.view);
        let raw = self.read(&key).await?;
        let peers = decode_peer_pool(&raw).map_err(|err| malformed(&key, err))?;
        debug!(view = view.view, peers = peers.len(), "read peer pool");
        Ok((view, peers))
    }

    async fn read(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.client
            .get_storage(&self.contract, key)
            .await
            .map_err(|source| RelayError::DestinationRead {
                key: display_key(key),
                source,
            })?
            .ok_or_else(|| RelayError::NotFound(display_key(key)))
    }
}

fn malformed(key: &[u8], err: CodecError) -> RelayError {
    RelayError::MalformedState {
        key: display_key(key),
        reason: err.to_string(),
    }
}

/// Printable storage key; the view suffix of a peer pool key is shown in hex.
fn display_key(key: &[u8]) -> String {
    match key.strip_prefix(PEER_POOL_PREFIX) {
        Some(view) if !view.is_empty() => format!("peerPool:{}", hex::encode(view)),
        _ => String::from_utf8_lossy(key).into_owned(),
    }
}
