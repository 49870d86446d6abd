//! Node-manager contract state: consensus timing configuration, the current
//! governance view and the peer pool registered for that view.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::codec::{CodecError, Sink, Source};

/// Storage key of the consensus timing configuration.
pub const VBFT_CONFIG_KEY: &[u8] = b"vbftConfig";
/// Storage key of the current governance view.
pub const GOVERNANCE_VIEW_KEY: &[u8] = b"governanceView";
/// Prefix of the per-view peer pool key.
pub const PEER_POOL_PREFIX: &[u8] = b"peerPool";

/// Storage key holding the peer pool of `view`.
pub fn peer_pool_key(view: u32) -> Vec<u8> {
    let mut key = PEER_POOL_PREFIX.to_vec();
    key.extend_from_slice(&view.to_le_bytes());
    key
}

/// Consensus timing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    pub block_msg_delay: u32,
    pub hash_msg_delay: u32,
    pub peer_handshake_timeout: u32,
    pub max_block_change_view: u32,
}

impl ConsensusConfig {
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut source = Source::new(bytes);
        let config = Self {
            block_msg_delay: source.next_u32()?,
            hash_msg_delay: source.next_u32()?,
            peer_handshake_timeout: source.next_u32()?,
            max_block_change_view: source.next_u32()?,
        };
        source.finish()?;
        Ok(config)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut sink = Sink::new();
        sink.write_u32(self.block_msg_delay)
            .write_u32(self.hash_msg_delay)
            .write_u32(self.peer_handshake_timeout)
            .write_u32(self.max_block_change_view);
        sink.into_bytes()
    }
}

/// Governance view the peer pool is indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GovernanceView {
    pub view: u32,
    pub height: u32,
    pub tx_hash: [u8; 32],
}

impl GovernanceView {
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let mut source = Source::new(bytes);
        let view = Self {
            view: source.next_u32()?,
            height: source.next_u32()?,
            tx_hash: source.next_array()?,
        };
        source.finish()?;
        Ok(view)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut sink = Sink::new();
        sink.write_u32(self.view)
            .write_u32(self.height)
            .write_bytes(&self.tx_hash);
        sink.into_bytes()
    }
}

/// Registration status of a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerStatus {
    RegisterCandidate = 0,
    Candidate = 1,
    Consensus = 2,
    QuitConsensus = 3,
    Quitting = 4,
    Blacklisted = 5,
}

impl TryFrom<u8> for PeerStatus {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => PeerStatus::RegisterCandidate,
            1 => PeerStatus::Candidate,
            2 => PeerStatus::Consensus,
            3 => PeerStatus::QuitConsensus,
            4 => PeerStatus::Quitting,
            5 => PeerStatus::Blacklisted,
            other => {
                return Err(CodecError::InvalidValue {
                    field: "peer status",
                    value: other.into(),
                })
            }
        })
    }
}

/// One entry of the peer pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerPoolItem {
    pub index: u32,
    pub peer_pubkey: String,
    pub address: Address,
    pub status: PeerStatus,
}

impl PeerPoolItem {
    fn decode_from(source: &mut Source<'_>) -> Result<Self, CodecError> {
        let index = source.next_u32()?;
        let peer_pubkey = source.next_string()?;
        let raw_address = source.next_var_bytes()?;
        let address = Address::from_slice(raw_address).map_err(|_| CodecError::InvalidValue {
            field: "peer address length",
            value: raw_address.len() as u64,
        })?;
        let status = PeerStatus::try_from(source.next_u8()?)?;
        Ok(Self {
            index,
            peer_pubkey,
            address,
            status,
        })
    }

    fn encode_into(&self, sink: &mut Sink) {
        sink.write_u32(self.index)
            .write_string(&self.peer_pubkey)
            .write_var_bytes(self.address.as_bytes())
            .write_u8(self.status as u8);
    }
}

/// Decode a peer pool, returning the items ordered by index.
pub fn decode_peer_pool(bytes: &[u8]) -> Result<Vec<PeerPoolItem>, CodecError> {
    let mut source = Source::new(bytes);
    let count = source.next_var_uint()?;
    let mut items = Vec::new();
    for _ in 0..count {
        items.push(PeerPoolItem::decode_from(&mut source)?);
    }
    source.finish()?;
    items.sort_by_key(|item| item.index);
    Ok(items)
}

pub fn encode_peer_pool(items: &[PeerPoolItem]) -> Vec<u8> {
    let mut sink = Sink::new();
    sink.write_var_uint(items.len() as u64);
    for item in items {
        item.encode_into(&mut sink);
    }
    sink.into_bytes()
}
