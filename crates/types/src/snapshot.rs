use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::block::{BlockRecord, SourceBlock};

/// One finality committee member, identified by its public key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeMember {
    #[serde(rename = "PubKey")]
    pub pub_key: String,
}

impl CommitteeMember {
    pub fn new(pub_key: impl Into<String>) -> Self {
        Self {
            pub_key: pub_key.into(),
        }
    }
}

/// Committee membership as of an epoch boundary.
///
/// Order is the source chain's canonical order; the destination chain
/// re-derives quorum checks from it, so it is never sorted or deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinalityCommittee(Vec<CommitteeMember>);

impl FinalityCommittee {
    pub fn from_public_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(keys.into_iter().map(CommitteeMember::new).collect())
    }

    pub fn members(&self) -> &[CommitteeMember] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Trust anchor submitted to the header-sync contract.
///
/// Fields are private: a snapshot is built once and only ever read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisSnapshot {
    content: BlockRecord,
    boundary: BlockRecord,
    committee: FinalityCommittee,
}

/// Wire layout expected by the header-sync contract.
#[derive(Serialize)]
struct WireSnapshot<'a> {
    #[serde(rename = "TxBlock")]
    content: &'a SourceBlock,
    #[serde(rename = "DsBlock")]
    boundary: &'a SourceBlock,
    #[serde(rename = "DsComm")]
    committee: &'a FinalityCommittee,
}

impl GenesisSnapshot {
    pub fn new(content: BlockRecord, boundary: BlockRecord, committee: FinalityCommittee) -> Self {
        Self {
            content,
            boundary,
            committee,
        }
    }

    pub fn content(&self) -> &BlockRecord {
        &self.content
    }

    pub fn boundary(&self) -> &BlockRecord {
        &self.boundary
    }

    pub fn committee(&self) -> &FinalityCommittee {
        &self.committee
    }

    /// Canonical encoding: content, boundary, then committee.
    pub fn encode(&self) -> Result<GenesisPayload, serde_json::Error> {
        let wire = WireSnapshot {
            content: &self.content.block,
            boundary: &self.boundary.block,
            committee: &self.committee,
        };
        Ok(GenesisPayload {
            bytes: serde_json::to_vec(&wire)?,
        })
    }

    pub fn canonical_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        self.encode().map(GenesisPayload::into_bytes)
    }
}

/// Encoded snapshot bytes. Retries resend exactly these bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisPayload {
    bytes: Vec<u8>,
}

impl GenesisPayload {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// SHA-256 of the payload, hex encoded. Used for log correlation.
    pub fn digest_hex(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::EpochId;
    use crate::header::{CoSignatures, DsBlock, DsBlockHeader, TxBlock, TxBlockHeader};

    fn snapshot(content_num: u64, boundary_num: u64) -> GenesisSnapshot {
        let content = TxBlock::new(
            TxBlockHeader {
                block_num: content_num,
                ds_block_num: boundary_num,
                ..TxBlockHeader::default()
            },
            0,
            CoSignatures::default(),
            Vec::new(),
        );
        let boundary = DsBlock::new(
            DsBlockHeader {
                block_num: boundary_num,
                ..DsBlockHeader::default()
            },
            0,
            CoSignatures::default(),
            [0; 32],
        );
        GenesisSnapshot::new(
            BlockRecord::content(EpochId::from(content_num), content),
            BlockRecord::boundary(EpochId::from(boundary_num), boundary),
            FinalityCommittee::from_public_keys(["A", "B", "C"]),
        )
    }

    #[test]
    fn payload_orders_content_boundary_committee() {
        let payload = snapshot(101, 100).encode().unwrap();
        let text = std::str::from_utf8(payload.as_bytes()).unwrap();
        assert!(text.starts_with(r#"{"TxBlock":{"BlockHeader":{"Version":0,"#));
        assert!(text.contains(r#"},"DsBlock":{"BlockHeader":{"Version":0,"#));
        assert!(text.ends_with(r#","DsComm":[{"PubKey":"A"},{"PubKey":"B"},{"PubKey":"C"}]}"#));
    }

    #[test]
    fn payload_carries_decoded_headers_and_hashes() {
        let snapshot = snapshot(101, 100);
        let payload: serde_json::Value =
            serde_json::from_slice(snapshot.encode().unwrap().as_bytes()).unwrap();
        assert_eq!(payload["TxBlock"]["BlockHeader"]["BlockNum"], 101);
        assert_eq!(payload["TxBlock"]["BlockHeader"]["DSBlockNum"], 100);
        assert_eq!(payload["DsBlock"]["BlockHeader"]["BlockNum"], 100);
        let hash: Vec<u8> = serde_json::from_value(payload["TxBlock"]["BlockHash"].clone()).unwrap();
        assert_eq!(hash, snapshot.content().block_hash().to_vec());
    }

    #[test]
    fn same_snapshot_yields_same_bytes() {
        let first = snapshot(101, 100).encode().unwrap();
        let second = snapshot(101, 100).encode().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.digest_hex(), second.digest_hex());
        assert_ne!(first, snapshot(102, 100).encode().unwrap());
    }

    #[test]
    fn canonical_bytes_match_payload() {
        let snapshot = snapshot(101, 100);
        assert_eq!(
            snapshot.canonical_bytes().unwrap(),
            snapshot.encode().unwrap().as_bytes()
        );
    }

    #[test]
    fn committee_order_preserved() {
        let committee = FinalityCommittee::from_public_keys(["C", "A", "B"]);
        let keys: Vec<_> = committee.members().iter().map(|m| m.pub_key.as_str()).collect();
        assert_eq!(keys, ["C", "A", "B"]);
    }
}
