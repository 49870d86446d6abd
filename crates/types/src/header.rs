//! Typed source chain blocks.
//!
//! Verbose RPC blocks arrive with every number as a decimal string and every
//! hash as hex. They are decoded here into fixed-width header records, the
//! header hash is recomputed from the header's protobuf encoding, and the
//! transaction block's hash is checked against the one the node reported.
//! The records serialise in the layout the header-sync contract reads.

use std::net::IpAddr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use prost::Message;
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub type Hash32 = [u8; 32];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("field {field}: {reason}")]
    Field { field: &'static str, reason: String },

    #[error("block hash mismatch: node reported {reported}, header hashes to {computed}")]
    HashMismatch { reported: String, computed: String },
}

fn field_error(field: &'static str, reason: impl ToString) -> HeaderError {
    HeaderError::Field {
        field,
        reason: reason.to_string(),
    }
}

fn parse_u64(field: &'static str, value: &str) -> Result<u64, HeaderError> {
    value
        .parse()
        .map_err(|err| field_error(field, format!("{value:?}: {err}")))
}

fn parse_u128(field: &'static str, value: &str) -> Result<u128, HeaderError> {
    value
        .parse()
        .map_err(|err| field_error(field, format!("{value:?}: {err}")))
}

fn parse_hex(field: &'static str, value: &str) -> Result<Vec<u8>, HeaderError> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    hex::decode(digits).map_err(|err| field_error(field, err))
}

fn parse_hash(field: &'static str, value: &str) -> Result<Hash32, HeaderError> {
    let bytes = parse_hex(field, value)?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| field_error(field, format!("expected 32 bytes, got {len}")))
}

fn parse_ip(field: &'static str, value: &str) -> Result<u128, HeaderError> {
    match value.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => Ok(u32::from(ip).into()),
        Ok(IpAddr::V6(ip)) => Ok(ip.into()),
        Err(err) => Err(field_error(field, format!("{value:?}: {err}"))),
    }
}

fn as_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&BASE64.encode(bytes))
}

fn as_base64_list<S: Serializer>(list: &[Vec<u8>], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(list.iter().map(|bytes| BASE64.encode(bytes)))
}

// Verbose RPC records.

#[derive(Debug, Clone, Deserialize)]
pub struct VerboseTxBlock {
    pub header: VerboseTxHeader,
    pub body: VerboseTxBody,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VerboseTxHeader {
    pub block_num: String,
    pub committee_hash: String,
    #[serde(rename = "DSBlockNum")]
    pub ds_block_num: String,
    pub gas_limit: String,
    pub gas_used: String,
    pub mb_info_hash: String,
    pub miner_pub_key: String,
    pub num_txns: u32,
    pub prev_block_hash: String,
    pub rewards: String,
    pub state_delta_hash: String,
    pub state_root_hash: String,
    pub timestamp: String,
    pub version: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerboseTxBody {
    #[serde(rename = "BlockHash")]
    pub block_hash: String,
    #[serde(rename = "HeaderSign", default)]
    pub header_sign: String,
    #[serde(rename = "MicroBlockInfos", default)]
    pub micro_block_infos: Vec<VerboseMicroBlockInfo>,
    #[serde(rename = "CS1", default)]
    pub cs1: String,
    #[serde(rename = "B1", default)]
    pub b1: Vec<bool>,
    #[serde(rename = "B2", default)]
    pub b2: Vec<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VerboseMicroBlockInfo {
    pub micro_block_hash: String,
    pub micro_block_shard_id: u32,
    pub micro_block_txn_root_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerboseDsBlock {
    pub header: VerboseDsHeader,
    #[serde(default)]
    pub signature: String,
    #[serde(rename = "PrevDSHash", default)]
    pub prev_ds_hash: String,
    #[serde(rename = "CS1", default)]
    pub cs1: String,
    #[serde(rename = "B1", default)]
    pub b1: Vec<bool>,
    #[serde(rename = "B2", default)]
    pub b2: Vec<bool>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VerboseDsHeader {
    pub block_num: String,
    pub committee_hash: String,
    pub difficulty: u32,
    #[serde(rename = "DifficultyDS")]
    pub difficulty_ds: u32,
    pub epoch_num: String,
    pub gas_price: String,
    pub leader_pub_key: String,
    #[serde(default)]
    pub members_ejected: Vec<String>,
    #[serde(rename = "PoWWinners", default)]
    pub pow_winners: Vec<String>,
    #[serde(rename = "PoWWinnersIP", default)]
    pub pow_winners_ip: Vec<VerbosePeer>,
    pub prev_hash: String,
    #[serde(default)]
    pub reserved_field: String,
    pub sharding_hash: String,
    pub timestamp: String,
    pub version: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VerbosePeer {
    #[serde(rename = "IP")]
    pub ip: String,
    pub port: u32,
}

// Typed records.

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CoSignatures {
    #[serde(rename = "CS1", serialize_with = "as_base64")]
    pub cs1: Vec<u8>,
    #[serde(rename = "B1")]
    pub b1: Vec<bool>,
    #[serde(rename = "CS2", serialize_with = "as_base64")]
    pub cs2: Vec<u8>,
    #[serde(rename = "B2")]
    pub b2: Vec<bool>,
}

impl CoSignatures {
    fn parse(cs1: &str, b1: &[bool], cs2: &str, b2: &[bool]) -> Result<Self, HeaderError> {
        Ok(Self {
            cs1: parse_hex("CS1", cs1)?,
            b1: b1.to_vec(),
            cs2: parse_hex("CS2", cs2)?,
            b2: b2.to_vec(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TxBlockHashSet {
    pub state_root_hash: Hash32,
    pub state_delta_hash: Hash32,
    pub mb_info_hash: Hash32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TxBlockHeader {
    pub version: u32,
    pub committee_hash: Hash32,
    pub prev_hash: Hash32,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub rewards: u128,
    pub block_num: u64,
    pub hash_set: TxBlockHashSet,
    pub num_txs: u32,
    #[serde(serialize_with = "as_base64")]
    pub miner_pub_key: Vec<u8>,
    #[serde(rename = "DSBlockNum")]
    pub ds_block_num: u64,
}

impl TxBlockHeader {
    pub fn from_verbose(header: &VerboseTxHeader) -> Result<Self, HeaderError> {
        Ok(Self {
            version: header.version,
            committee_hash: parse_hash("CommitteeHash", &header.committee_hash)?,
            prev_hash: parse_hash("PrevBlockHash", &header.prev_block_hash)?,
            gas_limit: parse_u64("GasLimit", &header.gas_limit)?,
            gas_used: parse_u64("GasUsed", &header.gas_used)?,
            rewards: parse_u128("Rewards", &header.rewards)?,
            block_num: parse_u64("BlockNum", &header.block_num)?,
            hash_set: TxBlockHashSet {
                state_root_hash: parse_hash("StateRootHash", &header.state_root_hash)?,
                state_delta_hash: parse_hash("StateDeltaHash", &header.state_delta_hash)?,
                mb_info_hash: parse_hash("MbInfoHash", &header.mb_info_hash)?,
            },
            num_txs: header.num_txns,
            miner_pub_key: parse_hex("MinerPubKey", &header.miner_pub_key)?,
            ds_block_num: parse_u64("DSBlockNum", &header.ds_block_num)?,
        })
    }

    /// SHA-256 of the header's protobuf encoding.
    pub fn hash(&self) -> Hash32 {
        let message = proto::TxBlockHeader {
            blockheaderbase: Some(proto::BlockHeaderBase {
                version: self.version,
                committeehash: self.committee_hash.to_vec(),
                prevhash: self.prev_hash.to_vec(),
            }),
            gaslimit: self.gas_limit,
            gasused: self.gas_used,
            rewards: Some(proto::ByteArray::of(self.rewards.to_be_bytes().to_vec())),
            blocknum: self.block_num,
            hash: Some(proto::TxBlockHashSet {
                stateroothash: self.hash_set.state_root_hash.to_vec(),
                statedeltahash: self.hash_set.state_delta_hash.to_vec(),
                mbinfohash: self.hash_set.mb_info_hash.to_vec(),
            }),
            numtxs: self.num_txs,
            minerpubkey: Some(proto::ByteArray::of(self.miner_pub_key.clone())),
            dsblocknum: self.ds_block_num,
        };
        Sha256::digest(message.encode_to_vec()).into()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MicroBlockInfo {
    pub micro_block_hash: Hash32,
    pub micro_block_txn_root_hash: Hash32,
    pub micro_block_shard_id: u32,
}

/// Transaction block with its header hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TxBlock {
    pub block_header: TxBlockHeader,
    pub block_hash: Hash32,
    pub timestamp: u64,
    pub cosigs: CoSignatures,
    pub mb_infos: Vec<MicroBlockInfo>,
}

impl TxBlock {
    pub fn new(
        block_header: TxBlockHeader,
        timestamp: u64,
        cosigs: CoSignatures,
        mb_infos: Vec<MicroBlockInfo>,
    ) -> Self {
        Self {
            block_hash: block_header.hash(),
            block_header,
            timestamp,
            cosigs,
            mb_infos,
        }
    }

    /// Decode a verbose block and check the node's hash against the header.
    pub fn from_verbose(verbose: &VerboseTxBlock) -> Result<Self, HeaderError> {
        let header = TxBlockHeader::from_verbose(&verbose.header)?;
        let mb_infos = verbose
            .body
            .micro_block_infos
            .iter()
            .map(|info| {
                Ok(MicroBlockInfo {
                    micro_block_hash: parse_hash("MicroBlockHash", &info.micro_block_hash)?,
                    micro_block_txn_root_hash: parse_hash(
                        "MicroBlockTxnRootHash",
                        &info.micro_block_txn_root_hash,
                    )?,
                    micro_block_shard_id: info.micro_block_shard_id,
                })
            })
            .collect::<Result<Vec<_>, HeaderError>>()?;
        let body = &verbose.body;
        let block = Self::new(
            header,
            parse_u64("Timestamp", &verbose.header.timestamp)?,
            CoSignatures::parse(&body.cs1, &body.b1, &body.header_sign, &body.b2)?,
            mb_infos,
        );

        let reported = parse_hash("BlockHash", &body.block_hash)?;
        if reported != block.block_hash {
            return Err(HeaderError::HashMismatch {
                reported: hex::encode(reported),
                computed: hex::encode(block.block_hash),
            });
        }
        Ok(block)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Peer {
    pub ip_address: u128,
    pub listen_port_host: u32,
}

impl Peer {
    fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = self.ip_address.to_be_bytes().to_vec();
        bytes.extend_from_slice(&self.listen_port_host.to_be_bytes());
        bytes
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PowWinner {
    #[serde(serialize_with = "as_base64")]
    pub pub_key: Vec<u8>,
    pub peer: Peer,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DsBlockHashSet {
    pub sharding_hash: Hash32,
    #[serde(serialize_with = "as_base64")]
    pub reserved_field: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DsBlockHeader {
    pub version: u32,
    pub committee_hash: Hash32,
    pub prev_hash: Hash32,
    pub ds_difficulty: u32,
    pub difficulty: u32,
    #[serde(serialize_with = "as_base64")]
    pub leader_pub_key: Vec<u8>,
    pub block_num: u64,
    pub epoch_num: u64,
    pub gas_price: u128,
    #[serde(rename = "PoWDSWinners")]
    pub pow_ds_winners: Vec<PowWinner>,
    #[serde(rename = "RemoveDSNodePubkeys", serialize_with = "as_base64_list")]
    pub removed_ds_pub_keys: Vec<Vec<u8>>,
    pub hash_set: DsBlockHashSet,
}

impl DsBlockHeader {
    pub fn from_verbose(header: &VerboseDsHeader) -> Result<Self, HeaderError> {
        if header.pow_winners.len() != header.pow_winners_ip.len() {
            return Err(field_error(
                "PoWWinnersIP",
                format!(
                    "{} winners but {} addresses",
                    header.pow_winners.len(),
                    header.pow_winners_ip.len()
                ),
            ));
        }
        let pow_ds_winners = header
            .pow_winners
            .iter()
            .zip(&header.pow_winners_ip)
            .map(|(key, peer)| {
                Ok(PowWinner {
                    pub_key: parse_hex("PoWWinners", key)?,
                    peer: Peer {
                        ip_address: parse_ip("PoWWinnersIP", &peer.ip)?,
                        listen_port_host: peer.port,
                    },
                })
            })
            .collect::<Result<Vec<_>, HeaderError>>()?;
        let removed_ds_pub_keys = header
            .members_ejected
            .iter()
            .map(|key| parse_hex("MembersEjected", key))
            .collect::<Result<Vec<_>, HeaderError>>()?;

        Ok(Self {
            version: header.version,
            committee_hash: parse_hash("CommitteeHash", &header.committee_hash)?,
            prev_hash: parse_hash("PrevHash", &header.prev_hash)?,
            ds_difficulty: header.difficulty_ds,
            difficulty: header.difficulty,
            leader_pub_key: parse_hex("LeaderPubKey", &header.leader_pub_key)?,
            block_num: parse_u64("BlockNum", &header.block_num)?,
            epoch_num: parse_u64("EpochNum", &header.epoch_num)?,
            gas_price: parse_u128("GasPrice", &header.gas_price)?,
            pow_ds_winners,
            removed_ds_pub_keys,
            hash_set: DsBlockHashSet {
                sharding_hash: parse_hash("ShardingHash", &header.sharding_hash)?,
                reserved_field: parse_hex("ReservedField", &header.reserved_field)?,
            },
        })
    }

    /// SHA-256 of the header's protobuf encoding.
    pub fn hash(&self) -> Hash32 {
        let message = proto::DsBlockHeader {
            blockheaderbase: Some(proto::BlockHeaderBase {
                version: self.version,
                committeehash: self.committee_hash.to_vec(),
                prevhash: self.prev_hash.to_vec(),
            }),
            dsdifficulty: self.ds_difficulty,
            difficulty: self.difficulty,
            leaderpubkey: Some(proto::ByteArray::of(self.leader_pub_key.clone())),
            blocknum: self.block_num,
            epochnum: self.epoch_num,
            gasprice: Some(proto::ByteArray::of(self.gas_price.to_be_bytes().to_vec())),
            dswinners: self
                .pow_ds_winners
                .iter()
                .map(|winner| proto::PowDsWinner {
                    key: Some(proto::ByteArray::of(winner.pub_key.clone())),
                    val: Some(proto::ByteArray::of(winner.peer.to_bytes())),
                })
                .collect(),
            hash: Some(proto::DsBlockHashSet {
                shardinghash: self.hash_set.sharding_hash.to_vec(),
                reservedfield: self.hash_set.reserved_field.clone(),
            }),
            dsremoved: self
                .removed_ds_pub_keys
                .iter()
                .map(|key| proto::ByteArray::of(key.clone()))
                .collect(),
        };
        Sha256::digest(message.encode_to_vec()).into()
    }
}

/// Directory service block with its header hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DsBlock {
    pub block_header: DsBlockHeader,
    pub block_hash: Hash32,
    pub timestamp: u64,
    pub cosigs: CoSignatures,
    #[serde(rename = "PrevDSHash")]
    pub prev_ds_hash: Hash32,
}

impl DsBlock {
    pub fn new(
        block_header: DsBlockHeader,
        timestamp: u64,
        cosigs: CoSignatures,
        prev_ds_hash: Hash32,
    ) -> Self {
        Self {
            block_hash: block_header.hash(),
            block_header,
            timestamp,
            cosigs,
            prev_ds_hash,
        }
    }

    pub fn from_verbose(verbose: &VerboseDsBlock) -> Result<Self, HeaderError> {
        let prev_ds_hash = if verbose.prev_ds_hash.is_empty() {
            Hash32::default()
        } else {
            parse_hash("PrevDSHash", &verbose.prev_ds_hash)?
        };
        Ok(Self::new(
            DsBlockHeader::from_verbose(&verbose.header)?,
            parse_u64("Timestamp", &verbose.header.timestamp)?,
            CoSignatures::parse(&verbose.cs1, &verbose.b1, &verbose.signature, &verbose.b2)?,
            prev_ds_hash,
        ))
    }
}

/// Protobuf header messages, used only to compute header hashes.
mod proto {
    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ByteArray {
        #[prost(bytes = "vec", tag = "1")]
        pub data: Vec<u8>,
    }

    impl ByteArray {
        pub fn of(data: Vec<u8>) -> Self {
            Self { data }
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct BlockHeaderBase {
        #[prost(uint32, tag = "1")]
        pub version: u32,
        #[prost(bytes = "vec", tag = "2")]
        pub committeehash: Vec<u8>,
        #[prost(bytes = "vec", tag = "3")]
        pub prevhash: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TxBlockHashSet {
        #[prost(bytes = "vec", tag = "1")]
        pub stateroothash: Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub statedeltahash: Vec<u8>,
        #[prost(bytes = "vec", tag = "3")]
        pub mbinfohash: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TxBlockHeader {
        #[prost(message, optional, tag = "1")]
        pub blockheaderbase: Option<BlockHeaderBase>,
        #[prost(uint64, tag = "2")]
        pub gaslimit: u64,
        #[prost(uint64, tag = "3")]
        pub gasused: u64,
        #[prost(message, optional, tag = "4")]
        pub rewards: Option<ByteArray>,
        #[prost(uint64, tag = "5")]
        pub blocknum: u64,
        #[prost(message, optional, tag = "6")]
        pub hash: Option<TxBlockHashSet>,
        #[prost(uint32, tag = "7")]
        pub numtxs: u32,
        #[prost(message, optional, tag = "8")]
        pub minerpubkey: Option<ByteArray>,
        #[prost(uint64, tag = "9")]
        pub dsblocknum: u64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PowDsWinner {
        #[prost(message, optional, tag = "1")]
        pub key: Option<ByteArray>,
        #[prost(message, optional, tag = "2")]
        pub val: Option<ByteArray>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct DsBlockHashSet {
        #[prost(bytes = "vec", tag = "1")]
        pub shardinghash: Vec<u8>,
        #[prost(bytes = "vec", tag = "2")]
        pub reservedfield: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct DsBlockHeader {
        #[prost(message, optional, tag = "1")]
        pub blockheaderbase: Option<BlockHeaderBase>,
        #[prost(uint32, tag = "2")]
        pub dsdifficulty: u32,
        #[prost(uint32, tag = "3")]
        pub difficulty: u32,
        #[prost(message, optional, tag = "4")]
        pub leaderpubkey: Option<ByteArray>,
        #[prost(uint64, tag = "5")]
        pub blocknum: u64,
        #[prost(uint64, tag = "6")]
        pub epochnum: u64,
        #[prost(message, optional, tag = "7")]
        pub gasprice: Option<ByteArray>,
        #[prost(message, repeated, tag = "9")]
        pub dswinners: Vec<PowDsWinner>,
        #[prost(message, optional, tag = "10")]
        pub hash: Option<DsBlockHashSet>,
        #[prost(message, repeated, tag = "11")]
        pub dsremoved: Vec<ByteArray>,
    }
}
