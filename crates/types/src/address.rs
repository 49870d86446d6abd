use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Errors that can occur when parsing a destination-chain address.
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("address must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("address payload is not valid hexadecimal")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("address is not valid base58: {0}")]
    InvalidBase58(String),
    #[error("unexpected address version byte {0:#04x}")]
    InvalidVersion(u8),
    #[error("address checksum mismatch")]
    InvalidChecksum,
}

/// Number of raw bytes contained in an address.
pub const ADDRESS_BYTES: usize = 20;
/// Version byte prefixed to the base58check form.
pub const ADDRESS_VERSION: u8 = 0x17;

/// 20-byte destination-chain account or contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(pub [u8; ADDRESS_BYTES]);

impl Address {
    /// Native contracts live at addresses whose raw form is a single
    /// leading byte followed by zeroes.
    pub const fn native(id: u8) -> Self {
        let mut raw = [0u8; ADDRESS_BYTES];
        raw[0] = id;
        Address(raw)
    }

    /// Derive the account address controlled by an ed25519 public key.
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        let digest = Sha256::digest(Sha256::digest(public_key));
        let mut raw = [0u8; ADDRESS_BYTES];
        raw.copy_from_slice(&digest[..ADDRESS_BYTES]);
        Address(raw)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, AddressError> {
        let raw: [u8; ADDRESS_BYTES] =
            bytes.try_into().map_err(|_| AddressError::InvalidLength {
                expected: ADDRESS_BYTES,
                actual: bytes.len(),
            })?;
        Ok(Address(raw))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }

    /// Hex form used by the node RPC: the raw bytes in reverse order.
    pub fn to_hex_string(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }

    /// Parse the reversed hex form produced by [`Address::to_hex_string`].
    pub fn from_hex_string(value: &str) -> Result<Self, AddressError> {
        let mut raw = hex::decode(value.trim_start_matches("0x"))?;
        raw.reverse();
        Self::from_slice(&raw)
    }

    /// Human readable base58check encoding.
    pub fn to_base58(&self) -> String {
        let mut data = Vec::with_capacity(1 + ADDRESS_BYTES + 4);
        data.push(ADDRESS_VERSION);
        data.extend_from_slice(&self.0);
        let checksum = Sha256::digest(Sha256::digest(&data));
        data.extend_from_slice(&checksum[..4]);
        bs58::encode(data).into_string()
    }

    pub fn from_base58(value: &str) -> Result<Self, AddressError> {
        let data = bs58::decode(value)
            .into_vec()
            .map_err(|err| AddressError::InvalidBase58(err.to_string()))?;
        if data.len() != 1 + ADDRESS_BYTES + 4 {
            return Err(AddressError::InvalidLength {
                expected: 1 + ADDRESS_BYTES + 4,
                actual: data.len(),
            });
        }
        if data[0] != ADDRESS_VERSION {
            return Err(AddressError::InvalidVersion(data[0]));
        }
        let (body, checksum) = data.split_at(1 + ADDRESS_BYTES);
        if Sha256::digest(Sha256::digest(body))[..4] != *checksum {
            return Err(AddressError::InvalidChecksum);
        }
        Self::from_slice(&body[1..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Address::from_base58(&value).map_err(serde::de::Error::custom)
    }
}
