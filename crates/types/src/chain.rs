use serde::{Deserialize, Serialize};
use std::fmt;

/// Chain-native epoch or block identifier.
///
/// Treated as an opaque token; the source chain happens to use decimal
/// strings, so [`EpochId::as_height`] is available where a numeric target
/// is needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EpochId(String);

impl EpochId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_height(&self) -> Option<u64> {
        self.0.trim().parse().ok()
    }
}

impl fmt::Display for EpochId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EpochId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<u64> for EpochId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of a chain registered with the destination chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Destination-chain transaction hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash(pub [u8; 32]);

impl TxHash {
    /// Hex form used by the node RPC: bytes in reverse order.
    pub fn to_hex_string(&self) -> String {
        let mut reversed = self.0;
        reversed.reverse();
        hex::encode(reversed)
    }

    pub fn from_hex_string(value: &str) -> Result<Self, hex::FromHexError> {
        let mut raw = [0u8; 32];
        hex::decode_to_slice(value.trim_start_matches("0x"), &mut raw)?;
        raw.reverse();
        Ok(TxHash(raw))
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_id_parses_decimal_heights() {
        assert_eq!(EpochId::from("101").as_height(), Some(101));
        assert_eq!(EpochId::from(" 7 ").as_height(), Some(7));
        assert_eq!(EpochId::from("0xff").as_height(), None);
    }

    #[test]
    fn tx_hash_hex_roundtrip() {
        let mut raw = [0u8; 32];
        raw[0] = 0x01;
        let hash = TxHash(raw);
        let encoded = hash.to_hex_string();
        assert!(encoded.ends_with("01"));
        assert_eq!(TxHash::from_hex_string(&encoded).unwrap(), hash);
    }
}
