//! Destination-chain transaction envelope for native contract invocations.
//!
//! A transaction is an unsigned body followed by a single multi-signature
//! program. The hash signed by every participant is the double SHA-256 of
//! the encoded body.

use sha2::{Digest, Sha256};

use crate::address::Address;
use crate::chain::{ChainId, TxHash};
use crate::codec::Sink;

pub const TX_VERSION: u8 = 0;
pub const TX_TYPE_INVOKE: u8 = 0xd1;

/// Method of the header-sync contract that stores a genesis header.
pub const SYNC_GENESIS_HEADER_METHOD: &str = "syncGenesisHeader";

/// A call to a native contract, before nonce assignment and signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeInvocation {
    pub contract: Address,
    pub method: String,
    pub args: Vec<u8>,
}

impl NativeInvocation {
    /// `syncGenesisHeader(chain_id, genesis_header)` on `contract`.
    pub fn sync_genesis_header(contract: Address, chain_id: ChainId, header: &[u8]) -> Self {
        let mut sink = Sink::new();
        sink.write_var_uint(chain_id.0).write_var_bytes(header);
        Self {
            contract,
            method: SYNC_GENESIS_HEADER_METHOD.to_string(),
            args: sink.into_bytes(),
        }
    }
}

/// Unsigned transaction body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeTx {
    pub nonce: u32,
    pub invocation: NativeInvocation,
}

impl InvokeTx {
    pub fn encode_body(&self) -> Vec<u8> {
        let mut payload = Sink::new();
        payload
            .write_var_bytes(self.invocation.contract.as_bytes())
            .write_string(&self.invocation.method)
            .write_var_bytes(&self.invocation.args);

        let mut sink = Sink::new();
        sink.write_u8(TX_VERSION)
            .write_u8(TX_TYPE_INVOKE)
            .write_u32(self.nonce)
            .write_var_bytes(&payload.into_bytes());
        sink.into_bytes()
    }

    pub fn hash(&self) -> TxHash {
        let digest = Sha256::digest(Sha256::digest(self.encode_body()));
        let mut raw = [0u8; 32];
        raw.copy_from_slice(&digest);
        TxHash(raw)
    }
}

/// Minimum number of signatures required out of `signers`.
pub fn multisig_threshold(signers: usize) -> usize {
    (5 * signers + 6) / 7
}

/// Public key and signature contributed by one signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureEntry {
    pub public_key: [u8; 32],
    pub signature: [u8; 64],
}

/// Body plus the multi-signature program authorising it.
#[derive(Debug, Clone)]
pub struct SignedTx {
    pub tx: InvokeTx,
    pub threshold: u16,
    pub signatures: Vec<SignatureEntry>,
}

impl SignedTx {
    /// Signatures are written ordered by public key so the encoding does not
    /// depend on the order signers were supplied in.
    pub fn encode(&self) -> Vec<u8> {
        let mut entries = self.signatures.clone();
        entries.sort_by(|a, b| a.public_key.cmp(&b.public_key));

        let mut sink = Sink::new();
        sink.write_bytes(&self.tx.encode_body())
            .write_u16(self.threshold)
            .write_var_uint(entries.len() as u64);
        for entry in &entries {
            sink.write_bytes(&entry.public_key);
        }
        sink.write_var_uint(entries.len() as u64);
        for entry in &entries {
            sink.write_bytes(&entry.signature);
        }
        sink.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_matches_two_thirds_rule() {
        assert_eq!(multisig_threshold(1), 1);
        assert_eq!(multisig_threshold(4), 3);
        assert_eq!(multisig_threshold(7), 5);
    }

    #[test]
    fn hash_depends_on_nonce() {
        let invocation =
            NativeInvocation::sync_genesis_header(Address::native(1), ChainId(333), b"{}");
        let a = InvokeTx {
            nonce: 1,
            invocation: invocation.clone(),
        };
        let b = InvokeTx {
            nonce: 2,
            invocation,
        };
        assert_ne!(a.hash(), b.hash());
        assert_eq!(a.hash(), a.clone().hash());
    }

    #[test]
    fn signature_order_does_not_change_encoding() {
        let tx = InvokeTx {
            nonce: 7,
            invocation: NativeInvocation::sync_genesis_header(
                Address::native(1),
                ChainId(333),
                b"{}",
            ),
        };
        let first = SignatureEntry {
            public_key: [1u8; 32],
            signature: [1u8; 64],
        };
        let second = SignatureEntry {
            public_key: [2u8; 32],
            signature: [2u8; 64],
        };
        let a = SignedTx {
            tx: tx.clone(),
            threshold: 2,
            signatures: vec![first.clone(), second.clone()],
        };
        let b = SignedTx {
            tx,
            threshold: 2,
            signatures: vec![second, first],
        };
        assert_eq!(a.encode(), b.encode());
    }
}
