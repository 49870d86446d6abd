use ed25519_dalek::{Signer, SigningKey};
use relay_types::Address;

use crate::keyfile::UnlockedKey;

/// Decrypted signer able to authorise destination-chain transactions.
///
/// Lives in memory only; the signing key is wiped when dropped.
pub struct SigningIdentity {
    signing_key: SigningKey,
    address: Address,
}

impl SigningIdentity {
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = Address::from_public_key(&signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            address,
        }
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl From<&UnlockedKey> for SigningIdentity {
    fn from(key: &UnlockedKey) -> Self {
        Self::from_signing_key(SigningKey::from_bytes(&key.private_key))
    }
}

impl std::fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("address", &self.address.to_base58())
            .field("public_key", &hex::encode(self.public_key()))
            .finish_non_exhaustive()
    }
}
