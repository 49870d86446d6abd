//! Password sealed signer keys.
//!
//! A key file is JSON holding the signer's address and public key in the
//! clear and the ed25519 seed sealed with AES-256-GCM under an argon2id
//! derived key. The argon2 cost parameters are stored alongside the salt so
//! a file stays readable if the defaults change.

use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{serde::ts_seconds, DateTime, Utc};
use ed25519_dalek::SigningKey;
use rand_core::{OsRng, RngCore};
use relay_types::Address;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{Result, WalletError};

const KEYFILE_VERSION: u8 = 1;
const CIPHER: &str = "aes-256-gcm";
const KDF: &str = "argon2id";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyFile {
    pub version: u8,
    pub address: Address,
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(with = "ts_seconds")]
    pub created_at: DateTime<Utc>,
    pub crypto: SealedKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedKey {
    pub cipher: String,
    pub nonce: String,
    pub ciphertext: String,
    pub kdf: KdfParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub algorithm: String,
    pub salt: String,
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl KdfParams {
    fn fresh() -> Self {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        Self {
            algorithm: KDF.to_string(),
            salt: BASE64.encode(salt),
            m_cost: Params::DEFAULT_M_COST,
            t_cost: Params::DEFAULT_T_COST,
            p_cost: Params::DEFAULT_P_COST,
        }
    }

    fn derive(&self, password: &str) -> Result<Zeroizing<[u8; 32]>> {
        if self.algorithm != KDF {
            return Err(WalletError::Kdf(format!(
                "unsupported kdf '{}'",
                self.algorithm
            )));
        }
        let salt = decode_field("salt", &self.salt)?;
        let params = Params::new(self.m_cost, self.t_cost, self.p_cost, Some(32))
            .map_err(|err| WalletError::Kdf(format!("argon2 parameters: {err}")))?;
        let mut key = Zeroizing::new([0u8; 32]);
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(password.as_bytes(), &salt, key.as_mut_slice())
            .map_err(|err| WalletError::Kdf(err.to_string()))?;
        Ok(key)
    }
}

/// Decrypted seed of a key file. Wiped on drop.
pub struct UnlockedKey {
    pub private_key: [u8; 32],
    pub public_key: [u8; 32],
    pub address: Address,
}

impl std::fmt::Debug for UnlockedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnlockedKey")
            .field("address", &self.address.to_base58())
            .field("public_key", &hex::encode(self.public_key))
            .finish_non_exhaustive()
    }
}

impl Drop for UnlockedKey {
    fn drop(&mut self) {
        self.private_key.zeroize();
    }
}

impl KeyFile {
    /// Seal a fresh random key under `password`.
    pub fn generate(password: &str, label: Option<String>) -> Result<(Self, UnlockedKey)> {
        let signing_key = SigningKey::generate(&mut OsRng);
        let keyfile = Self::seal(&signing_key, password, label)?;
        let unlocked = UnlockedKey {
            private_key: signing_key.to_bytes(),
            public_key: signing_key.verifying_key().to_bytes(),
            address: keyfile.address,
        };
        Ok((keyfile, unlocked))
    }

    pub fn seal(signing_key: &SigningKey, password: &str, label: Option<String>) -> Result<Self> {
        if password.is_empty() {
            return Err(WalletError::WrongPassword);
        }
        let public_key = signing_key.verifying_key().to_bytes();
        let kdf = KdfParams::fresh();
        let key = kdf.derive(password)?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let seed = Zeroizing::new(signing_key.to_bytes());
        let ciphertext = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|err| WalletError::Seal(err.to_string()))?
            .encrypt(Nonce::from_slice(&nonce), seed.as_slice())
            .map_err(|err| WalletError::Seal(err.to_string()))?;

        Ok(Self {
            version: KEYFILE_VERSION,
            address: Address::from_public_key(&public_key),
            public_key: hex::encode(public_key),
            label,
            created_at: Utc::now(),
            crypto: SealedKey {
                cipher: CIPHER.to_string(),
                nonce: BASE64.encode(nonce),
                ciphertext: BASE64.encode(ciphertext),
                kdf,
            },
        })
    }

    /// Write to `path` through a sibling temp file. Refuses to replace an
    /// existing file unless `overwrite` is set.
    pub fn save(&self, path: &Path, overwrite: bool) -> Result<()> {
        if !overwrite && path.exists() {
            return Err(WalletError::Storage(format!(
                "{} already exists",
                path.display()
            )));
        }
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let staging = staging_path(path);
        fs::write(&staging, serde_json::to_vec_pretty(self)?)?;
        fs::rename(&staging, path)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let keyfile: KeyFile = serde_json::from_slice(&fs::read(path)?)?;
        if keyfile.version != KEYFILE_VERSION {
            return Err(WalletError::Storage(format!(
                "{}: key file version {} is not supported",
                path.display(),
                keyfile.version
            )));
        }
        Ok(keyfile)
    }

    /// Decrypt the seed and check it against the recorded address.
    pub fn unlock(&self, password: &str) -> Result<UnlockedKey> {
        if self.crypto.cipher != CIPHER {
            return Err(WalletError::Open(format!(
                "unsupported cipher '{}'",
                self.crypto.cipher
            )));
        }
        let key = self.crypto.kdf.derive(password)?;
        let nonce: [u8; NONCE_LEN] = decode_field("nonce", &self.crypto.nonce)?
            .try_into()
            .map_err(|_| WalletError::Open(format!("nonce must be {NONCE_LEN} bytes")))?;
        let ciphertext = decode_field("ciphertext", &self.crypto.ciphertext)?;

        let plaintext = Zeroizing::new(
            Aes256Gcm::new_from_slice(key.as_slice())
                .map_err(|err| WalletError::Open(err.to_string()))?
                .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
                // tag mismatch: wrong password or corrupted ciphertext
                .map_err(|_| WalletError::WrongPassword)?,
        );
        let private_key: [u8; 32] = plaintext.as_slice().try_into().map_err(|_| {
            WalletError::InvalidKey(format!("sealed seed is {} bytes", plaintext.len()))
        })?;

        let public_key = SigningKey::from_bytes(&private_key)
            .verifying_key()
            .to_bytes();
        let unlocked = UnlockedKey {
            private_key,
            public_key,
            address: Address::from_public_key(&public_key),
        };
        if unlocked.address != self.address || hex::encode(public_key) != self.public_key {
            return Err(WalletError::InvalidKey(format!(
                "sealed key does not belong to {}",
                self.address
            )));
        }
        Ok(unlocked)
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(value)
        .map_err(|err| WalletError::Open(format!("invalid {name}: {err}")))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut staging = path.as_os_str().to_os_string();
    staging.push(".partial");
    PathBuf::from(staging)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn sealed_key_unlocks_from_disk() {
        let (keyfile, unlocked) = KeyFile::generate("hunter2", Some("relayer".into())).unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("relayer.json");
        keyfile.save(&path, false).unwrap();

        let reopened = KeyFile::load(&path).unwrap().unlock("hunter2").unwrap();
        assert_eq!(reopened.address, unlocked.address);
        assert_eq!(reopened.private_key, unlocked.private_key);
        assert_eq!(KeyFile::load(&path).unwrap().label.as_deref(), Some("relayer"));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let (keyfile, _) = KeyFile::generate("hunter2", None).unwrap();
        assert!(matches!(
            keyfile.unlock("hunter3").unwrap_err(),
            WalletError::WrongPassword
        ));
    }

    #[test]
    fn empty_password_cannot_seal() {
        let key = SigningKey::from_bytes(&[9u8; 32]);
        assert!(matches!(
            KeyFile::seal(&key, "", None).unwrap_err(),
            WalletError::WrongPassword
        ));
    }

    #[test]
    fn swapped_address_is_detected() {
        let mut keyfile = KeyFile::seal(&SigningKey::from_bytes(&[9u8; 32]), "pw", None).unwrap();
        keyfile.address = Address::native(0x04);
        assert!(matches!(
            keyfile.unlock("pw").unwrap_err(),
            WalletError::InvalidKey(_)
        ));
    }

    #[test]
    fn unknown_kdf_is_refused() {
        let mut keyfile = KeyFile::seal(&SigningKey::from_bytes(&[9u8; 32]), "pw", None).unwrap();
        keyfile.crypto.kdf.algorithm = "scrypt".into();
        assert!(matches!(
            keyfile.unlock("pw").unwrap_err(),
            WalletError::Kdf(_)
        ));
    }

    #[test]
    fn save_keeps_existing_file_unless_overwriting() {
        let (keyfile, _) = KeyFile::generate("pw", None).unwrap();
        let dir = tempdir().unwrap();
        let path = dir.path().join("signer.json");
        keyfile.save(&path, false).unwrap();
        assert!(matches!(
            keyfile.save(&path, false).unwrap_err(),
            WalletError::Storage(_)
        ));
        keyfile.save(&path, true).unwrap();
    }
}
