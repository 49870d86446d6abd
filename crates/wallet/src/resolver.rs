//! Turns configured wallet files and passwords into signing identities.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zeroize::Zeroize;

use crate::errors::{ResolveError, Result};
use crate::identity::SigningIdentity;
use crate::keyfile::KeyFile;

/// Wallet files paired positionally with their passwords.
#[derive(Clone, Default)]
pub struct SignerConfig {
    pub wallet_paths: Vec<PathBuf>,
    pub passwords: Vec<String>,
}

impl SignerConfig {
    pub fn new(wallet_paths: Vec<PathBuf>, passwords: Vec<String>) -> Self {
        Self {
            wallet_paths,
            passwords,
        }
    }

    /// Build from comma separated lists as passed on the command line.
    pub fn from_lists(wallets: &str, passwords: &str) -> Self {
        let wallet_paths = split_list(wallets).map(PathBuf::from).collect();
        let passwords = if passwords.is_empty() {
            Vec::new()
        } else {
            passwords.split(',').map(str::to_string).collect()
        };
        Self::new(wallet_paths, passwords)
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
}

impl std::fmt::Debug for SignerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerConfig")
            .field("wallet_paths", &self.wallet_paths)
            .field("passwords", &format_args!("<{} redacted>", self.passwords.len()))
            .finish()
    }
}

impl Drop for SignerConfig {
    fn drop(&mut self) {
        for password in &mut self.passwords {
            password.zeroize();
        }
    }
}

/// Opens one wallet with one password.
pub trait KeyDecryptor {
    fn decrypt(&self, path: &Path, password: &str) -> Result<SigningIdentity>;
}

/// Reads the JSON keyfiles written by [`KeyFile::save`].
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyFileDecryptor;

impl KeyDecryptor for KeyFileDecryptor {
    fn decrypt(&self, path: &Path, password: &str) -> Result<SigningIdentity> {
        let unlocked = KeyFile::load(path)?.unlock(password)?;
        Ok(SigningIdentity::from(&unlocked))
    }
}

/// Resolve every configured signer from keyfiles on disk.
pub fn resolve(config: &SignerConfig) -> std::result::Result<Vec<SigningIdentity>, ResolveError> {
    resolve_with(&KeyFileDecryptor, config)
}

/// Resolve every configured signer, failing on the first pair that does not
/// decrypt. No partial signer set is ever returned.
pub fn resolve_with<D: KeyDecryptor>(
    decryptor: &D,
    config: &SignerConfig,
) -> std::result::Result<Vec<SigningIdentity>, ResolveError> {
    if config.wallet_paths.is_empty() {
        return Err(ResolveError::NoSigners);
    }
    if config.wallet_paths.len() != config.passwords.len() {
        return Err(ResolveError::LengthMismatch {
            wallets: config.wallet_paths.len(),
            passwords: config.passwords.len(),
        });
    }

    let mut signers = Vec::with_capacity(config.wallet_paths.len());
    for (index, (path, password)) in config
        .wallet_paths
        .iter()
        .zip(&config.passwords)
        .enumerate()
    {
        let identity =
            decryptor
                .decrypt(path, password)
                .map_err(|source| ResolveError::Decryption {
                    index,
                    path: path.clone(),
                    source,
                })?;
        debug!(index, address = %identity.address(), "wallet decrypted");
        signers.push(identity);
    }

    info!(count = signers.len(), "signing identities resolved");
    Ok(signers)
}
