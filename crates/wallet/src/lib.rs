//! Relayer wallet
//!
//! Password protected keyfiles and the signing identities decrypted from
//! them. Every configured wallet must open before a bootstrap transaction
//! can be signed.

pub mod errors;
pub mod identity;
pub mod keyfile;
pub mod resolver;

pub use errors::*;
pub use identity::SigningIdentity;
pub use keyfile::{KeyFile, UnlockedKey};
pub use resolver::{resolve, resolve_with, KeyDecryptor, KeyFileDecryptor, SignerConfig};
