use relay_wallet::*;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// Decryptor that fails for one configured path and derives a
/// deterministic key for every other one.
struct FailingAt {
    bad_path: PathBuf,
}

impl KeyDecryptor for FailingAt {
    fn decrypt(&self, path: &Path, _password: &str) -> Result<SigningIdentity> {
        if path == self.bad_path {
            return Err(WalletError::WrongPassword);
        }
        let seed = path.to_string_lossy().len() as u8;
        Ok(SigningIdentity::from_signing_key(
            ed25519_dalek::SigningKey::from_bytes(&[seed; 32]),
        ))
    }
}

fn four_wallets() -> SignerConfig {
    SignerConfig::from_lists("w0.key,w1.key,w2.key,w3.key", "p0,p1,p2,p3")
}

#[test]
fn failing_pair_reports_its_index() {
    let decryptor = FailingAt {
        bad_path: PathBuf::from("w2.key"),
    };
    let err = resolve_with(&decryptor, &four_wallets()).unwrap_err();
    match err {
        ResolveError::Decryption { index, path, .. } => {
            assert_eq!(index, 2);
            assert_eq!(path, PathBuf::from("w2.key"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn mismatched_lists_rejected() {
    let config = SignerConfig::from_lists("a.key,b.key", "only-one");
    let err = resolve_with(&KeyFileDecryptor, &config).unwrap_err();
    assert!(matches!(
        err,
        ResolveError::LengthMismatch {
            wallets: 2,
            passwords: 1
        }
    ));
}

#[test]
fn empty_wallet_list_rejected() {
    let config = SignerConfig::from_lists("", "");
    assert!(matches!(
        resolve(&config).unwrap_err(),
        ResolveError::NoSigners
    ));
}

#[test]
fn keyfiles_on_disk_resolve_in_order() {
    let dir = tempdir().unwrap();
    let mut paths = Vec::new();
    let mut expected = Vec::new();
    for (i, password) in ["alpha", "beta"].iter().enumerate() {
        let (keyfile, unlocked) = KeyFile::generate(password, None).unwrap();
        let path = dir.path().join(format!("signer{i}.key"));
        keyfile.save(&path, false).unwrap();
        paths.push(path);
        expected.push(unlocked.public_key);
    }

    let config = SignerConfig::new(paths, vec!["alpha".into(), "beta".into()]);
    let signers = resolve(&config).unwrap();
    let resolved: Vec<_> = signers.iter().map(SigningIdentity::public_key).collect();
    assert_eq!(resolved, expected);
}

#[test]
fn wrong_password_on_disk_fails_whole_set() {
    let dir = tempdir().unwrap();
    let mut paths = Vec::new();
    for i in 0..2 {
        let (keyfile, _) = KeyFile::generate("right", None).unwrap();
        let path = dir.path().join(format!("signer{i}.key"));
        keyfile.save(&path, false).unwrap();
        paths.push(path);
    }

    let config = SignerConfig::new(paths, vec!["right".into(), "wrong".into()]);
    let err = resolve(&config).unwrap_err();
    assert!(matches!(err, ResolveError::Decryption { index: 1, .. }));
}

#[test]
fn signer_config_debug_redacts_passwords() {
    let rendered = format!("{:?}", SignerConfig::from_lists("a.key", "s3cret"));
    assert!(!rendered.contains("s3cret"));
    assert!(rendered.contains("a.key"));
}
