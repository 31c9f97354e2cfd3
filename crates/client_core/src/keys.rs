//! Submitter identity backed by an Ed25519 key on disk.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use ed25519_dalek::{SigningKey, SECRET_KEY_LENGTH};
use shared::domain::SignerPublicKey;
use thiserror::Error;

const KEY_DIR: [&str; 2] = [".sawtooth", "keys"];
const KEY_EXTENSION: &str = "priv";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyError {
    #[error("key file is not valid hex")]
    NotHex,
    #[error("key must be {SECRET_KEY_LENGTH} bytes, got {0}")]
    WrongLength(usize),
}

/// `~/.sawtooth/keys/<username>.priv`
pub fn default_keyfile(username: &str) -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("could not resolve home directory"))?;
    let mut path = home;
    path.extend(KEY_DIR);
    path.push(format!("{username}.{KEY_EXTENSION}"));
    Ok(path)
}

pub struct Signer {
    key: SigningKey,
}

impl Signer {
    /// Parses a hex-encoded 32-byte seed. Surrounding whitespace is ignored.
    pub fn from_seed_hex(text: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(text.trim()).map_err(|_| KeyError::NotHex)?;
        let seed: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::WrongLength(bytes.len()))?;
        Ok(Self {
            key: SigningKey::from_bytes(&seed),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read key file '{}'", path.display()))?;
        Self::from_seed_hex(&text)
            .with_context(|| format!("failed to parse key file '{}'", path.display()))
    }

    pub fn public_key(&self) -> SignerPublicKey {
        SignerPublicKey(hex::encode(self.key.verifying_key().as_bytes()))
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer")
            .field("public_key", &self.public_key().0)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = "0101010101010101010101010101010101010101010101010101010101010101";

    #[test]
    fn keyfile_lives_under_sawtooth_keys() {
        let path = default_keyfile("jack").expect("home");
        assert!(path.ends_with(".sawtooth/keys/jack.priv"));
    }

    #[test]
    fn public_key_is_stable_lowercase_hex() {
        let first = Signer::from_seed_hex(SEED).expect("seed").public_key();
        let second = Signer::from_seed_hex(&format!("{SEED}\n"))
            .expect("seed")
            .public_key();
        assert_eq!(first, second);
        assert_eq!(first.0.len(), 64);
        assert!(first
            .0
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    }

    #[test]
    fn rejects_bad_seeds() {
        assert_eq!(
            Signer::from_seed_hex("zz").map(|_| ()),
            Err(KeyError::NotHex)
        );
        assert_eq!(
            Signer::from_seed_hex("abcd").map(|_| ()),
            Err(KeyError::WrongLength(2))
        );
    }

    #[test]
    fn load_reads_seed_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jack.priv");
        fs::write(&path, SEED).expect("write");

        let signer = Signer::load(&path).expect("load");
        assert_eq!(
            signer.public_key(),
            Signer::from_seed_hex(SEED).expect("seed").public_key()
        );

        let missing = Signer::load(&dir.path().join("nobody.priv")).expect_err("missing");
        assert!(missing.to_string().contains("nobody.priv"));
    }
}
