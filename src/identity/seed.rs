//! Encrypted seed files.
//!
//! Seeds are sealed with AES-256-GCM under a key derived (HKDF-SHA256) from
//! `SEED_ENCRYPTION_KEY`. The on-disk shape is a JSON object keyed by wallet id:
//!
//! ```json
//! { "<wallet_id>": { "seed": "<hex ciphertext>", "iv": "<hex nonce>", "encrypted": true } }
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use alloy::primitives::hex;
use hkdf::Hkdf;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StoreError;
use crate::persist::write_json_atomic;
use crate::settings::SeedFileMode;

const HKDF_SALT: &[u8] = b"onchain-agents-seed-v1";
const HKDF_INFO: &[u8] = b"wallet-seed-file";
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// A sealed seed as written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedSeed {
    pub seed: String,
    pub iv: String,
    pub encrypted: bool,
}

/// AES-256-GCM sealing for seed material.
pub struct SeedCipher {
    key: [u8; KEY_LEN],
}

impl SeedCipher {
    /// Derive the cipher key from a master secret.
    pub fn from_secret(master: &SecretString) -> Result<Self, StoreError> {
        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), master.expose_secret().as_bytes());
        let mut key = [0u8; KEY_LEN];
        hk.expand(HKDF_INFO, &mut key)
            .map_err(|e| StoreError::Crypto {
                reason: format!("key derivation failed: {}", e),
            })?;
        Ok(Self { key })
    }

    /// Random key that only lives as long as this process.
    pub fn ephemeral() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }

    fn aead(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key))
    }

    pub fn seal(&self, plaintext: &str) -> Result<SealedSeed, StoreError> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = self
            .aead()
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
            .map_err(|_| StoreError::Crypto {
                reason: "encryption failed".to_string(),
            })?;
        Ok(SealedSeed {
            seed: hex::encode(ciphertext),
            iv: hex::encode(nonce),
            encrypted: true,
        })
    }

    pub fn open(&self, sealed: &SealedSeed) -> Result<SecretString, StoreError> {
        if !sealed.encrypted {
            return Ok(SecretString::from(sealed.seed.clone()));
        }
        let nonce = hex::decode(&sealed.iv).map_err(|e| StoreError::Crypto {
            reason: format!("bad nonce: {}", e),
        })?;
        if nonce.len() != NONCE_LEN {
            return Err(StoreError::Crypto {
                reason: format!("nonce must be {} bytes, got {}", NONCE_LEN, nonce.len()),
            });
        }
        let ciphertext = hex::decode(&sealed.seed).map_err(|e| StoreError::Crypto {
            reason: format!("bad ciphertext: {}", e),
        })?;
        let plaintext = self
            .aead()
            .decrypt(Nonce::from_slice(&nonce), ciphertext.as_slice())
            .map_err(|_| StoreError::Crypto {
                reason: "decryption failed (wrong SEED_ENCRYPTION_KEY?)".to_string(),
            })?;
        String::from_utf8(plaintext)
            .map(SecretString::from)
            .map_err(|_| StoreError::Crypto {
                reason: "decrypted seed is not UTF-8".to_string(),
            })
    }
}

/// Where and how encrypted seeds are written.
pub struct SeedVault {
    mode: SeedFileMode,
    wallet_dir: PathBuf,
    shared_file: PathBuf,
    cipher: SeedCipher,
}

impl SeedVault {
    pub fn new(
        mode: SeedFileMode,
        wallet_dir: PathBuf,
        shared_file: PathBuf,
        cipher: SeedCipher,
    ) -> Self {
        Self {
            mode,
            wallet_dir,
            shared_file,
            cipher,
        }
    }

    /// File holding the seed for `wallet_id` under the configured mode.
    pub fn path_for(&self, wallet_id: &str) -> PathBuf {
        match self.mode {
            SeedFileMode::PerIdentity => self.wallet_dir.join(format!("{}.seed.json", wallet_id)),
            SeedFileMode::Shared => self.shared_file.clone(),
        }
    }

    /// Encrypt and write the seed. In shared mode the whole file is replaced,
    /// so only the most recently saved wallet survives.
    pub fn save(&self, wallet_id: &str, seed: &SecretString) -> Result<PathBuf, StoreError> {
        let sealed = self.cipher.seal(seed.expose_secret())?;
        let mut entries = BTreeMap::new();
        entries.insert(wallet_id.to_string(), sealed);

        let path = self.path_for(wallet_id);
        write_json_atomic(&path, &entries, "encrypted seed")?;
        if self.mode == SeedFileMode::Shared {
            tracing::debug!(wallet_id, "Shared seed file overwritten");
        }
        Ok(path)
    }

    /// Decrypt the seed for `wallet_id`, if the file holds one.
    pub fn load(&self, wallet_id: &str) -> Result<Option<SecretString>, StoreError> {
        let path = self.path_for(wallet_id);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        let entries: BTreeMap<String, SealedSeed> =
            serde_json::from_str(&data).map_err(|e| StoreError::Malformed {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        entries
            .get(wallet_id)
            .map(|sealed| self.cipher.open(sealed))
            .transpose()
    }
}
