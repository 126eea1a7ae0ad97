//! Wallet credential persistence.
//!
//! Each agent identity is a wallet managed by a [`WalletBackend`]. Its
//! exportable state ([`WalletRecord`]: wallet id + seed) is stored as
//! `<wallet_dir>/<wallet_id>.json`, its encrypted seed as described in
//! [`seed`], and its id is appended to a flat registry file.
//!
//! # Layout
//!
//! ```text
//! <root>/
//!   wallet_storage/<wallet_id>.json        {wallet_id, seed, network_id}
//!   wallet_storage/<wallet_id>.seed.json   encrypted seed (per-identity mode)
//!   my_seed.json                           encrypted seed (shared mode)
//!   wallet_ids.txt                         one wallet id per line
//! ```

pub mod seed;

use std::path::PathBuf;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::error::{ConfigError, Error, StoreError, WalletError};
use crate::persist::{ensure_dir, write_atomic, write_json_atomic};
use crate::wallet::{Wallet, WalletBackend};

pub use seed::{SeedCipher, SeedVault};

/// Exported wallet state: enough to re-import the wallet later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    /// Opaque id assigned by the wallet backend.
    pub wallet_id: String,

    /// Seed material the backend derives keys from.
    #[serde(serialize_with = "serialize_secret")]
    pub seed: SecretString,

    /// Network the wallet was created on, when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_id: Option<String>,
}

impl WalletRecord {
    pub fn new(wallet_id: impl Into<String>, seed: SecretString) -> Self {
        Self {
            wallet_id: wallet_id.into(),
            seed,
            network_id: None,
        }
    }

    pub fn with_network(mut self, network_id: impl Into<String>) -> Self {
        self.network_id = Some(network_id.into());
        self
    }
}

impl PartialEq for WalletRecord {
    fn eq(&self, other: &Self) -> bool {
        self.wallet_id == other.wallet_id
            && self.network_id == other.network_id
            && self.seed.expose_secret() == other.seed.expose_secret()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &SecretString,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Wallet ids become file names, so path separators are never accepted.
fn is_safe_wallet_id(wallet_id: &str) -> bool {
    !wallet_id.is_empty()
        && !wallet_id.contains(['/', '\\'])
        && wallet_id != "."
        && wallet_id != ".."
}

/// Creates, stores, and restores wallets.
pub struct CredentialStore {
    storage: StorageConfig,
    vault: SeedVault,
    backend: Arc<dyn WalletBackend>,
}

impl CredentialStore {
    /// Open the store, creating the wallet directory if needed.
    pub fn open(
        storage: StorageConfig,
        backend: Arc<dyn WalletBackend>,
    ) -> Result<Self, StoreError> {
        ensure_dir(&storage.wallet_dir)?;
        let cipher = match &storage.seed_encryption_key {
            Some(key) => SeedCipher::from_secret(key)?,
            None => {
                warn!(
                    "SEED_ENCRYPTION_KEY is not set; encrypted seed files written by this run \
                     cannot be decrypted after it exits"
                );
                SeedCipher::ephemeral()
            }
        };
        let vault = SeedVault::new(
            storage.seed_file_mode,
            storage.wallet_dir.clone(),
            storage.shared_seed_file(),
            cipher,
        );
        Ok(Self {
            storage,
            vault,
            backend,
        })
    }

    pub fn vault(&self) -> &SeedVault {
        &self.vault
    }

    /// Allocate a brand new wallet from the backend.
    pub async fn create(&self) -> Result<Arc<dyn Wallet>, WalletError> {
        let wallet = self.backend.create().await?;
        info!(
            wallet_id = wallet.wallet_id(),
            address = %wallet.default_address(),
            "Created new wallet"
        );
        Ok(wallet)
    }

    fn record_path(&self, wallet_id: &str) -> PathBuf {
        self.storage.wallet_dir.join(format!("{}.json", wallet_id))
    }

    /// Read the stored record for `wallet_id`. `Ok(None)` when no record exists.
    pub fn fetch(&self, wallet_id: &str) -> Result<Option<WalletRecord>, StoreError> {
        if !is_safe_wallet_id(wallet_id) {
            warn!(wallet_id, "Rejecting wallet id that is not a plain file name");
            return Ok(None);
        }

        let path = self.record_path(wallet_id);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(wallet_id, "No wallet data found");
                return Ok(None);
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let record: WalletRecord =
            serde_json::from_str(&data).map_err(|e| StoreError::Malformed {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        info!(wallet_id, "Wallet data successfully fetched");
        Ok(Some(record))
    }

    /// Fetch and re-import a wallet. A missing record is a configuration error.
    pub async fn reconstruct(&self, wallet_id: &str) -> Result<Arc<dyn Wallet>, Error> {
        let record = self
            .fetch(wallet_id)?
            .ok_or_else(|| ConfigError::WalletNotFound {
                wallet_id: wallet_id.to_string(),
            })?;
        let wallet = self.backend.import(&record).await?;
        debug!(wallet_id, address = %wallet.default_address(), "Wallet reconstructed");
        Ok(wallet)
    }

    /// Write `record` to `<wallet_id>.json`, replacing any previous record.
    pub fn store(&self, record: &WalletRecord) -> Result<PathBuf, StoreError> {
        if !is_safe_wallet_id(&record.wallet_id) {
            return Err(StoreError::Serialization {
                what: "wallet record".to_string(),
                reason: format!("wallet id '{}' is not a plain file name", record.wallet_id),
            });
        }
        ensure_dir(&self.storage.wallet_dir)?;
        let path = self.record_path(&record.wallet_id);
        write_json_atomic(&path, record, "wallet record")?;
        info!(wallet_id = %record.wallet_id, "Wallet data successfully stored");
        Ok(path)
    }

    /// Export the live wallet and persist its record, encrypted seed and registry entry.
    ///
    /// Returns `true` when the wallet id was newly registered.
    pub fn persist(&self, wallet: &dyn Wallet) -> Result<bool, StoreError> {
        let record = wallet.export();
        self.store(&record)?;
        let seed_path = self.vault.save(&record.wallet_id, &record.seed)?;
        debug!(wallet_id = %record.wallet_id, path = %seed_path.display(), "Encrypted seed saved");
        self.register(&record.wallet_id)
    }

    /// Append `wallet_id` to the registry unless it is already listed.
    ///
    /// Returns `true` when the id was appended.
    pub fn register(&self, wallet_id: &str) -> Result<bool, StoreError> {
        let mut ids = self.registered_ids()?;
        if ids.iter().any(|id| id == wallet_id) {
            info!(wallet_id, "Wallet id already registered");
            return Ok(false);
        }

        ids.push(wallet_id.to_string());
        if let Some(parent) = self.storage.registry_file.parent() {
            ensure_dir(parent)?;
        }
        let mut contents = ids.join("\n");
        contents.push('\n');
        write_atomic(&self.storage.registry_file, contents.as_bytes())?;
        info!(wallet_id, "Wallet id registered");
        Ok(true)
    }

    /// All wallet ids in the registry, in registration order.
    pub fn registered_ids(&self) -> Result<Vec<String>, StoreError> {
        let path = &self.storage.registry_file;
        match std::fs::read_to_string(path) {
            Ok(data) => Ok(data
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("wallet_dir", &self.storage.wallet_dir)
            .field("registry_file", &self.storage.registry_file)
            .field("seed_file_mode", &self.storage.seed_file_mode)
            .finish()
    }
}
