//! Error types for every subsystem.

use std::path::PathBuf;
use std::time::Duration;

use rust_decimal::Decimal;

/// Startup/configuration errors. These abort the run.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Wallet with ID {wallet_id} could not be found.")]
    WalletNotFound { wallet_id: String },

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },

    #[error("Missing required setting: {key}")]
    Missing { key: String },
}

/// Local persistence errors (credential files, registry, profiles).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("Failed to serialize {what}: {reason}")]
    Serialization { what: String, reason: String },

    #[error("Seed encryption error: {reason}")]
    Crypto { reason: String },
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Wallet backend errors.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    #[error("invalid private key format")]
    InvalidPrivateKey,

    #[error("failed to create signer: {0}")]
    SignerCreation(String),

    #[error("invalid address '{address}'")]
    InvalidAddress { address: String },

    #[error("invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error("asset {asset_id} is not supported on network {network_id}")]
    UnsupportedAsset { asset_id: String, network_id: String },

    #[error("insufficient balance: have {balance} {asset_id}, need {requested}")]
    InsufficientBalance {
        asset_id: String,
        balance: Decimal,
        requested: Decimal,
    },

    #[error("{operation} is unavailable: {reason}")]
    Unsupported { operation: String, reason: String },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: String },

    #[error("{operation} timed out after {}s", .timeout.as_secs())]
    Timeout {
        operation: String,
        timeout: Duration,
    },
}

impl WalletError {
    /// Whether a retry of a read-only call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Rpc(_) | Self::Timeout { .. })
    }
}

/// Language model errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Model backend is not available at {url}: {message}")]
    Unavailable { url: String, message: String },

    #[error("Model request failed: {message}")]
    RequestFailed { message: String },

    #[error("Failed to parse model response: {message}")]
    ParseError { message: String },

    #[error("Model request timed out after {}s", .timeout.as_secs())]
    Timeout { timeout: Duration },
}

impl LlmError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Unavailable { .. } | Self::RequestFailed { .. } | Self::Timeout { .. }
        )
    }
}

/// Top-level error returned by the driver.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Terminal error: {0}")]
    Terminal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
