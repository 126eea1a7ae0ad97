//! Wallet backend seam.
//!
//! [`WalletBackend`] allocates and re-imports wallets; [`Wallet`] is one live
//! wallet that can report balances and settle transfers, mints and token
//! deployments. [`evm::EvmBackend`] is the production implementation;
//! [`guarded::GuardedBackend`] adds timeouts and read retries around any backend.

pub mod assets;
pub mod evm;
pub mod guarded;
pub mod keys;
#[cfg(test)]
pub mod testing;

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::WalletError;
use crate::identity::WalletRecord;

pub use evm::EvmBackend;
pub use guarded::GuardedBackend;

/// A request to move `amount` of `asset_id` to `destination`.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRequest {
    pub amount: Decimal,
    pub asset_id: String,
    pub destination: String,
    /// Ask the backend to sponsor gas. Backends without a relayer settle normally.
    pub gasless: bool,
}

/// Settled transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub tx_hash: String,
}

/// Settled contract deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReceipt {
    pub contract_address: String,
    pub tx_hash: String,
}

/// Settled contract invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeReceipt {
    pub tx_hash: String,
}

/// Allocates wallets and restores them from exported records.
#[async_trait]
pub trait WalletBackend: Send + Sync {
    /// Create a brand new wallet.
    async fn create(&self) -> Result<Arc<dyn Wallet>, WalletError>;

    /// Re-import a wallet from its exported record.
    async fn import(&self, record: &WalletRecord) -> Result<Arc<dyn Wallet>, WalletError>;
}

/// One live wallet.
#[async_trait]
pub trait Wallet: Send + Sync {
    fn wallet_id(&self) -> &str;

    fn network_id(&self) -> &str;

    /// Public address used as the profile key.
    fn default_address(&self) -> String;

    /// Exportable state (id + seed).
    fn export(&self) -> WalletRecord;

    /// Balance of `asset_id` in whole units.
    async fn balance(&self, asset_id: &str) -> Result<Decimal, WalletError>;

    /// Transfer and wait for settlement.
    async fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt, WalletError>;

    /// Deploy an ERC-20 token and wait for settlement.
    async fn deploy_token(
        &self,
        name: &str,
        symbol: &str,
        initial_supply: u128,
    ) -> Result<DeployReceipt, WalletError>;

    /// Call `mint(to, quantity)` on `contract` and wait for settlement.
    async fn invoke_mint(
        &self,
        contract: &str,
        to: &str,
        quantity: u64,
    ) -> Result<InvokeReceipt, WalletError>;
}
