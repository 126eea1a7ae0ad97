//! Timeout/retry decorator for wallet backends.
//!
//! Balance reads are retried on transient failure; anything that submits a
//! transaction only gets a deadline, since a retried write could settle twice.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::{DeployReceipt, InvokeReceipt, TransferReceipt, TransferRequest, Wallet, WalletBackend};
use crate::config::CallPolicy;
use crate::error::WalletError;
use crate::identity::WalletRecord;
use crate::retry::{with_retry, with_timeout};

/// Wraps a backend so every wallet it hands out is a [`GuardedWallet`].
pub struct GuardedBackend {
    inner: Arc<dyn WalletBackend>,
    policy: CallPolicy,
}

impl GuardedBackend {
    pub fn new(inner: Arc<dyn WalletBackend>, policy: CallPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl WalletBackend for GuardedBackend {
    async fn create(&self) -> Result<Arc<dyn Wallet>, WalletError> {
        let wallet = with_timeout("create wallet", self.policy, self.inner.create()).await?;
        Ok(Arc::new(GuardedWallet::new(wallet, self.policy)))
    }

    async fn import(&self, record: &WalletRecord) -> Result<Arc<dyn Wallet>, WalletError> {
        let wallet = with_timeout("import wallet", self.policy, self.inner.import(record)).await?;
        Ok(Arc::new(GuardedWallet::new(wallet, self.policy)))
    }
}

pub struct GuardedWallet {
    inner: Arc<dyn Wallet>,
    policy: CallPolicy,
}

impl GuardedWallet {
    pub fn new(inner: Arc<dyn Wallet>, policy: CallPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl Wallet for GuardedWallet {
    fn wallet_id(&self) -> &str {
        self.inner.wallet_id()
    }

    fn network_id(&self) -> &str {
        self.inner.network_id()
    }

    fn default_address(&self) -> String {
        self.inner.default_address()
    }

    fn export(&self) -> WalletRecord {
        self.inner.export()
    }

    async fn balance(&self, asset_id: &str) -> Result<Decimal, WalletError> {
        with_retry("balance", self.policy, || self.inner.balance(asset_id)).await
    }

    async fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt, WalletError> {
        with_timeout("transfer", self.policy, self.inner.transfer(request)).await
    }

    async fn deploy_token(
        &self,
        name: &str,
        symbol: &str,
        initial_supply: u128,
    ) -> Result<DeployReceipt, WalletError> {
        with_timeout(
            "deploy token",
            self.policy,
            self.inner.deploy_token(name, symbol, initial_supply),
        )
        .await
    }

    async fn invoke_mint(
        &self,
        contract: &str,
        to: &str,
        quantity: u64,
    ) -> Result<InvokeReceipt, WalletError> {
        with_timeout(
            "mint",
            self.policy,
            self.inner.invoke_mint(contract, to, quantity),
        )
        .await
    }
}
