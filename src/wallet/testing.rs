//! In-memory wallet backend for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rust_decimal::Decimal;

use super::keys;
use super::{DeployReceipt, InvokeReceipt, TransferReceipt, TransferRequest, Wallet, WalletBackend};
use crate::error::WalletError;
use crate::identity::WalletRecord;

#[derive(Default)]
struct State {
    balances: HashMap<String, Decimal>,
    transfers: Vec<TransferRequest>,
    mints: Vec<(String, String, u64)>,
    deployments: Vec<(String, String, u128)>,
    fail_balance: Option<WalletError>,
    fail_transfer: Option<WalletError>,
    fail_create: Option<WalletError>,
    created: u32,
}

/// Wallets share one ledger so tests can inspect what the agent did.
pub struct MemoryBackend {
    network_id: String,
    state: Arc<Mutex<State>>,
}

impl MemoryBackend {
    pub fn new(network_id: &str) -> Self {
        Self {
            network_id: network_id.to_string(),
            state: Arc::default(),
        }
    }

    pub fn set_balance(&self, asset_id: &str, amount: Decimal) {
        self.state
            .lock()
            .unwrap()
            .balances
            .insert(asset_id.to_lowercase(), amount);
    }

    pub fn fail_next_balance(&self, error: WalletError) {
        self.state.lock().unwrap().fail_balance = Some(error);
    }

    pub fn fail_next_create(&self, error: WalletError) {
        self.state.lock().unwrap().fail_create = Some(error);
    }

    pub fn fail_next_transfer(&self, error: WalletError) {
        self.state.lock().unwrap().fail_transfer = Some(error);
    }

    pub fn transfers(&self) -> Vec<TransferRequest> {
        self.state.lock().unwrap().transfers.clone()
    }

    pub fn mints(&self) -> Vec<(String, String, u64)> {
        self.state.lock().unwrap().mints.clone()
    }

    pub fn deployments(&self) -> Vec<(String, String, u128)> {
        self.state.lock().unwrap().deployments.clone()
    }

    fn wallet(&self, wallet_id: String, signer: alloy::signers::local::PrivateKeySigner) -> Arc<dyn Wallet> {
        Arc::new(MemoryWallet {
            wallet_id,
            network_id: self.network_id.clone(),
            signer,
            state: self.state.clone(),
        })
    }
}

#[async_trait]
impl WalletBackend for MemoryBackend {
    async fn create(&self) -> Result<Arc<dyn Wallet>, WalletError> {
        let n = {
            let mut state = self.state.lock().unwrap();
            if let Some(e) = state.fail_create.take() {
                return Err(e);
            }
            state.created += 1;
            state.created
        };
        Ok(self.wallet(format!("memory-wallet-{}", n), keys::generate_signer()))
    }

    async fn import(&self, record: &WalletRecord) -> Result<Arc<dyn Wallet>, WalletError> {
        let signer = keys::signer_from_seed(&record.seed)?;
        Ok(self.wallet(record.wallet_id.clone(), signer))
    }
}

struct MemoryWallet {
    wallet_id: String,
    network_id: String,
    signer: alloy::signers::local::PrivateKeySigner,
    state: Arc<Mutex<State>>,
}

#[async_trait]
impl Wallet for MemoryWallet {
    fn wallet_id(&self) -> &str {
        &self.wallet_id
    }

    fn network_id(&self) -> &str {
        &self.network_id
    }

    fn default_address(&self) -> String {
        keys::address_of(&self.signer)
    }

    fn export(&self) -> WalletRecord {
        WalletRecord::new(self.wallet_id.clone(), keys::seed_of(&self.signer))
            .with_network(self.network_id.clone())
    }

    async fn balance(&self, asset_id: &str) -> Result<Decimal, WalletError> {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = state.fail_balance.take() {
            return Err(e);
        }
        state
            .balances
            .get(&asset_id.to_lowercase())
            .copied()
            .ok_or_else(|| WalletError::UnsupportedAsset {
                asset_id: asset_id.to_string(),
                network_id: self.network_id.clone(),
            })
    }

    async fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt, WalletError> {
        let mut state = self.state.lock().unwrap();
        if let Some(e) = state.fail_transfer.take() {
            return Err(e);
        }
        let key = request.asset_id.to_lowercase();
        let balance = state.balances.get(&key).copied().unwrap_or_default();
        if balance < request.amount {
            return Err(WalletError::InsufficientBalance {
                asset_id: request.asset_id.clone(),
                balance,
                requested: request.amount,
            });
        }
        state.balances.insert(key, balance - request.amount);
        let tx_hash = format!("0x{:064x}", state.transfers.len() + 1);
        state.transfers.push(request);
        Ok(TransferReceipt { tx_hash })
    }

    async fn deploy_token(
        &self,
        name: &str,
        symbol: &str,
        initial_supply: u128,
    ) -> Result<DeployReceipt, WalletError> {
        let mut state = self.state.lock().unwrap();
        state
            .deployments
            .push((name.to_string(), symbol.to_string(), initial_supply));
        let n = state.deployments.len();
        Ok(DeployReceipt {
            contract_address: format!("0x{:040x}", 0xc0de_0000u64 + n as u64),
            tx_hash: format!("0x{:064x}", n),
        })
    }

    async fn invoke_mint(
        &self,
        contract: &str,
        to: &str,
        quantity: u64,
    ) -> Result<InvokeReceipt, WalletError> {
        if !to.starts_with("0x") || to.len() != 42 {
            return Err(WalletError::InvalidAddress {
                address: to.to_string(),
            });
        }
        let mut state = self.state.lock().unwrap();
        state
            .mints
            .push((contract.to_string(), to.to_string(), quantity));
        Ok(InvokeReceipt {
            tx_hash: format!("0x{:064x}", state.mints.len()),
        })
    }
}
