//! EVM wallet backend on alloy.
//!
//! Keys are local (`PrivateKeySigner`); every chain interaction goes through
//! an HTTP JSON-RPC provider that fills nonce, gas and chain id and signs
//! with the wallet's key.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use alloy::network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, Bytes, U256, hex};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use alloy::sol_types::SolValue;
use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::assets::{Asset, ETH_DECIMALS, from_base_units, to_base_units};
use super::keys;
use super::{DeployReceipt, InvokeReceipt, TransferReceipt, TransferRequest, Wallet, WalletBackend};
use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::identity::WalletRecord;

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
        function transfer(address to, uint256 amount) external returns (bool);
    }

    #[sol(rpc)]
    interface IMintable {
        function mint(address to, uint256 quantity) external;
    }
}

fn rpc(e: impl std::fmt::Display) -> WalletError {
    WalletError::Rpc(e.to_string())
}

fn parse_address(raw: &str) -> Result<Address, WalletError> {
    Address::from_str(raw.trim()).map_err(|_| WalletError::InvalidAddress {
        address: raw.to_string(),
    })
}

/// Refuse a transfer the current balance cannot cover, before anything is signed.
fn ensure_covers(request: &TransferRequest, balance: Decimal) -> Result<(), WalletError> {
    if balance < request.amount {
        return Err(WalletError::InsufficientBalance {
            asset_id: request.asset_id.clone(),
            balance,
            requested: request.amount,
        });
    }
    Ok(())
}

/// Creates and imports [`EvmWallet`]s for one network.
#[derive(Debug, Clone)]
pub struct EvmBackend {
    network_id: String,
    rpc_url: url::Url,
    token_bytecode_path: Option<PathBuf>,
}

impl EvmBackend {
    pub fn new(config: &WalletConfig) -> Result<Self, WalletError> {
        let rpc_url = url::Url::parse(&config.rpc_url).map_err(rpc)?;
        Ok(Self {
            network_id: config.network_id.clone(),
            rpc_url,
            token_bytecode_path: config.token_bytecode_path.clone(),
        })
    }

    fn wallet(&self, wallet_id: String, signer: PrivateKeySigner) -> Arc<dyn Wallet> {
        Arc::new(EvmWallet {
            wallet_id,
            network_id: self.network_id.clone(),
            rpc_url: self.rpc_url.clone(),
            token_bytecode_path: self.token_bytecode_path.clone(),
            signer,
        })
    }
}

#[async_trait]
impl WalletBackend for EvmBackend {
    async fn create(&self) -> Result<Arc<dyn Wallet>, WalletError> {
        let wallet_id = uuid::Uuid::new_v4().to_string();
        Ok(self.wallet(wallet_id, keys::generate_signer()))
    }

    async fn import(&self, record: &WalletRecord) -> Result<Arc<dyn Wallet>, WalletError> {
        if let Some(network) = &record.network_id {
            if network != &self.network_id {
                tracing::warn!(
                    wallet_id = %record.wallet_id,
                    stored = %network,
                    configured = %self.network_id,
                    "Wallet was created on a different network"
                );
            }
        }
        let signer = keys::signer_from_seed(&record.seed)?;
        Ok(self.wallet(record.wallet_id.clone(), signer))
    }
}

/// A wallet holding a local signing key.
pub struct EvmWallet {
    wallet_id: String,
    network_id: String,
    rpc_url: url::Url,
    token_bytecode_path: Option<PathBuf>,
    signer: PrivateKeySigner,
}

impl EvmWallet {
    fn provider(&self) -> impl Provider + Clone {
        ProviderBuilder::new()
            .wallet(EthereumWallet::from(self.signer.clone()))
            .connect_http(self.rpc_url.clone())
    }

    async fn token_decimals(&self, contract: Address, known: Option<u8>) -> Result<u8, WalletError> {
        if let Some(decimals) = known {
            return Ok(decimals);
        }
        IERC20::new(contract, self.provider())
            .decimals()
            .call()
            .await
            .map_err(|e| {
                debug!(contract = %contract, error = %e, "decimals() call failed");
                WalletError::UnsupportedAsset {
                    asset_id: contract.to_checksum(None),
                    network_id: self.network_id.clone(),
                }
            })
    }

    async fn send(&self, tx: TransactionRequest) -> Result<alloy::rpc::types::TransactionReceipt, WalletError> {
        let receipt = self
            .provider()
            .send_transaction(tx)
            .await
            .map_err(rpc)?
            .get_receipt()
            .await
            .map_err(rpc)?;
        let tx_hash = receipt.transaction_hash().to_string();
        if !receipt.status() {
            return Err(WalletError::Reverted { tx_hash });
        }
        debug!(tx_hash = %tx_hash, block = ?receipt.block_number(), "Transaction settled");
        Ok(receipt)
    }

    fn load_token_bytecode(&self) -> Result<Bytes, WalletError> {
        let path = self
            .token_bytecode_path
            .as_ref()
            .ok_or_else(|| WalletError::Unsupported {
                operation: "Token deployment".to_string(),
                reason: "no ERC-20 creation bytecode configured (set TOKEN_BYTECODE_PATH)"
                    .to_string(),
            })?;
        let raw = std::fs::read_to_string(path).map_err(|e| WalletError::Unsupported {
            operation: "Token deployment".to_string(),
            reason: format!("cannot read {}: {}", path.display(), e),
        })?;
        let trimmed = raw.trim();
        let code = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed)).map_err(|e| {
            WalletError::Unsupported {
                operation: "Token deployment".to_string(),
                reason: format!("{} is not hex bytecode: {}", path.display(), e),
            }
        })?;
        Ok(Bytes::from(code))
    }
}

#[async_trait]
impl Wallet for EvmWallet {
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
        let owner = self.signer.address();
        match Asset::resolve(asset_id, &self.network_id)? {
            Asset::Native => {
                let wei = self.provider().get_balance(owner).await.map_err(rpc)?;
                from_base_units(wei, ETH_DECIMALS)
            }
            Asset::Erc20 { contract, decimals } => {
                let decimals = self.token_decimals(contract, decimals).await?;
                let raw: U256 = IERC20::new(contract, self.provider())
                    .balanceOf(owner)
                    .call()
                    .await
                    .map_err(rpc)?;
                from_base_units(raw, decimals)
            }
        }
    }

    async fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt, WalletError> {
        let to = parse_address(&request.destination)?;
        if request.gasless {
            info!(
                asset = %request.asset_id,
                "No gas relayer configured; settling gasless transfer as a regular transaction"
            );
        }

        let held = self.balance(&request.asset_id).await?;
        ensure_covers(&request, held)?;

        let tx = match Asset::resolve(&request.asset_id, &self.network_id)? {
            Asset::Native => TransactionRequest::default()
                .with_to(to)
                .with_value(to_base_units(request.amount, ETH_DECIMALS)?),
            Asset::Erc20 { contract, decimals } => {
                let decimals = self.token_decimals(contract, decimals).await?;
                let amount = to_base_units(request.amount, decimals)?;
                let token = IERC20::new(contract, self.provider());
                token.transfer(to, amount).into_transaction_request()
            }
        };

        let receipt = self.send(tx).await?;
        let tx_hash = receipt.transaction_hash().to_string();
        info!(
            wallet_id = %self.wallet_id,
            amount = %request.amount,
            asset = %request.asset_id,
            tx_hash = %tx_hash,
            "Transfer settled"
        );
        Ok(TransferReceipt { tx_hash })
    }

    async fn deploy_token(
        &self,
        name: &str,
        symbol: &str,
        initial_supply: u128,
    ) -> Result<DeployReceipt, WalletError> {
        let mut code = self.load_token_bytecode()?.to_vec();
        let args = (name.to_string(), symbol.to_string(), U256::from(initial_supply));
        code.extend_from_slice(&args.abi_encode_params());

        let tx = TransactionRequest::default().with_deploy_code(Bytes::from(code));
        let receipt = self.send(tx).await?;
        let contract_address = receipt
            .contract_address()
            .ok_or_else(|| WalletError::Rpc("deployment receipt has no contract address".into()))?
            .to_checksum(None);
        info!(name, symbol, contract = %contract_address, "Token deployed");
        Ok(DeployReceipt {
            contract_address,
            tx_hash: receipt.transaction_hash().to_string(),
        })
    }

    async fn invoke_mint(
        &self,
        contract: &str,
        to: &str,
        quantity: u64,
    ) -> Result<InvokeReceipt, WalletError> {
        let contract = parse_address(contract)?;
        let to = parse_address(to)?;
        let nft = IMintable::new(contract, self.provider());
        let tx = nft.mint(to, U256::from(quantity)).into_transaction_request();
        let receipt = self.send(tx).await?;
        Ok(InvokeReceipt {
            tx_hash: receipt.transaction_hash().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::CallPolicy;

    fn backend(bytecode: Option<PathBuf>) -> EvmBackend {
        EvmBackend::new(&WalletConfig {
            network_id: "base-sepolia".to_string(),
            rpc_url: "http://127.0.0.1:1".to_string(),
            token_bytecode_path: bytecode,
            policy: CallPolicy::new(Duration::from_secs(1), 0),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn create_then_import_keeps_identity() {
        let backend = backend(None);
        let wallet = backend.create().await.unwrap();
        let record = wallet.export();
        assert_eq!(record.network_id.as_deref(), Some("base-sepolia"));
        assert!(uuid::Uuid::parse_str(&record.wallet_id).is_ok());

        let imported = backend.import(&record).await.unwrap();
        assert_eq!(imported.wallet_id(), wallet.wallet_id());
        assert_eq!(imported.default_address(), wallet.default_address());
    }

    #[tokio::test]
    async fn import_rejects_bad_seed() {
        let record = WalletRecord::new("w", secrecy::SecretString::from("0xnothex"));
        assert!(matches!(
            backend(None).import(&record).await,
            Err(WalletError::InvalidPrivateKey)
        ));
    }

    #[tokio::test]
    async fn deploy_without_bytecode_is_unsupported() {
        let wallet = backend(None).create().await.unwrap();
        let err = wallet.deploy_token("Test", "TST", 1000).await.unwrap_err();
        assert!(matches!(err, WalletError::Unsupported { .. }));
    }

    #[test]
    fn transfer_beyond_balance_is_insufficient() {
        let request = TransferRequest {
            amount: Decimal::TWO,
            asset_id: "eth".into(),
            destination: "0x0000000000000000000000000000000000000001".into(),
            gasless: false,
        };
        assert!(ensure_covers(&request, Decimal::TWO).is_ok());
        match ensure_covers(&request, Decimal::ONE) {
            Err(WalletError::InsufficientBalance {
                balance, requested, ..
            }) => {
                assert_eq!(balance, Decimal::ONE);
                assert_eq!(requested, Decimal::TWO);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn transfer_to_bad_address_fails_before_rpc() {
        let wallet = backend(None).create().await.unwrap();
        let err = wallet
            .transfer(TransferRequest {
                amount: Decimal::ONE,
                asset_id: "eth".into(),
                destination: "not-an-address".into(),
                gasless: false,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InvalidAddress { .. }));
    }
}
