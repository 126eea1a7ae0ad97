//! The four wallet actions every agent carries.
//!
//! `transfer_asset` and `mint_nft` never fail: every error is turned into a
//! message for the model. `get_balance` and `create_token` report failures as
//! tool errors, which the agent loop also hands back as text.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::info;

use crate::error::WalletError;
use crate::tools::tool::{Tool, ToolContext, ToolError, ToolOutput, require_str};
use crate::wallet::{TransferRequest, Wallet};

const ASSET_ID_DOC: &str =
    "Asset identifier (\"eth\", \"usdc\") or contract address of an ERC-20 token";

/// Accept JSON numbers and numeric strings.
fn decimal_param(params: &serde_json::Value, key: &str) -> Result<Decimal, ToolError> {
    let raw = match params.get(key) {
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        _ => return Err(ToolError::InvalidParameters(format!("missing '{}'", key))),
    };
    Decimal::from_str(&raw)
        .or_else(|_| Decimal::from_scientific(&raw))
        .map(|d| d.normalize())
        .map_err(|_| ToolError::InvalidParameters(format!("'{}' is not a number: {}", key, raw)))
}

fn wallet_failure(e: WalletError) -> ToolError {
    ToolError::ExecutionFailed(e.to_string())
}

/// `true` when the transfer qualifies for sponsored gas.
pub fn is_gasless(network_id: &str, asset_id: &str) -> bool {
    network_id == "base-mainnet" && asset_id.eq_ignore_ascii_case("usdc")
}

/// All four wallet actions bound to `wallet`.
pub fn wallet_tools(wallet: Arc<dyn Wallet>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(GetBalanceTool::new(wallet.clone())),
        Arc::new(CreateTokenTool::new(wallet.clone())),
        Arc::new(TransferAssetTool::new(wallet.clone())),
        Arc::new(MintNftTool::new(wallet)),
    ]
}

pub struct GetBalanceTool {
    wallet: Arc<dyn Wallet>,
}

impl GetBalanceTool {
    pub fn new(wallet: Arc<dyn Wallet>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl Tool for GetBalanceTool {
    fn name(&self) -> &str {
        "get_balance"
    }

    fn description(&self) -> &str {
        "Get the balance of a specific asset in the agent's wallet."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "asset_id": { "type": "string", "description": ASSET_ID_DOC }
            },
            "required": ["asset_id"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let asset_id = require_str(&params, "asset_id")?;
        let balance = self
            .wallet
            .balance(asset_id)
            .await
            .map_err(wallet_failure)?;
        Ok(ToolOutput::text(
            format!("Current balance of {}: {}", asset_id, balance),
            start.elapsed(),
        ))
    }

    fn requires_sanitization(&self) -> bool {
        false
    }
}

pub struct CreateTokenTool {
    wallet: Arc<dyn Wallet>,
}

impl CreateTokenTool {
    pub fn new(wallet: Arc<dyn Wallet>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl Tool for CreateTokenTool {
    fn name(&self) -> &str {
        "create_token"
    }

    fn description(&self) -> &str {
        "Create a new ERC-20 token and wait for the deployment to settle."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "description": "The name of the token" },
                "symbol": { "type": "string", "description": "The symbol of the token" },
                "initial_supply": { "type": "integer", "description": "The initial supply of tokens" }
            },
            "required": ["name", "symbol", "initial_supply"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        _ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let name = require_str(&params, "name")?;
        let symbol = require_str(&params, "symbol")?;
        let supply = decimal_param(&params, "initial_supply")?;
        if !supply.fract().is_zero() || supply.is_sign_negative() {
            return Err(ToolError::InvalidParameters(
                "'initial_supply' must be a non-negative integer".into(),
            ));
        }
        let supply_units = u128::from_str(&supply.trunc().to_string()).map_err(|_| {
            ToolError::InvalidParameters(format!("'initial_supply' is out of range: {}", supply))
        })?;

        let receipt = self
            .wallet
            .deploy_token(name, symbol, supply_units)
            .await
            .map_err(wallet_failure)?;
        Ok(ToolOutput::text(
            format!(
                "Token {} ({}) created with initial supply of {} and contract address {}",
                name, symbol, supply, receipt.contract_address
            ),
            start.elapsed(),
        ))
    }

    fn requires_sanitization(&self) -> bool {
        false
    }
}

pub struct TransferAssetTool {
    wallet: Arc<dyn Wallet>,
}

impl TransferAssetTool {
    pub fn new(wallet: Arc<dyn Wallet>) -> Self {
        Self { wallet }
    }

    async fn transfer(
        &self,
        amount: Decimal,
        asset_id: &str,
        destination: &str,
    ) -> Result<String, WalletError> {
        let gasless = is_gasless(self.wallet.network_id(), asset_id);
        let request = TransferRequest {
            amount,
            asset_id: asset_id.to_string(),
            destination: destination.to_string(),
            gasless,
        };

        if asset_id.eq_ignore_ascii_case("eth") || asset_id.eq_ignore_ascii_case("usdc") {
            self.wallet.transfer(request).await?;
            let suffix = if gasless { " (gasless)" } else { "" };
            return Ok(format!(
                "Transferred {} {}{} to {}",
                amount, asset_id, suffix, destination
            ));
        }

        let balance = match self.wallet.balance(asset_id).await {
            Ok(balance) => balance,
            Err(WalletError::UnsupportedAsset { .. }) => {
                return Ok(format!(
                    "Error: The asset {} is not supported on this network. It may have been recently deployed. Please try again in about 30 minutes.",
                    asset_id
                ));
            }
            Err(e) => return Err(e),
        };
        if balance < amount {
            return Ok(format!(
                "Insufficient balance. You have {} {}, but tried to transfer {}.",
                balance, asset_id, amount
            ));
        }

        self.wallet.transfer(request).await?;
        Ok(format!("Transferred {} {} to {}", amount, asset_id, destination))
    }
}

fn transfer_params(params: &serde_json::Value) -> Result<(Decimal, &str, &str), ToolError> {
    Ok((
        decimal_param(params, "amount")?,
        require_str(params, "asset_id")?,
        require_str(params, "destination_address")?,
    ))
}

fn transfer_error_message(e: impl std::fmt::Display) -> String {
    format!(
        "Error transferring asset: {}. If this is a custom token, it may have been recently deployed. Please try again in about 30 minutes, as it needs to be indexed by CDP first.",
        e
    )
}

#[async_trait]
impl Tool for TransferAssetTool {
    fn name(&self) -> &str {
        "transfer_asset"
    }

    fn description(&self) -> &str {
        "Transfer an asset to a specific address and wait for the transfer to settle."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "amount": { "type": "number", "description": "Amount to transfer" },
                "asset_id": { "type": "string", "description": ASSET_ID_DOC },
                "destination_address": { "type": "string", "description": "Recipient's address" }
            },
            "required": ["amount", "asset_id", "destination_address"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let message = match transfer_params(&params) {
            Ok((amount, asset_id, destination)) => {
                info!(
                    target: "audit",
                    wallet_id = %ctx.wallet_id,
                    %amount,
                    asset_id,
                    destination,
                    "transfer_asset"
                );
                self.transfer(amount, asset_id, destination)
                    .await
                    .unwrap_or_else(transfer_error_message)
            }
            Err(e) => transfer_error_message(e),
        };
        Ok(ToolOutput::text(message, start.elapsed()))
    }

    fn requires_sanitization(&self) -> bool {
        false
    }
}

pub struct MintNftTool {
    wallet: Arc<dyn Wallet>,
}

impl MintNftTool {
    pub fn new(wallet: Arc<dyn Wallet>) -> Self {
        Self { wallet }
    }
}

#[async_trait]
impl Tool for MintNftTool {
    fn name(&self) -> &str {
        "mint_nft"
    }

    fn description(&self) -> &str {
        "Mint one NFT from a contract to the given address."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "contract_address": { "type": "string", "description": "Address of the NFT contract" },
                "mint_to": { "type": "string", "description": "Address to mint NFT to" }
            },
            "required": ["contract_address", "mint_to"]
        })
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: &ToolContext,
    ) -> Result<ToolOutput, ToolError> {
        let start = Instant::now();
        let message = match (
            require_str(&params, "contract_address"),
            require_str(&params, "mint_to"),
        ) {
            (Ok(contract), Ok(mint_to)) => {
                info!(target: "audit", wallet_id = %ctx.wallet_id, contract, mint_to, "mint_nft");
                match self.wallet.invoke_mint(contract, mint_to, 1).await {
                    Ok(_) => format!("Successfully minted NFT to {}", mint_to),
                    Err(e) => format!("Error minting NFT: {}", e),
                }
            }
            (Err(e), _) | (_, Err(e)) => format!("Error minting NFT: {}", e),
        };
        Ok(ToolOutput::text(message, start.elapsed()))
    }

    fn requires_sanitization(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::wallet::WalletBackend;
    use crate::wallet::testing::MemoryBackend;

    const DEST: &str = "0x00000000000000000000000000000000000000aa";

    async fn setup(network: &str) -> (Arc<MemoryBackend>, Arc<dyn Wallet>) {
        let backend = Arc::new(MemoryBackend::new(network));
        let wallet = backend.create().await.unwrap();
        (backend, wallet)
    }

    async fn transfer(wallet: &Arc<dyn Wallet>, params: serde_json::Value) -> String {
        TransferAssetTool::new(wallet.clone())
            .execute(params, &ToolContext::default())
            .await
            .unwrap()
            .content
    }

    #[tokio::test]
    async fn balance_message() {
        let (backend, wallet) = setup("base-sepolia").await;
        backend.set_balance("eth", dec!(0.25));
        let out = GetBalanceTool::new(wallet)
            .execute(json!({"asset_id": "eth"}), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(out.content, "Current balance of eth: 0.25");
    }

    #[tokio::test]
    async fn eth_transfer_message() {
        let (backend, wallet) = setup("base-sepolia").await;
        backend.set_balance("eth", dec!(1));
        let msg = transfer(
            &wallet,
            json!({"amount": 0.5, "asset_id": "eth", "destination_address": DEST}),
        )
        .await;
        assert_eq!(msg, format!("Transferred 0.5 eth to {}", DEST));
        assert!(!backend.transfers()[0].gasless);
    }

    #[tokio::test]
    async fn usdc_on_base_mainnet_is_gasless() {
        let (backend, wallet) = setup("base-mainnet").await;
        backend.set_balance("usdc", dec!(10));
        let msg = transfer(
            &wallet,
            json!({"amount": "2", "asset_id": "USDC", "destination_address": DEST}),
        )
        .await;
        assert_eq!(msg, format!("Transferred 2 USDC (gasless) to {}", DEST));
        assert!(backend.transfers()[0].gasless);
    }

    #[tokio::test]
    async fn custom_token_paths() {
        let (backend, wallet) = setup("base-sepolia").await;
        let token = "0x1111111111111111111111111111111111111111";

        let msg = transfer(
            &wallet,
            json!({"amount": 1, "asset_id": token, "destination_address": DEST}),
        )
        .await;
        assert_eq!(
            msg,
            format!(
                "Error: The asset {} is not supported on this network. It may have been recently deployed. Please try again in about 30 minutes.",
                token
            )
        );

        backend.set_balance(token, dec!(3));
        let msg = transfer(
            &wallet,
            json!({"amount": 5, "asset_id": token, "destination_address": DEST}),
        )
        .await;
        assert_eq!(
            msg,
            format!(
                "Insufficient balance. You have 3 {}, but tried to transfer 5.",
                token
            )
        );
        assert!(backend.transfers().is_empty());

        let msg = transfer(
            &wallet,
            json!({"amount": 2, "asset_id": token, "destination_address": DEST}),
        )
        .await;
        assert_eq!(msg, format!("Transferred 2 {} to {}", token, DEST));
    }

    #[tokio::test]
    async fn transfer_failures_become_messages() {
        let (backend, wallet) = setup("base-sepolia").await;
        backend.set_balance("eth", dec!(1));
        backend.fail_next_transfer(WalletError::Rpc("nonce too low".into()));
        let msg = transfer(
            &wallet,
            json!({"amount": 0.1, "asset_id": "eth", "destination_address": DEST}),
        )
        .await;
        assert!(msg.starts_with("Error transferring asset: RPC error: nonce too low."));
        assert!(msg.ends_with("as it needs to be indexed by CDP first."));

        let msg = transfer(&wallet, json!({"asset_id": "eth"})).await;
        assert!(msg.starts_with("Error transferring asset: "));
    }

    #[tokio::test]
    async fn mint_messages() {
        let (backend, wallet) = setup("base-sepolia").await;
        let tool = MintNftTool::new(wallet);
        let ok = tool
            .execute(
                json!({"contract_address": "0xc0ffee", "mint_to": DEST}),
                &ToolContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(ok.content, format!("Successfully minted NFT to {}", DEST));
        assert_eq!(backend.mints(), vec![("0xc0ffee".to_string(), DEST.to_string(), 1)]);

        let bad = tool
            .execute(
                json!({"contract_address": "0xc0ffee", "mint_to": "nobody"}),
                &ToolContext::default(),
            )
            .await
            .unwrap();
        assert_eq!(bad.content, "Error minting NFT: invalid address 'nobody'");
    }

    #[tokio::test]
    async fn create_token_message() {
        let (backend, wallet) = setup("base-sepolia").await;
        let out = CreateTokenTool::new(wallet)
            .execute(
                json!({"name": "Gold", "symbol": "GLD", "initial_supply": 1000}),
                &ToolContext::default(),
            )
            .await
            .unwrap();
        let (_, _, supply) = backend.deployments()[0].clone();
        assert_eq!(supply, 1000);
        assert!(out.content.starts_with(
            "Token Gold (GLD) created with initial supply of 1000 and contract address 0x"
        ));
    }

    #[test]
    fn gasless_rule() {
        assert!(is_gasless("base-mainnet", "UsDc"));
        assert!(!is_gasless("base-sepolia", "usdc"));
        assert!(!is_gasless("base-mainnet", "eth"));
    }
}
