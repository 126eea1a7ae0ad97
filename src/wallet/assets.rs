//! Asset ids and unit conversion.

use std::str::FromStr;

use alloy::primitives::{Address, U256};
use rust_decimal::{Decimal, MathematicalOps};

use crate::error::WalletError;

pub const ETH_DECIMALS: u8 = 18;
pub const USDC_DECIMALS: u8 = 6;

/// Largest scale `Decimal` can represent.
const MAX_DECIMALS: u8 = 28;

/// USDC contract for a network, when one is known.
pub fn usdc_contract(network_id: &str) -> Option<Address> {
    let raw = match network_id {
        "base-mainnet" => "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
        "base-sepolia" => "0x036CbD53842c5426634e7929541eC2318f3dCF7e",
        "ethereum-mainnet" => "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48",
        "ethereum-sepolia" => "0x1c7D4B196Cb0C7B01d743Fbc6116a902379C7238",
        _ => return None,
    };
    Address::from_str(raw).ok()
}

/// An asset the wallet can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Asset {
    /// The chain's native currency.
    Native,
    /// An ERC-20 token; `decimals` is `None` until read from the contract.
    Erc20 {
        contract: Address,
        decimals: Option<u8>,
    },
}

impl Asset {
    /// Resolve an asset id (`eth`, `usdc`, or a contract address).
    pub fn resolve(asset_id: &str, network_id: &str) -> Result<Self, WalletError> {
        let id = asset_id.trim();
        match id.to_lowercase().as_str() {
            "eth" => return Ok(Self::Native),
            "usdc" => {
                return usdc_contract(network_id)
                    .map(|contract| Self::Erc20 {
                        contract,
                        decimals: Some(USDC_DECIMALS),
                    })
                    .ok_or_else(|| unsupported(asset_id, network_id));
            }
            _ => {}
        }

        if id.starts_with("0x") {
            if let Ok(contract) = Address::from_str(id) {
                return Ok(Self::Erc20 {
                    contract,
                    decimals: None,
                });
            }
        }
        Err(unsupported(asset_id, network_id))
    }
}

fn unsupported(asset_id: &str, network_id: &str) -> WalletError {
    WalletError::UnsupportedAsset {
        asset_id: asset_id.to_string(),
        network_id: network_id.to_string(),
    }
}

fn scale_factor(decimals: u8) -> Result<Decimal, WalletError> {
    if decimals > MAX_DECIMALS {
        return Err(WalletError::InvalidAmount {
            reason: format!("{} decimals exceeds the supported precision", decimals),
        });
    }
    Decimal::TEN
        .checked_powi(i64::from(decimals))
        .ok_or_else(|| WalletError::InvalidAmount {
            reason: format!("10^{} overflows", decimals),
        })
}

/// Convert a whole-unit amount into base units.
pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<U256, WalletError> {
    if amount.is_sign_negative() || amount.is_zero() {
        return Err(WalletError::InvalidAmount {
            reason: format!("amount must be positive, got {}", amount),
        });
    }
    let scaled = amount
        .checked_mul(scale_factor(decimals)?)
        .ok_or_else(|| WalletError::InvalidAmount {
            reason: format!("{} is too large", amount),
        })?;
    if !scaled.fract().is_zero() {
        return Err(WalletError::InvalidAmount {
            reason: format!("{} has more than {} decimal places", amount, decimals),
        });
    }
    U256::from_str_radix(&scaled.trunc().normalize().to_string(), 10).map_err(|e| {
        WalletError::InvalidAmount {
            reason: e.to_string(),
        }
    })
}

/// Convert base units into a whole-unit amount.
///
/// The split into whole and fractional parts happens in `U256`, so any
/// balance whose whole part fits a `Decimal` converts. Fractions beyond 28
/// places are truncated. A whole part past `Decimal::MAX` saturates.
pub fn from_base_units(raw: U256, decimals: u8) -> Result<Decimal, WalletError> {
    let unit = U256::from(10u8)
        .checked_pow(U256::from(decimals))
        .ok_or_else(|| WalletError::InvalidAmount {
            reason: format!("{} decimals exceeds the 256-bit range", decimals),
        })?;
    let (whole, fraction) = raw.div_rem(unit);

    let Ok(whole) = Decimal::from_str(&whole.to_string()) else {
        tracing::warn!(raw = %raw, decimals, "Balance exceeds the decimal range; reporting the maximum");
        return Ok(Decimal::MAX);
    };

    let scale = decimals.min(MAX_DECIMALS);
    let dropped = U256::from(10u8).pow(U256::from(decimals - scale));
    let fraction = i128::try_from(fraction / dropped).map_err(|e| WalletError::InvalidAmount {
        reason: e.to_string(),
    })?;
    let fraction = Decimal::from_i128_with_scale(fraction, u32::from(scale));

    Ok(whole
        .checked_add(fraction)
        .unwrap_or(whole)
        .normalize())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn resolve_known_assets() {
        assert_eq!(Asset::resolve("ETH", "base-sepolia").unwrap(), Asset::Native);
        match Asset::resolve("usdc", "base-mainnet").unwrap() {
            Asset::Erc20 { contract, decimals } => {
                assert_eq!(decimals, Some(6));
                assert_eq!(contract, usdc_contract("base-mainnet").unwrap());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn resolve_contract_address() {
        let asset =
            Asset::resolve("0x036CbD53842c5426634e7929541eC2318f3dCF7e", "base-sepolia").unwrap();
        assert!(matches!(asset, Asset::Erc20 { decimals: None, .. }));
    }

    #[test]
    fn resolve_unknown_asset_is_unsupported() {
        assert!(matches!(
            Asset::resolve("doge", "base-sepolia"),
            Err(WalletError::UnsupportedAsset { .. })
        ));
        assert!(matches!(
            Asset::resolve("usdc", "moonbase"),
            Err(WalletError::UnsupportedAsset { .. })
        ));
    }

    #[test]
    fn base_unit_conversion() {
        assert_eq!(to_base_units(dec!(1.5), 6).unwrap(), U256::from(1_500_000u64));
        assert_eq!(
            to_base_units(dec!(0.001), 18).unwrap(),
            U256::from(1_000_000_000_000_000u64)
        );
        assert_eq!(from_base_units(U256::from(2_500_000u64), 6).unwrap(), dec!(2.5));
        assert_eq!(from_base_units(U256::ZERO, 18).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn large_balances_convert() {
        let raw = U256::from(10u8).pow(U256::from(33u8));
        assert_eq!(
            from_base_units(raw, 18).unwrap(),
            Decimal::from(1_000_000_000_000_000u64)
        );

        let raw = raw + U256::from(5u8) * U256::from(10u8).pow(U256::from(17u8));
        assert_eq!(from_base_units(raw, 18).unwrap(), dec!(1000000000000000.5));

        assert_eq!(from_base_units(U256::MAX, 0).unwrap(), Decimal::MAX);
    }

    #[test]
    fn oversized_decimals_are_rejected() {
        assert!(from_base_units(U256::from(1u8), 80).is_err());
    }

    #[test]
    fn fractions_beyond_decimal_precision_truncate() {
        // 1.5 with 36 decimals
        let raw = U256::from(15u8) * U256::from(10u8).pow(U256::from(35u8));
        assert_eq!(from_base_units(raw, 36).unwrap(), dec!(1.5));
        assert_eq!(from_base_units(U256::from(1u8), 36).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn rejects_bad_amounts() {
        assert!(to_base_units(dec!(-1), 18).is_err());
        assert!(to_base_units(Decimal::ZERO, 18).is_err());
        assert!(to_base_units(dec!(0.0000001), 6).is_err());
    }
}
