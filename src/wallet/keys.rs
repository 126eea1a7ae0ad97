//! Signing key helpers.
//!
//! A wallet's seed is its hex-encoded secp256k1 signing key. Keys are
//! generated and parsed with alloy's local signer.

use alloy::primitives::{B256, hex};
use alloy::signers::local::PrivateKeySigner;
use secrecy::{ExposeSecret, SecretString};

use crate::error::WalletError;

/// Generate a new random signer.
pub fn generate_signer() -> PrivateKeySigner {
    PrivateKeySigner::random()
}

/// Hex seed (0x-prefixed) for `signer`.
pub fn seed_of(signer: &PrivateKeySigner) -> SecretString {
    SecretString::from(format!(
        "0x{}",
        hex::encode(signer.credential().to_bytes().as_slice())
    ))
}

/// Restore a signer from a hex seed, with or without the `0x` prefix.
pub fn signer_from_seed(seed: &SecretString) -> Result<PrivateKeySigner, WalletError> {
    let raw = seed.expose_secret().trim();
    let key_hex = raw.strip_prefix("0x").unwrap_or(raw);
    let key_bytes = hex::decode(key_hex).map_err(|_| WalletError::InvalidPrivateKey)?;
    if key_bytes.len() != 32 {
        return Err(WalletError::InvalidPrivateKey);
    }
    PrivateKeySigner::from_bytes(&B256::from_slice(&key_bytes))
        .map_err(|e| WalletError::SignerCreation(e.to_string()))
}

/// Checksummed address string for `signer`.
pub fn address_of(signer: &PrivateKeySigner) -> String {
    signer.address().to_checksum(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_restores_same_address() {
        let signer = generate_signer();
        let seed = seed_of(&signer);
        assert!(seed.expose_secret().starts_with("0x"));
        assert_eq!(seed.expose_secret().len(), 66);

        let restored = signer_from_seed(&seed).unwrap();
        assert_eq!(address_of(&restored), address_of(&signer));
        assert_eq!(address_of(&signer).len(), 42);
    }

    #[test]
    fn unprefixed_seed_is_accepted() {
        let signer = generate_signer();
        let seed = seed_of(&signer);
        let bare = SecretString::from(seed.expose_secret().trim_start_matches("0x").to_string());
        assert_eq!(
            signer_from_seed(&bare).unwrap().address(),
            signer.address()
        );
    }

    #[test]
    fn malformed_seed_is_rejected() {
        for bad in ["", "0x1234", "not-hex-at-all", "0xzz"] {
            assert!(
                matches!(
                    signer_from_seed(&SecretString::from(bad)),
                    Err(WalletError::InvalidPrivateKey)
                ),
                "{bad} should be rejected"
            );
        }
    }
}
