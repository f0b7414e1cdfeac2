use crate::error::{ClaimError, ClaimResult};

use ethers::core::k256::elliptic_curve::sec1::ToEncodedPoint;
use ethers::core::k256::PublicKey;
use ethers::types::Address;
use sha3::{Digest, Keccak256};

/// Ethereum address of a secp256k1 public key (compressed or uncompressed hex)
pub fn public_key_to_address(public_key: &str) -> ClaimResult<Address> {
    let trimmed = public_key.trim();
    if trimmed.is_empty() {
        return Err(ClaimError::MissingSigningKey);
    }

    let raw = hex::decode(trimmed.strip_prefix("0x").unwrap_or(trimmed))
        .map_err(|e| ClaimError::Encoding(format!("Public key is not hex: {}", e)))?;

    let key = PublicKey::from_sec1_bytes(&raw)
        .map_err(|_| ClaimError::Encoding("Public key is not a secp256k1 point".to_string()))?;

    let point = key.to_encoded_point(false);
    let hash = Keccak256::digest(&point.as_bytes()[1..]);
    Ok(Address::from_slice(&hash[12..]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::signers::{LocalWallet, Signer};

    const ANVIL_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_address_matches_wallet() {
        let wallet: LocalWallet = ANVIL_KEY.parse().unwrap();
        let point = wallet.signer().verifying_key().to_encoded_point(false);
        let public_key = format!("0x{}", hex::encode(point.as_bytes()));

        assert_eq!(public_key_to_address(&public_key).unwrap(), wallet.address());
    }

    #[test]
    fn test_compressed_key_gives_same_address() {
        let wallet: LocalWallet = ANVIL_KEY.parse().unwrap();
        let point = wallet.signer().verifying_key().to_encoded_point(true);

        assert_eq!(
            public_key_to_address(&hex::encode(point.as_bytes())).unwrap(),
            wallet.address()
        );
    }

    #[test]
    fn test_empty_key_is_missing() {
        assert!(matches!(
            public_key_to_address(""),
            Err(ClaimError::MissingSigningKey)
        ));
    }

    #[test]
    fn test_garbage_key_rejected() {
        assert!(matches!(
            public_key_to_address("0x04zz"),
            Err(ClaimError::Encoding(_))
        ));
        assert!(matches!(
            public_key_to_address("0x0401"),
            Err(ClaimError::Encoding(_))
        ));
    }
}
