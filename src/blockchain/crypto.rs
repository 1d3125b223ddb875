use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// Hashes the concatenation of `parts` with SHA-256 and returns it as lowercase hex
pub fn content_hash(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// Represents a wallet address (public key in base58 format)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Address(pub String);

impl Address {
    /// Creates a new address from a public key
    pub fn from_public_key(public_key: &VerifyingKey) -> Self {
        Address(bs58::encode(public_key.as_bytes()).into_string())
    }

    /// Converts the address to a public key
    pub fn to_public_key(&self) -> Result<VerifyingKey, CryptoError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let key_bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidPublicKey("Invalid public key bytes".to_string())
        })?;

        VerifyingKey::from_bytes(&key_bytes)
            .map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

/// Represents a digital signature (base58 encoded)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DigitalSignature(pub String);

impl DigitalSignature {
    /// Creates a new digital signature from a signature
    pub fn from_signature(signature: &Signature) -> Self {
        DigitalSignature(bs58::encode(signature.to_bytes()).into_string())
    }

    /// Converts the digital signature to a signature
    pub fn to_signature(&self) -> Result<Signature, CryptoError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let signature_bytes: [u8; 64] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidSignature("Invalid signature length".to_string())
        })?;

        Ok(Signature::from_bytes(&signature_bytes))
    }
}

/// Represents a wallet with a keypair
#[derive(Debug, Clone)]
pub struct Wallet {
    signing_key: SigningKey,
    address: Address,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    pub fn new() -> Self {
        let mut csprng = OsRng;
        Self::from_signing_key(SigningKey::generate(&mut csprng))
    }

    /// Recovers a wallet from a hex encoded secret key
    pub fn from_secret_key_hex(secret_key: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(secret_key.trim())
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;

        Self::from_secret_key(&bytes)
    }

    /// Creates a wallet from an existing secret key
    pub fn from_secret_key(secret_key_bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes_array: [u8; 32] = secret_key_bytes.try_into().map_err(|_| {
            CryptoError::InvalidPrivateKey("Invalid private key length".to_string())
        })?;

        Ok(Self::from_signing_key(SigningKey::from_bytes(&bytes_array)))
    }

    fn from_signing_key(signing_key: SigningKey) -> Self {
        let address = Address::from_public_key(&signing_key.verifying_key());
        Wallet {
            signing_key,
            address,
        }
    }

    /// Gets the wallet's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Signs a hex encoded content hash with the wallet's private key
    pub fn sign_hash(&self, hash: &str) -> Result<DigitalSignature, CryptoError> {
        let message = hex::decode(hash).map_err(|e| CryptoError::InvalidMessage(e.to_string()))?;
        let signature = self.signing_key.sign(&message);
        Ok(DigitalSignature::from_signature(&signature))
    }

    /// Exports the wallet's secret key as hex
    pub fn export_secret_key(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

/// Verifies a signature over a hex encoded content hash, using `address` as the public key
pub fn verify_hash(address: &Address, hash: &str, signature: &DigitalSignature) -> Result<bool, CryptoError> {
    let public_key = address.to_public_key()?;
    let signature = signature.to_signature()?;
    let message = hex::decode(hash).map_err(|e| CryptoError::InvalidMessage(e.to_string()))?;

    Ok(public_key.verify(&message, &signature).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wallet_creation() {
        let wallet = Wallet::new();
        assert!(!wallet.address().is_empty());
    }

    #[test]
    fn test_signing_and_verification() {
        let wallet = Wallet::new();
        let hash = content_hash(&["Hello, world!"]);

        let signature = wallet.sign_hash(&hash).unwrap();
        assert!(verify_hash(wallet.address(), &hash, &signature).unwrap());

        let wrong_hash = content_hash(&["Wrong message"]);
        assert!(!verify_hash(wallet.address(), &wrong_hash, &signature).unwrap());

        let other = Wallet::new();
        assert!(!verify_hash(other.address(), &hash, &signature).unwrap());
    }

    #[test]
    fn test_address_conversion() {
        let wallet = Wallet::new();
        let public_key = wallet.address().to_public_key().unwrap();
        assert_eq!(Address::from_public_key(&public_key), *wallet.address());
    }

    #[test]
    fn test_secret_key_round_trip() {
        let wallet = Wallet::new();
        let recovered = Wallet::from_secret_key_hex(&wallet.export_secret_key()).unwrap();
        assert_eq!(recovered.address(), wallet.address());

        assert!(Wallet::from_secret_key_hex("abcd").is_err());
        assert!(Wallet::from_secret_key_hex("not hex").is_err());
    }

    #[test]
    fn test_content_hash() {
        assert_eq!(content_hash(&["ab", "c"]), content_hash(&["abc"]));
        assert_eq!(content_hash(&["abc"]).len(), 64);
        assert_ne!(content_hash(&["abc"]), content_hash(&["abd"]));
    }
}
