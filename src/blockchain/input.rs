use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::crypto::{content_hash, verify_hash, Address, CryptoError, DigitalSignature, Wallet};
use super::validation::ValidationError;

/// A claim against an output of a previous transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransactionInput {
    /// Wallet spending the output; doubles as the public key checking the signature
    pub from_address: Address,

    pub amount: u64,

    /// Hash of the transaction that owns the spent output
    pub prev_tx_hash: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<DigitalSignature>,

    #[serde(default)]
    pub hash: String,
}

impl TransactionInput {
    /// Creates an unsigned input
    pub fn new(from_address: Address, amount: u64, prev_tx_hash: impl Into<String>) -> Self {
        let mut input = TransactionInput {
            from_address,
            amount,
            prev_tx_hash: prev_tx_hash.into(),
            signature: None,
            hash: String::new(),
        };
        input.hash = input.compute_hash().unwrap_or_default();
        input
    }

    /// `None` while any hashed field is missing
    pub fn compute_hash(&self) -> Option<String> {
        if self.from_address.is_empty() || self.amount == 0 || self.prev_tx_hash.is_empty() {
            return None;
        }
        Some(content_hash(&[
            self.from_address.as_str(),
            &self.amount.to_string(),
            &self.prev_tx_hash,
        ]))
    }

    /// Signs the content hash; an input with missing fields cannot be signed
    pub fn sign(&mut self, wallet: &Wallet) -> Result<(), CryptoError> {
        let hash = self
            .compute_hash()
            .ok_or_else(|| CryptoError::InvalidMessage("input has missing fields".to_string()))?;
        self.signature = Some(wallet.sign_hash(&hash)?);
        self.hash = hash;
        Ok(())
    }

    pub fn is_valid(&self) -> Result<(), ValidationError> {
        if self.from_address.is_empty() {
            return Err(ValidationError::MissingFromAddress);
        }
        if self.amount < 1 {
            return Err(ValidationError::NonPositiveAmount);
        }
        if self.prev_tx_hash.is_empty() {
            return Err(ValidationError::MissingPrevTxHash);
        }
        let hash = self.compute_hash().ok_or(ValidationError::UnsignableHash)?;
        if self.hash != hash {
            return Err(ValidationError::InvalidHash);
        }
        let signature = self
            .signature
            .as_ref()
            .ok_or(ValidationError::MissingSignature)?;

        match verify_hash(&self.from_address, &hash, signature) {
            Ok(true) => Ok(()),
            _ => Err(ValidationError::InvalidSignature),
        }
    }
}
