use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::crypto::{content_hash, Address};
use super::validation::ValidationError;

/// An amount sent to an address, owned by the transaction that created it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransactionOutput {
    /// Destination wallet
    pub to_address: Address,

    pub amount: u64,

    /// Hash of the transaction that created this output
    #[serde(default)]
    pub owner_tx_hash: String,

    /// Content hash over `to_address` and `amount`
    #[serde(default)]
    pub hash: String,
}

impl TransactionOutput {
    /// Creates an output that is not yet attached to a transaction
    pub fn new(to_address: Address, amount: u64) -> Self {
        let mut output = TransactionOutput {
            to_address,
            amount,
            owner_tx_hash: String::new(),
            hash: String::new(),
        };
        output.hash = output.compute_hash();
        output
    }

    /// The owner reference is left out so an output can be hashed before its transaction
    pub fn compute_hash(&self) -> String {
        content_hash(&[self.to_address.as_str(), &self.amount.to_string()])
    }

    pub fn is_valid(&self) -> Result<(), ValidationError> {
        if self.amount < 1 {
            return Err(ValidationError::InvalidAmount);
        }
        if self.hash != self.compute_hash() {
            return Err(ValidationError::InvalidHash);
        }
        Ok(())
    }
}
