use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use std::sync::atomic::{AtomicBool, Ordering};

use super::crypto::{content_hash, Address};
use super::template::BlockTemplate;
use super::transaction::Transaction;
use super::validation::{join_errors, ValidationError};

/// Base reward paid by the fee transaction, on top of `fee_per_tx` for each carried transaction
pub const MINING_REWARD: u64 = 10;

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Block {
    /// Index of the block in the chain
    pub index: u64,

    /// Creation time in milliseconds since the Unix epoch
    pub timestamp: i64,

    /// Hash of the previous block
    pub previous_hash: String,

    /// Hash of the current block (calculated)
    #[serde(default)]
    pub hash: String,

    /// Proof of work
    #[serde(default = "default_nonce")]
    pub nonce: u64,

    /// Address of the wallet that mined the block
    #[serde(default)]
    pub miner: Address,

    /// List of transactions included in this block
    pub transactions: Vec<Transaction>,
}

fn default_nonce() -> u64 {
    1
}

impl Block {
    /// Creates a new, unmined block
    ///
    /// # Arguments
    ///
    /// * `index` - The index of the block in the chain
    /// * `previous_hash` - The hash of the previous block
    /// * `transactions` - The list of transactions to include in the block
    pub fn new(index: u64, previous_hash: impl Into<String>, transactions: Vec<Transaction>) -> Self {
        let mut block = Block {
            index,
            timestamp: Utc::now().timestamp_millis(),
            previous_hash: previous_hash.into(),
            hash: String::new(),
            nonce: default_nonce(),
            miner: Address::default(),
            transactions,
        };
        block.hash = block.generate_hash();
        block
    }

    /// Prepares an unmined candidate from a template.
    ///
    /// When `miner` is given, a fee transaction paying it is appended.
    pub fn from_template(template: &BlockTemplate, miner: Option<&Address>) -> Self {
        let mut transactions = template.transactions.clone();

        if let Some(miner) = miner {
            let reward = MINING_REWARD + template.fee_per_tx * template.transactions.len() as u64;
            transactions.push(Transaction::new_fee(miner.clone(), reward));
        }

        Block::new(template.index, template.previous_hash.clone(), transactions)
    }

    /// Concatenation of every transaction hash, in order
    pub fn compute_transactions_digest(&self) -> String {
        self.transactions.iter().map(|tx| tx.hash.as_str()).collect()
    }

    /// Calculates the hash of the block, leaving the `hash` field out
    pub fn generate_hash(&self) -> String {
        content_hash(&[
            &self.compute_transactions_digest(),
            &self.index.to_string(),
            &self.timestamp.to_string(),
            &self.previous_hash,
            &self.nonce.to_string(),
            self.miner.as_str(),
        ])
    }

    /// `difficulty` zero characters
    pub fn required_prefix(difficulty: u32) -> String {
        "0".repeat(difficulty as usize)
    }

    /// Searches nonces until the hash meets `difficulty`. Never returns on an unreachable difficulty.
    pub fn mine(&mut self, difficulty: u32, miner: &Address) {
        let never = AtomicBool::new(false);
        self.mine_until(difficulty, miner, &never);
    }

    /// Like [`Block::mine`], but gives up once `cancel` is set.
    ///
    /// Returns `true` when a hash meeting `difficulty` was found.
    pub fn mine_until(&mut self, difficulty: u32, miner: &Address, cancel: &AtomicBool) -> bool {
        let prefix = Self::required_prefix(difficulty);

        self.miner = miner.clone();
        self.hash = self.generate_hash();

        while !self.hash.starts_with(&prefix) {
            if cancel.load(Ordering::Relaxed) {
                return false;
            }
            self.nonce = self.nonce.wrapping_add(1);
            self.hash = self.generate_hash();
        }

        true
    }

    pub fn fee_transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|tx| tx.is_fee())
    }

    /// Checks the block against its expected predecessor. The first failing rule wins.
    pub fn is_valid(
        &self,
        previous_index: u64,
        previous_hash: &str,
        difficulty: u32,
    ) -> Result<(), ValidationError> {
        if self.transactions.is_empty() {
            return Err(ValidationError::EmptyTransactions);
        }

        let errors: Vec<ValidationError> = self
            .transactions
            .iter()
            .filter_map(|tx| tx.is_valid().err())
            .collect();
        if !errors.is_empty() {
            return Err(ValidationError::InvalidTransactions(join_errors(&errors)));
        }

        let mut fees = self.fee_transactions();
        let fee = match (fees.next(), fees.next()) {
            (None, _) => return Err(ValidationError::MissingFeeTransaction),
            (Some(_), Some(_)) => return Err(ValidationError::MultipleFeeTransactions),
            (Some(fee), None) => fee,
        };
        if fee.outputs.len() != 1 || fee.outputs[0].to_address != self.miner {
            return Err(ValidationError::FeeMismatch);
        }

        if Some(self.index) != previous_index.checked_add(1) {
            return Err(ValidationError::InvalidIndex);
        }
        if self.timestamp < 1 {
            return Err(ValidationError::InvalidTimestamp);
        }
        if self.previous_hash != previous_hash {
            return Err(ValidationError::InvalidPreviousHash);
        }
        if self.hash.is_empty() {
            return Err(ValidationError::EmptyHash);
        }
        if self.miner.is_empty() {
            return Err(ValidationError::NotMined);
        }
        if self.hash != self.generate_hash() {
            return Err(ValidationError::InvalidHash);
        }
        if !self.hash.starts_with(&Self::required_prefix(difficulty)) {
            return Err(ValidationError::InvalidProofOfWork);
        }

        Ok(())
    }
}
