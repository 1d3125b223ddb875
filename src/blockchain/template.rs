use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::transaction::Transaction;

/// Work unit handed to miners describing the next block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BlockTemplate {
    pub index: u64,
    pub previous_hash: String,
    pub difficulty: u32,
    pub max_difficulty: u32,
    pub fee_per_tx: u64,
    /// Mempool transactions the block must carry, besides its fee transaction
    pub transactions: Vec<Transaction>,
}
