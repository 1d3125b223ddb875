// Blockchain module
//
// This module contains the ledger core:
// - UTXO primitives (transaction inputs and outputs)
// - Transaction structure and coin selection
// - Block structure and proof of work
// - Blockchain with mempool and block templates
// - Cryptography utilities

pub mod block;
pub mod chain;
pub mod crypto;
pub mod input;
pub mod output;
pub mod template;
pub mod transaction;
pub mod validation;

use std::sync::{Arc, Mutex};

// Re-export main components for easier access
pub use block::Block;
pub use chain::{Blockchain, LedgerParams};
pub use crypto::{Address, Wallet};
pub use input::TransactionInput;
pub use output::TransactionOutput;
pub use template::BlockTemplate;
pub use transaction::{Transaction, TransactionType};
pub use validation::{Validation, ValidationError};

/// The ledger behind a single lock; every caller goes through it one at a time
pub type SharedLedger = Arc<Mutex<Blockchain>>;
