use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use std::collections::HashSet;

use super::block::{Block, MINING_REWARD};
use super::crypto::Address;
use super::output::TransactionOutput;
use super::template::BlockTemplate;
use super::transaction::Transaction;
use super::validation::ValidationError;

/// Previous hash recorded in the genesis block
pub const GENESIS_PREVIOUS_HASH: &str = "Genesis";

/// Reward address used when no genesis miner is configured
pub const GENESIS_PLACEHOLDER_MINER: &str = "genesis";

/// Tunable rules of the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerParams {
    /// Chain length per difficulty step
    pub difficulty_factor: u64,

    /// Maximum number of mempool transactions offered per block
    pub tx_per_block: usize,

    /// Advertised to miners only; the required difficulty is not clamped by it
    pub max_difficulty: u32,

    pub fee_per_tx: u64,
}

impl Default for LedgerParams {
    fn default() -> Self {
        LedgerParams {
            difficulty_factor: 10,
            tx_per_block: 3,
            max_difficulty: 30,
            fee_per_tx: 1,
        }
    }
}

/// Represents the blockchain
///
/// Not synchronized: hosts serialize access, e.g. through [`super::SharedLedger`].
#[derive(Debug, Clone)]
pub struct Blockchain {
    /// The chain of blocks, genesis first
    blocks: Vec<Block>,

    /// Validated transactions waiting for a block
    mempool: Vec<Transaction>,

    /// Template handed to miners until a block consumes it
    next_block: Option<BlockTemplate>,

    params: LedgerParams,
}

impl Blockchain {
    /// Creates a new blockchain with the reference parameters
    ///
    /// # Arguments
    ///
    /// * `genesis_miner` - Wallet rewarded by the genesis block
    pub fn new(genesis_miner: Option<Address>) -> Self {
        Self::with_params(LedgerParams::default(), genesis_miner)
    }

    /// Creates a new blockchain and mines its genesis block
    pub fn with_params(params: LedgerParams, genesis_miner: Option<Address>) -> Self {
        let mut blockchain = Blockchain {
            blocks: Vec::new(),
            mempool: Vec::new(),
            next_block: None,
            params,
        };

        let miner = genesis_miner.unwrap_or_else(|| Address::from(GENESIS_PLACEHOLDER_MINER));
        blockchain.create_genesis_block(&miner);

        blockchain
    }

    fn create_genesis_block(&mut self, miner: &Address) {
        let fee = Transaction::new_fee(miner.clone(), MINING_REWARD);
        let mut genesis = Block::new(0, GENESIS_PREVIOUS_HASH, vec![fee]);
        genesis.mine(self.difficulty(), miner);

        info!("Created genesis block {} rewarding {}", genesis.hash, miner);
        self.blocks.push(genesis);
    }

    pub fn params(&self) -> &LedgerParams {
        &self.params
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn mempool(&self) -> &[Transaction] {
        &self.mempool
    }

    /// Gets the last block in the chain
    pub fn last_block(&self) -> &Block {
        // blocks[0] is created by the constructor and never removed
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn next_index(&self) -> u64 {
        self.last_block().index + 1
    }

    /// Difficulty required for the next block
    pub fn difficulty(&self) -> u32 {
        self.difficulty_for_length(self.blocks.len())
    }

    /// Difficulty required from a block appended to a chain of `length` blocks
    pub fn difficulty_for_length(&self, length: usize) -> u32 {
        let factor = self.params.difficulty_factor.max(1);
        let length = length as u64;
        if length < factor {
            1
        } else {
            length.div_ceil(factor) as u32
        }
    }

    /// Returns the outstanding block template, issuing one if none is cached.
    ///
    /// A template is only cached when it carries transactions, so every miner
    /// polling for work gets the same unit until a block consumes it.
    pub fn next_block(&mut self) -> BlockTemplate {
        if let Some(template) = &self.next_block {
            return template.clone();
        }

        let transactions: Vec<Transaction> = self
            .mempool
            .iter()
            .take(self.params.tx_per_block)
            .cloned()
            .collect();

        let template = BlockTemplate {
            index: self.next_index(),
            previous_hash: self.last_block().hash.clone(),
            difficulty: self.difficulty(),
            max_difficulty: self.params.max_difficulty,
            fee_per_tx: self.params.fee_per_tx,
            transactions,
        };

        if !template.transactions.is_empty() {
            debug!(
                "Issued template for block {} with {} transaction(s)",
                template.index,
                template.transactions.len()
            );
            self.next_block = Some(template.clone());
        }

        template
    }

    /// Validates a mined block against the tip and the outstanding template, then appends it
    ///
    /// # Returns
    ///
    /// The hash of the accepted block
    pub fn add_block(&mut self, block: Block) -> Result<String, ValidationError> {
        let result = self.try_add_block(block);
        if let Err(err) = &result {
            warn!("Rejected block: {}", err);
        }
        result
    }

    fn try_add_block(&mut self, block: Block) -> Result<String, ValidationError> {
        let template = self
            .next_block
            .as_ref()
            .ok_or(ValidationError::NoOutstandingTemplate)?;

        let last = self.last_block();
        block.is_valid(last.index, &last.hash, self.difficulty())?;

        let sent: HashSet<&str> = template
            .transactions
            .iter()
            .filter(|tx| !tx.is_fee())
            .map(|tx| tx.hash.as_str())
            .collect();
        let mut received: HashSet<&str> = HashSet::new();
        for tx in block.transactions.iter().filter(|tx| !tx.is_fee()) {
            if !received.insert(tx.hash.as_str()) {
                return Err(ValidationError::DuplicateTransaction(tx.hash.clone()));
            }
        }

        if sent.iter().any(|hash| !received.contains(hash)) {
            return Err(ValidationError::MissingTransactions);
        }
        if let Some(unknown) = block
            .transactions
            .iter()
            .filter(|tx| !tx.is_fee())
            .find(|tx| !sent.contains(tx.hash.as_str()))
        {
            return Err(ValidationError::UnknownTransaction(unknown.hash.clone()));
        }

        let received: HashSet<String> = received.into_iter().map(str::to_string).collect();
        self.mempool.retain(|tx| !received.contains(&tx.hash));
        self.next_block = None;

        let hash = block.hash.clone();
        info!(
            "Accepted block {} ({}) mined by {} with {} transaction(s)",
            block.index,
            hash,
            block.miner,
            block.transactions.len()
        );
        self.blocks.push(block);

        Ok(hash)
    }

    /// Validates a transaction and queues it in the mempool
    ///
    /// # Returns
    ///
    /// The hash of the queued transaction
    pub fn add_transaction(&mut self, transaction: Transaction) -> Result<String, ValidationError> {
        let result = self.try_add_transaction(transaction);
        if let Err(err) = &result {
            warn!("Rejected transaction: {}", err);
        }
        result
    }

    fn try_add_transaction(&mut self, transaction: Transaction) -> Result<String, ValidationError> {
        let known = self
            .blocks
            .iter()
            .flat_map(|block| block.transactions.iter())
            .chain(self.mempool.iter())
            .any(|tx| tx.hash == transaction.hash);
        if known {
            return Err(ValidationError::TransactionExists(transaction.hash));
        }

        let senders: HashSet<&Address> = transaction
            .inputs
            .iter()
            .map(|input| &input.from_address)
            .collect();
        let pending = self
            .mempool
            .iter()
            .flat_map(|tx| tx.inputs.iter())
            .any(|input| senders.contains(&input.from_address));
        if pending {
            return Err(ValidationError::PendingTransactionExists);
        }

        if transaction.is_fee() {
            return Err(ValidationError::UnexpectedFeeTransaction);
        }

        transaction.is_valid()?;

        let hash = transaction.hash.clone();
        debug!(
            "Queued transaction {} ({} in, {} out)",
            hash,
            transaction.input_amount(),
            transaction.output_amount()
        );
        self.mempool.push(transaction);

        Ok(hash)
    }

    /// Finds a block by its hash
    pub fn get_block(&self, hash: &str) -> Option<&Block> {
        self.blocks.iter().find(|block| block.hash == hash)
    }

    pub fn get_block_by_index(&self, index: u64) -> Option<&Block> {
        self.blocks.iter().find(|block| block.index == index)
    }

    /// Outputs addressed to `wallet` whose owning transaction it has not spent from
    pub fn get_utxo(&self, wallet: &Address) -> Vec<TransactionOutput> {
        let transactions = self.blocks.iter().flat_map(|block| block.transactions.iter());

        let spent: HashSet<&str> = transactions
            .clone()
            .flat_map(|tx| tx.inputs.iter())
            .filter(|input| input.from_address == *wallet)
            .map(|input| input.prev_tx_hash.as_str())
            .collect();

        transactions
            .flat_map(|tx| tx.outputs.iter())
            .filter(|output| output.to_address == *wallet)
            .filter(|output| !spent.contains(output.owner_tx_hash.as_str()))
            .cloned()
            .collect()
    }

    pub fn get_balance(&self, wallet: &Address) -> u64 {
        self.get_utxo(wallet).iter().map(|utxo| utxo.amount).sum()
    }

    /// Validates every block against its predecessor, walking back from the tip
    pub fn is_valid(&self) -> Result<(), ValidationError> {
        for i in (1..self.blocks.len()).rev() {
            let current = &self.blocks[i];
            let previous = &self.blocks[i - 1];

            current
                .is_valid(previous.index, &previous.hash, self.difficulty_for_length(i))
                .map_err(|reason| ValidationError::InvalidBlock {
                    index: current.index,
                    reason: Box::new(reason),
                })?;
        }

        Ok(())
    }
}
