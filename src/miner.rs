//! Background miner polling the ledger for block templates

use anyhow::{anyhow, Result};
use log::{debug, info, warn};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, MutexGuard};
use std::time::Duration;

use crate::blockchain::{Block, Blockchain, SharedLedger, ValidationError, Wallet};

/// Result of one mining round
#[derive(Debug, PartialEq, Eq)]
pub enum MiningOutcome {
    /// The template had no transactions
    Idle,
    Cancelled,
    Accepted(String),
    Rejected(ValidationError),
}

/// Mines outside the ledger lock: the lock is only held to fetch a template and to submit a block
pub struct Miner {
    ledger: SharedLedger,
    wallet: Wallet,
    poll_interval: Duration,
    cancel: Arc<AtomicBool>,
}

impl Miner {
    pub fn new(ledger: SharedLedger, wallet: Wallet, poll_interval: Duration) -> Self {
        Miner {
            ledger,
            wallet,
            poll_interval,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// Flag that stops the miner, including a nonce search in progress
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Blockchain>> {
        self.ledger.lock().map_err(|_| anyhow!("Ledger lock poisoned"))
    }

    /// Fetches a template, mines it and submits the block
    pub fn mine_once(&self) -> Result<MiningOutcome> {
        if self.cancel.load(Ordering::Relaxed) {
            return Ok(MiningOutcome::Cancelled);
        }

        let template = self.lock()?.next_block();
        if template.transactions.is_empty() {
            return Ok(MiningOutcome::Idle);
        }

        let address = self.wallet.address();
        let mut block = Block::from_template(&template, Some(address));
        info!(
            "Mining block #{} at difficulty {}...",
            block.index, template.difficulty
        );

        if !block.mine_until(template.difficulty, address, &self.cancel) {
            return Ok(MiningOutcome::Cancelled);
        }
        debug!("Block {} mined with nonce {}", block.hash, block.nonce);

        let outcome = match self.lock()?.add_block(block) {
            Ok(hash) => MiningOutcome::Accepted(hash),
            Err(err) => MiningOutcome::Rejected(err),
        };
        Ok(outcome)
    }

    /// Mines until cancelled. Rejected blocks are dropped and a fresh template is requested.
    pub fn run(self) -> Result<()> {
        info!("Miner started for wallet {}", self.wallet().address());
        let mut mined = 0u64;

        loop {
            match self.mine_once()? {
                MiningOutcome::Cancelled => break,
                MiningOutcome::Idle => std::thread::sleep(self.poll_interval),
                MiningOutcome::Accepted(hash) => {
                    mined += 1;
                    info!("Block {} accepted, {} mined so far", hash, mined);
                }
                MiningOutcome::Rejected(err) => {
                    warn!("Block rejected: {}", err);
                    std::thread::sleep(self.poll_interval);
                }
            }
        }

        info!("Miner stopped after {} block(s)", mined);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::{Address, Transaction};

    use std::sync::Mutex;

    fn ledger_with_pending_transfer() -> (SharedLedger, Wallet) {
        let alice = Wallet::new();
        let mut chain = Blockchain::new(Some(alice.address().clone()));

        let utxo = chain.get_utxo(alice.address());
        let mut tx = Transaction::build_from_utxo(&utxo, alice.address(), &Address::from("bob"), 3).unwrap();
        tx.sign_all_inputs(&alice).unwrap();
        chain.add_transaction(tx).unwrap();

        (Arc::new(Mutex::new(chain)), alice)
    }

    #[test]
    fn test_mine_once_accepts_block() {
        let (ledger, _) = ledger_with_pending_transfer();
        let miner = Miner::new(ledger.clone(), Wallet::new(), Duration::from_millis(1));

        let outcome = miner.mine_once().unwrap();
        assert!(matches!(outcome, MiningOutcome::Accepted(_)));

        let chain = ledger.lock().unwrap();
        assert_eq!(chain.blocks().len(), 2);
        assert!(chain.mempool().is_empty());
        assert!(chain.get_balance(miner.wallet().address()) > 0);
    }

    #[test]
    fn test_mine_once_idle_without_transactions() {
        let ledger = Arc::new(Mutex::new(Blockchain::new(None)));
        let miner = Miner::new(ledger.clone(), Wallet::new(), Duration::from_millis(1));

        assert_eq!(miner.mine_once().unwrap(), MiningOutcome::Idle);
        assert_eq!(ledger.lock().unwrap().blocks().len(), 1);
    }

    #[test]
    fn test_cancelled_miner_stops() {
        let (ledger, _) = ledger_with_pending_transfer();
        let miner = Miner::new(ledger.clone(), Wallet::new(), Duration::from_millis(1));
        miner.cancel_handle().store(true, Ordering::Relaxed);

        assert_eq!(miner.mine_once().unwrap(), MiningOutcome::Cancelled);
        assert!(miner.run().is_ok());
        assert_eq!(ledger.lock().unwrap().blocks().len(), 1);
    }

    #[test]
    fn test_competing_miner_rejected() {
        let (ledger, _) = ledger_with_pending_transfer();
        let template = ledger.lock().unwrap().next_block();

        let miner = Miner::new(ledger.clone(), Wallet::new(), Duration::from_millis(1));
        assert!(matches!(miner.mine_once().unwrap(), MiningOutcome::Accepted(_)));

        let rival = Wallet::new();
        let mut late = Block::from_template(&template, Some(rival.address()));
        late.mine(template.difficulty, rival.address());
        assert_eq!(
            ledger.lock().unwrap().add_block(late),
            Err(ValidationError::NoOutstandingTemplate)
        );
    }
}
