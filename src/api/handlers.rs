use actix_web::{web, HttpResponse};
use log::error;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use std::sync::{Mutex, MutexGuard};

use crate::blockchain::{
    Address, Block, BlockTemplate, Blockchain, Transaction, TransactionOutput, Validation, Wallet,
};

/// Shared ledger state; the mutex serializes every call into the ledger
pub type LedgerData = web::Data<Mutex<Blockchain>>;

fn lock(ledger: &LedgerData) -> Result<MutexGuard<'_, Blockchain>, HttpResponse> {
    ledger.lock().map_err(|_| {
        error!("Ledger lock poisoned");
        HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "Ledger unavailable"
        }))
    })
}

macro_rules! locked {
    ($ledger:expr) => {
        match lock(&$ledger) {
            Ok(guard) => guard,
            Err(response) => return response,
        }
    };
}

/// Response for the status endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    /// The length of the chain
    pub num_of_blocks: usize,

    /// Validation of the whole chain
    pub is_valid: Validation,

    /// The tip of the chain
    pub last_block: Block,
}

/// Response for the wallet endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BalanceResponse {
    pub balance: u64,

    /// Fee charged per transaction
    pub fee: u64,

    /// Unspent outputs of the wallet
    pub utxo: Vec<TransactionOutput>,
}

/// Response for the create wallet endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct WalletResponse {
    /// The wallet's address
    pub address: String,

    /// The wallet's private key (hex encoded)
    pub private_key: String,
}

fn validation_response(result: Validation) -> HttpResponse {
    if result.success {
        HttpResponse::Created().json(result)
    } else {
        HttpResponse::UnprocessableEntity().json(result)
    }
}

/// Get the ledger status
///
/// Returns the chain length, its validity and the last block
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Status retrieved successfully", body = StatusResponse)
    )
)]
pub async fn get_status(ledger: LedgerData) -> HttpResponse {
    let chain = locked!(ledger);

    HttpResponse::Ok().json(StatusResponse {
        num_of_blocks: chain.blocks().len(),
        is_valid: chain.is_valid().into(),
        last_block: chain.last_block().clone(),
    })
}

/// Get the next block template
///
/// Returns the work unit miners must build the next block from
#[utoipa::path(
    get,
    path = "/blocks/next",
    responses(
        (status = 200, description = "Block template", body = BlockTemplate)
    )
)]
pub async fn get_next_block(ledger: LedgerData) -> HttpResponse {
    let mut chain = locked!(ledger);
    HttpResponse::Ok().json(chain.next_block())
}

/// Get a block
///
/// Looks a block up by hash, or by index when the path is numeric
#[utoipa::path(
    get,
    path = "/blocks/{hash_or_index}",
    responses(
        (status = 200, description = "Block found", body = Block),
        (status = 404, description = "Block not found")
    )
)]
pub async fn get_block(ledger: LedgerData, hash_or_index: web::Path<String>) -> HttpResponse {
    let key = hash_or_index.into_inner();
    let chain = locked!(ledger);

    let block = match key.parse::<u64>() {
        Ok(index) => chain.get_block_by_index(index),
        Err(_) => chain.get_block(&key),
    };

    match block {
        Some(block) => HttpResponse::Ok().json(block),
        None => HttpResponse::NotFound().finish(),
    }
}

/// Submit a mined block
///
/// Validates the block against the chain tip and the outstanding template
#[utoipa::path(
    post,
    path = "/blocks",
    request_body = Block,
    responses(
        (status = 201, description = "Block accepted", body = Validation),
        (status = 422, description = "Block rejected", body = Validation)
    )
)]
pub async fn add_block(ledger: LedgerData, block: web::Json<Block>) -> HttpResponse {
    let result = locked!(ledger).add_block(block.into_inner());
    validation_response(result.into())
}

/// Get pending transactions
///
/// Returns the mempool contents
#[utoipa::path(
    get,
    path = "/transactions",
    responses(
        (status = 200, description = "Pending transactions", body = Vec<Transaction>)
    )
)]
pub async fn get_transactions(ledger: LedgerData) -> HttpResponse {
    let chain = locked!(ledger);
    HttpResponse::Ok().json(chain.mempool())
}

/// Submit a transaction
///
/// Validates a signed transaction and queues it for the next block
#[utoipa::path(
    post,
    path = "/transactions",
    request_body = Transaction,
    responses(
        (status = 201, description = "Transaction queued", body = Validation),
        (status = 422, description = "Transaction rejected", body = Validation)
    )
)]
pub async fn add_transaction(ledger: LedgerData, transaction: web::Json<Transaction>) -> HttpResponse {
    let result = locked!(ledger).add_transaction(transaction.into_inner());
    validation_response(result.into())
}

/// Get wallet balance
///
/// Returns the balance and unspent outputs of a wallet
#[utoipa::path(
    get,
    path = "/wallets/{address}",
    responses(
        (status = 200, description = "Wallet balance", body = BalanceResponse)
    )
)]
pub async fn get_wallet(ledger: LedgerData, address: web::Path<String>) -> HttpResponse {
    let address = Address(address.into_inner());
    let chain = locked!(ledger);

    let utxo = chain.get_utxo(&address);
    HttpResponse::Ok().json(BalanceResponse {
        balance: utxo.iter().map(|o| o.amount).sum(),
        fee: chain.params().fee_per_tx,
        utxo,
    })
}

/// Create a new wallet
///
/// Creates a new wallet with a random keypair
///
/// The private key must be stored by your own
#[utoipa::path(
    post,
    path = "/wallets",
    responses(
        (status = 201, description = "Wallet created successfully", body = WalletResponse)
    )
)]
pub async fn create_wallet() -> HttpResponse {
    let wallet = Wallet::new();

    HttpResponse::Created().json(WalletResponse {
        address: wallet.address().to_string(),
        private_key: wallet.export_secret_key(),
    })
}
