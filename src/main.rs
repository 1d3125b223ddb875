use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::{Context, Result};
use log::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod api;
mod blockchain;
mod config;
mod miner;

use blockchain::{Blockchain, SharedLedger, Wallet};
use config::NodeConfig;
use miner::Miner;

// Wallet of the in-process miner, when enabled
fn miner_wallet(config: &NodeConfig) -> Result<Option<Wallet>> {
    if !config.miner.enabled {
        return Ok(None);
    }

    let wallet = match &config.miner.secret_key {
        Some(secret_key) => Wallet::from_secret_key_hex(secret_key).context("Invalid miner secret key")?,
        None => {
            let wallet = Wallet::new();
            warn!("No miner secret key configured, generated a new wallet");
            info!("Miner wallet private key: {}", wallet.export_secret_key());
            wallet
        }
    };

    Ok(Some(wallet))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_status,
        api::handlers::get_next_block,
        api::handlers::get_block,
        api::handlers::add_block,
        api::handlers::get_transactions,
        api::handlers::add_transaction,
        api::handlers::get_wallet,
        api::handlers::create_wallet
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::BlockTemplate,
            blockchain::Transaction,
            blockchain::TransactionType,
            blockchain::TransactionInput,
            blockchain::TransactionOutput,
            blockchain::Validation,
            blockchain::crypto::Address,
            blockchain::crypto::DigitalSignature,
            api::handlers::StatusResponse,
            api::handlers::BalanceResponse,
            api::handlers::WalletResponse
        )
    ),
    tags(
        (name = "ledger", description = "Ledger API endpoints")
    ),
    info(
        title = "UTXO Ledger API",
        version = "0.1.0",
        description = "A single-node proof-of-work UTXO ledger",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = NodeConfig::load()?;
    let miner_wallet = miner_wallet(&config)?;

    let genesis_miner = config
        .ledger
        .genesis_miner
        .clone()
        .or_else(|| miner_wallet.as_ref().map(|wallet| wallet.address().clone()));

    let ledger: SharedLedger = Arc::new(Mutex::new(Blockchain::with_params(
        config.ledger.params.clone(),
        genesis_miner,
    )));

    let miner = miner_wallet.map(|wallet| {
        let miner = Miner::new(
            ledger.clone(),
            wallet,
            Duration::from_millis(config.miner.poll_interval_ms),
        );
        let cancel = miner.cancel_handle();
        let handle = tokio::task::spawn_blocking(move || miner.run());
        (cancel, handle)
    });

    let data = web::Data::from(ledger);
    let (host, port) = (config.server.host.clone(), config.server.port);
    info!("Starting HTTP server at http://{}:{}", host, port);

    // Start HTTP server
    let served = HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(data.clone())
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi())
            )
    })
    .bind((host.as_str(), port))
    .with_context(|| format!("Failed to bind {}:{}", host, port))?
    .run()
    .await;

    if let Some((cancel, handle)) = miner {
        cancel.store(true, Ordering::Relaxed);
        handle.await.context("Miner task panicked")??;
    }

    served.context("HTTP server failed")
}
