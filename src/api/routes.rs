use actix_web::web;

use super::handlers;

/// Configures the API routes
///
/// # Arguments
///
/// * `cfg` - The service configuration
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/status", web::get().to(handlers::get_status))
        .route("/blocks/next", web::get().to(handlers::get_next_block))
        .route("/blocks/{hash_or_index}", web::get().to(handlers::get_block))
        .route("/blocks", web::post().to(handlers::add_block))
        .route("/transactions", web::get().to(handlers::get_transactions))
        .route("/transactions", web::post().to(handlers::add_transaction))
        .route("/wallets", web::post().to(handlers::create_wallet))
        .route("/wallets/{address}", web::get().to(handlers::get_wallet));
}
