//! HTTP server setup module for the main and sync listeners.

use std::sync::Arc;

use actix_web::{App, HttpServer, dev::Server, middleware::Logger, web};

use crate::{
    api,
    model::common::{AppState, HttpServerConfig},
};

/// Creates and binds the client-facing HTTP server.
///
/// Signal handling is disabled; shutdown is driven through the server handle.
pub fn main_server(
    app_state: Arc<AppState>,
    config: &HttpServerConfig,
    port: u16,
) -> Result<Server, std::io::Error> {
    let max_body_bytes = config.max_body_bytes;

    Ok(HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::from(app_state.clone()))
            .app_data(web::PayloadConfig::new(max_body_bytes))
            .configure(api::main_routes)
    })
    .disable_signals()
    .shutdown_timeout(config.shutdown_timeout.as_secs())
    .bind((config.address.as_str(), port))?
    .run())
}

/// Creates and binds the peer-facing sync server.
pub fn sync_server(
    app_state: Arc<AppState>,
    config: &HttpServerConfig,
    port: u16,
) -> Result<Server, std::io::Error> {
    let max_body_bytes = config.max_body_bytes;

    Ok(HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(web::Data::from(app_state.clone()))
            .app_data(web::PayloadConfig::new(max_body_bytes))
            .configure(api::sync_routes)
    })
    .disable_signals()
    .shutdown_timeout(config.shutdown_timeout.as_secs())
    .bind((config.address.as_str(), port))?
    .run())
}
