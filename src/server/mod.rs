//! HTTP query server
//!
//! `POST /query` runs one statement, `GET /health` reports liveness.

pub mod handlers;
pub mod models;

use crate::catalog::Catalog;
use crate::config::EngineConfig;
use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use handlers::{AppState, API_KEY_HEADER};

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Required `X-API-Key` value; `None` disables the check
    pub api_key: Option<String>,
    /// Allowed CORS origins; empty or `*` allows any
    pub cors_origins: Vec<String>,
    /// Database used when a request omits `db`
    pub default_database: Option<String>,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            api_key: None,
            cors_origins: Vec::new(),
            default_database: None,
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Build CORS middleware from the configured origins
pub fn build_cors_from_config(config: &ServerConfig) -> Cors {
    let mut cors = Cors::default();

    if config.cors_origins.is_empty() || config.cors_origins.iter().any(|o| o == "*") {
        cors = cors.allow_any_origin();
        debug!("CORS: Allowing any origin");
    } else {
        for origin in &config.cors_origins {
            cors = cors.allowed_origin(origin);
        }
        debug!("CORS: Allowed origins: {:?}", config.cors_origins);
    }

    cors.allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_any_header()
        .max_age(3600)
}

/// Register the query API routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(handlers::query).service(handlers::health);
}

/// Serve until shutdown, then flush every dirty database
pub async fn run(config: ServerConfig, catalog: Arc<Catalog>) -> std::io::Result<()> {
    let bind = config.bind_address();
    let state = web::Data::new(AppState {
        catalog: Arc::clone(&catalog),
        api_key: config.api_key.clone(),
        default_database: config.default_database.clone(),
    });

    info!(
        "PesaDB listening on http://{} (data dir: {}, persist: {}, snapshots: {}, API key: {})",
        bind,
        config.engine.data_dir.display(),
        config.engine.persist,
        config.engine.durability.description(),
        if config.api_key.is_some() { "required" } else { "disabled" }
    );

    let cors_config = config.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(build_cors_from_config(&cors_config))
            .app_data(state.clone())
            .configure(configure)
    })
    .bind(&bind)?
    .run()
    .await?;

    info!("Server stopped, flushing databases");
    match catalog.flush_all() {
        Ok(n) => info!("Flushed {} database(s)", n),
        Err(e) => log::error!("Flush on shutdown failed: {}", e),
    }
    Ok(())
}
