//! PesaDB query server
//!
//! Serves `POST /query` until Ctrl-C, then flushes every database.

use anyhow::{Context, Result};
use clap::Parser;
use pesadb::logging::init_logging;
use pesadb::{Catalog, EngineConfig, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "pesadb-server", version, about = "HTTP query server for PesaDB")]
struct Args {
    /// Address to bind
    #[arg(long, env = "PESADB_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind
    #[arg(long, env = "PESADB_PORT", default_value_t = 8080)]
    port: u16,

    /// Require this value in the X-API-Key header
    #[arg(long, env = "PESADB_API_KEY")]
    api_key: Option<String>,

    /// Comma-separated allowed CORS origins (empty or '*' allows any)
    #[arg(long, env = "PESADB_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,

    /// Database used when a request omits "db"
    #[arg(long, env = "PESADB_DATABASE")]
    database: Option<String>,

    /// Directory holding database snapshots
    #[arg(long, env = "PESADB_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// Keep everything in memory, never write snapshots
    #[arg(long, env = "PESADB_IN_MEMORY")]
    in_memory: bool,

    /// Log level (overridden by RUST_LOG)
    #[arg(long, env = "PESADB_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let mut engine = EngineConfig::from_env();
        engine.data_dir = self.data_dir;
        if self.in_memory {
            engine.persist = false;
        }

        ServerConfig {
            host: self.host,
            port: self.port,
            api_key: self.api_key.filter(|k| !k.is_empty()),
            cors_origins: self
                .cors_origins
                .into_iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            default_database: self.database.filter(|d| !d.is_empty()),
            engine,
        }
    }
}

#[actix_web::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = args.into_config();
    if config.engine.persist {
        std::fs::create_dir_all(&config.engine.data_dir).with_context(|| {
            format!(
                "Failed to create data directory {}",
                config.engine.data_dir.display()
            )
        })?;
    }

    let catalog = Arc::new(Catalog::new(config.engine.clone()));
    pesadb::server::run(config, catalog)
        .await
        .context("Query server failed")?;
    Ok(())
}
