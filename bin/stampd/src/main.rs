//! `stampd` — the tax-stamp issuance server binary.
//!
//! Usage:
//!   stampd -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/stampd/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod bootstrap;
mod config;
mod routes;

use std::sync::Arc;

use clap::Parser;
use stamp_core::Module;
use tracing::info;

use config::ServerConfig;
use issuance::service::{ProductionConfig, StampService};
use issuance::IssuanceModule;

/// Tax-stamp issuance server.
#[derive(Parser, Debug)]
#[command(name = "stampd", about = "Tax-stamp issuance server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address (overrides default 0.0.0.0:8080).
    #[arg(long = "listen", default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;

    bootstrap::verify_config(&server_config)?;

    let data_dir = std::path::PathBuf::from(&server_config.storage.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let core_config = stamp_core::ServiceConfig {
        data_dir: Some(data_dir.clone()),
        listen: cli.listen.clone(),
        ..Default::default()
    };

    // Embedded stores. One redb file carries both the progress records
    // and the serial counters.
    let redb = Arc::new(
        stamp_kv::RedbStore::open(&core_config.resolve_db_path())
            .map_err(|e| anyhow::anyhow!("failed to open KV store: {}", e))?,
    );
    let kv: Arc<dyn stamp_kv::KVStore> = redb.clone();
    let counters: Arc<dyn stamp_kv::CounterStore> = redb;
    let sql: Arc<dyn stamp_sql::SQLStore> = Arc::new(
        stamp_sql::SqliteStore::open(&core_config.resolve_sqlite_path())
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );

    let production_config = ProductionConfig {
        serial_prefix: server_config.production.serial_prefix.clone(),
        chunk_size: server_config.production.chunk_size,
        job_timeout_secs: server_config.production.job_timeout_secs,
    };

    let service = Arc::new(StampService::new(
        sql,
        kv,
        counters,
        &server_config.security.app_secret,
        production_config,
    )?);

    // Cold-start recovery: rebuild any counter that drifted below the
    // ledger before the first request can allocate from it.
    let year = chrono_year();
    let reseeded = service.allocator().reseed(year)?;
    info!(year, last_issued = reseeded, "serial counter reseeded");

    let issuance_module = IssuanceModule::new(Arc::clone(&service));
    info!("Issuance module initialized");

    let module_routes = vec![(issuance_module.name(), issuance_module.routes())];
    let app = routes::build_router(module_routes);

    let listener = tokio::net::TcpListener::bind(&cli.listen).await?;
    info!("stampd listening on {}", cli.listen);
    axum::serve(listener, app).await?;

    Ok(())
}

fn chrono_year() -> i32 {
    use chrono::Datelike;
    chrono::Utc::now().year()
}
