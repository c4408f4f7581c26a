//! `coupon-server`: the coupon HTTP API.
//!
//! # Quick start
//!
//! ```sh
//! # In-memory database seeded from ./coupons.json on the default port:
//! coupon-server
//!
//! # Persistent SQLite database, recreated from scratch:
//! COUPON_DB=./coupons.db coupon-server --init-db
//!
//! # Custom bind address and fixture, no seeding:
//! COUPON_BIND=127.0.0.1:8080 coupon-server --skip-import
//! ```
//!
//! Failed requests are also appended to `error.YYYY-MM-DD.log` in
//! `COUPON_LOG_DIR` (default: the working directory).
//!
//! # Environment variables
//!
//! See [`coupon_server::ServerConfig`] for the full list.

use std::sync::Arc;

use clap::Parser;
use coupon_core::CouponCodec;
use coupon_server::{build_router, importer, logging, ServerConfig, SqliteStorage, Storage};

#[derive(Parser)]
#[command(name = "coupon-server", about = "Coupon CRUD API backed by SQLite", version)]
struct Cli {
    /// Drop and recreate the coupons and stores tables before serving.
    #[arg(long)]
    init_db: bool,

    /// Do not seed an empty database from the fixture file.
    #[arg(long)]
    skip_import: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Config comes first because it names the log directory.
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("coupon-server: {e}");
            std::process::exit(1);
        }
    };

    let _log_guard = match logging::init(&config.log_dir) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!(
                "coupon-server: cannot open error log in {}: {e}",
                config.log_dir.display()
            );
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli, config).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {

    let storage: Arc<dyn Storage> = match &config.db_path {
        Some(path) => {
            tracing::info!("storage: SQLite at {path}");
            Arc::new(
                SqliteStorage::open(path)
                    .map_err(|e| format!("failed to open SQLite database at {path}: {e}"))?,
            )
        }
        None => {
            tracing::info!("storage: in-memory SQLite (data will not survive restart)");
            Arc::new(SqliteStorage::open_in_memory()?)
        }
    };

    if cli.init_db {
        tracing::info!("dropping and recreating tables");
    }
    storage.create_schema(cli.init_db).await?;

    if !cli.skip_import {
        importer::import_if_empty(storage.as_ref(), &CouponCodec::new(), &config.fixture_path)
            .await?;
    }

    let app = build_router(storage);

    tracing::info!("listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", config.bind_addr))?;

    axum::serve(listener, app).await?;
    Ok(())
}
