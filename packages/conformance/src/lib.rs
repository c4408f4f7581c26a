//! Shared helpers for the coupon API conformance test suite.
//!
//! Provides [`spawn_server`]: binds a `TcpListener` on an ephemeral port,
//! wires up an in-process server backed by an in-memory SQLite database,
//! and returns both the local URL and the storage so tests can inspect it
//! without going through the HTTP layer.

use std::path::PathBuf;
use std::sync::Arc;

use coupon_core::CouponCodec;
use coupon_server::{build_router, importer, SqliteStorage, Storage};

/// How the database is prepared before the server starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Seed {
    /// Schema created and the shared fixture imported (20 coupons, 3 invalid).
    Fixture,
    /// Schema created, no rows.
    Empty,
    /// No schema at all; every query fails with `no such table`.
    Uninitialized,
}

/// The fixture shipped with the server crate.
pub fn fixture_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../server/fixtures/coupons.json")
}

/// Start an ephemeral in-process server and return `(base_url, storage)`.
///
/// The server runs in a background `tokio` task and is bound to an
/// OS-assigned port on `127.0.0.1`. The returned `String` is the base URL,
/// e.g. `http://127.0.0.1:51234`.
///
/// # Panics
///
/// Panics if the TCP listener cannot be bound or seeding fails.
pub async fn spawn_server(seed: Seed) -> (String, Arc<SqliteStorage>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("get local addr");
    let base_url = format!("http://{addr}");

    let sqlite = Arc::new(SqliteStorage::open_in_memory().expect("open in-memory SQLite"));
    if seed != Seed::Uninitialized {
        sqlite.create_schema(false).await.expect("create schema");
    }
    if seed == Seed::Fixture {
        importer::import_fixture(sqlite.as_ref(), &CouponCodec::new(), &fixture_path())
            .await
            .expect("import fixture");
    }

    let storage: Arc<dyn Storage> = Arc::clone(&sqlite) as Arc<dyn Storage>;
    let router = build_router(storage);

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("conformance server error");
    });

    (base_url, sqlite)
}
