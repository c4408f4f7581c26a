//! Public surface for the `coupon-server` crate.
//!
//! Exposes the router builder, storage and importer so that external crates
//! (e.g. the conformance test suite) can spin up an in-process server without
//! spawning a subprocess.

pub mod config;
pub mod error;
pub mod handlers;
pub mod importer;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod storage;

pub use config::ServerConfig;
pub use router::build_router;
pub use storage::{sqlite::SqliteStorage, Storage, StorageError};
