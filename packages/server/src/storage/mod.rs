//! Storage abstraction layer for the coupon server.
//!
//! The [`Storage`] trait is the contract between the HTTP handlers and
//! persistence. Validation, filter whitelisting and wire encoding all happen
//! in the handlers; storage only reads and writes domain values.
//!
//! Every mutating method runs as exactly one transaction. On any error the
//! transaction is rolled back before the error is returned, so callers never
//! observe partial writes.
//!
//! # Implementations
//!
//! | Type | When to use |
//! |------|-------------|
//! | [`SqliteStorage`] | File-backed or in-memory SQLite database |
//!
//! [`SqliteStorage`]: sqlite::SqliteStorage

pub mod sqlite;

use async_trait::async_trait;
use coupon_core::{Coupon, CouponFilter, NewCoupon};

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

/// Errors that storage operations can return.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested coupon does not exist.
    #[error("not found")]
    NotFound,

    /// A write violated a database constraint (e.g. a duplicate primary key).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Any other failure in the backend, including a missing schema.
    #[error("internal storage error: {0}")]
    Internal(String),
}

// ---------------------------------------------------------------------------
// Storage trait
// ---------------------------------------------------------------------------

/// The persistence contract for coupons and their stores.
///
/// Implementations must be `Send + Sync + 'static` so they can be held in an
/// `Arc<dyn Storage>`.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Create the `coupons` and `stores` relations if they are missing.
    /// With `reset`, drop both first, discarding all data.
    async fn create_schema(&self, reset: bool) -> Result<(), StorageError>;

    /// Number of stored coupons.
    async fn count_coupons(&self) -> Result<u64, StorageError>;

    /// All coupons matching every filter, ordered by `id` ascending.
    /// An empty filter slice returns everything.
    async fn list_coupons(&self, filters: &[CouponFilter]) -> Result<Vec<Coupon>, StorageError>;

    /// Retrieve a coupon and its store. Returns `None` if not found.
    async fn get_coupon(&self, id: i64) -> Result<Option<Coupon>, StorageError>;

    /// Insert a coupon together with a new store row.
    async fn insert_coupon(&self, coupon: &NewCoupon) -> Result<Coupon, StorageError>;

    /// Insert many coupons in a single transaction; all or nothing.
    /// Returns the assigned ids in input order.
    async fn insert_coupons(&self, coupons: &[NewCoupon]) -> Result<Vec<i64>, StorageError>;

    /// Overwrite the coupon stored under `id` (and its store) with `coupon`.
    ///
    /// `coupon.id` may differ from `id`, which re-keys the row; a collision
    /// with an existing coupon is a [`StorageError::Constraint`]. Returns
    /// [`StorageError::NotFound`] if nothing is stored under `id`.
    async fn update_coupon(&self, id: i64, coupon: &Coupon) -> Result<Coupon, StorageError>;

    /// Delete a coupon. Its store is deleted too once no coupon references it.
    /// Returns [`StorageError::NotFound`] if nothing is stored under `id`.
    async fn delete_coupon(&self, id: i64) -> Result<(), StorageError>;
}
