//! SQLite-backed storage implementation.
//!
//! Uses `rusqlite` (with bundled SQLite) wrapped in an `Arc<Mutex<Connection>>`
//! to satisfy the `Send + Sync` requirements. All blocking calls are offloaded
//! to a thread-pool via `tokio::task::spawn_blocking`.
//!
//! # Schema
//!
//! - `stores`: one row per coupon's merchant location.
//! - `coupons`: coupon columns plus `store_id` referencing `stores`.
//!
//! Timestamps are stored as TEXT in the wire format
//! (`2016-08-05T08:40:51.620Z`). The format is fixed-width, so SQL string
//! comparison orders them chronologically and the status filters can run in
//! the database.
//!
//! Opening a database does not create the schema; call
//! [`Storage::create_schema`] first. Queries against a database without it
//! fail with `no such table`.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use coupon_core::{Coupon, CouponDateTime, CouponFilter, NewCoupon, Status, Store};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};

use super::{Storage, StorageError};

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS stores (
    id      INTEGER PRIMARY KEY,
    lat     REAL NOT NULL,
    long    REAL NOT NULL,
    city    TEXT NOT NULL,
    phone   TEXT NOT NULL,
    state   TEXT NOT NULL,
    street  TEXT NOT NULL,
    zip     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS coupons (
    id           INTEGER PRIMARY KEY,
    category     TEXT NOT NULL,
    couponcode   TEXT NOT NULL,
    description  TEXT NOT NULL,
    merchant     TEXT NOT NULL,
    title        TEXT NOT NULL,
    store_id     INTEGER NOT NULL REFERENCES stores(id),
    expire_at    TEXT,
    published_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_coupons_store ON coupons(store_id);
";

const DROP_SCHEMA: &str = "
DROP TABLE IF EXISTS coupons;
DROP TABLE IF EXISTS stores;
";

const SELECT_COUPON: &str = "
SELECT c.id, c.category, c.couponcode, c.description, c.merchant, c.title,
       c.store_id, c.expire_at, c.published_at,
       s.lat, s.long, s.city, s.phone, s.state, s.street, s.zip
FROM coupons c
JOIN stores s ON s.id = c.store_id";

// ---------------------------------------------------------------------------
// SqliteStorage
// ---------------------------------------------------------------------------

/// SQLite-backed implementation of [`Storage`].
///
/// Holds a single database connection protected by a `Mutex`. All operations
/// run inside `spawn_blocking` to avoid blocking the async runtime.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (or create) the SQLite database file at `path`.
    pub fn open(path: &str) -> Result<Self, rusqlite::Error> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open an in-memory SQLite database (data is lost when dropped).
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking thread-pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap_or_else(|p| p.into_inner());
            f(&mut conn)
        })
        .await
        .map_err(|e| StorageError::Internal(format!("task join error: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// Error conversions
// ---------------------------------------------------------------------------

fn map_err(e: rusqlite::Error) -> StorageError {
    match e {
        rusqlite::Error::SqliteFailure(ref failure, _)
            if failure.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StorageError::Constraint(e.to_string())
        }
        other => StorageError::Internal(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

/// A TEXT column holding a wire-format timestamp.
struct Timestamp(NaiveDateTime);

impl FromSql for Timestamp {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        CouponDateTime
            .parse(raw)
            .map(Timestamp)
            .map_err(|e| FromSqlError::Other(e.into()))
    }
}

fn format_timestamp(value: Option<&NaiveDateTime>) -> Option<String> {
    value.map(|v| CouponDateTime.format(v))
}

/// Map one row of [`SELECT_COUPON`].
fn read_coupon(row: &rusqlite::Row<'_>) -> rusqlite::Result<Coupon> {
    Ok(Coupon {
        id: row.get(0)?,
        category: row.get(1)?,
        couponcode: row.get(2)?,
        description: row.get(3)?,
        merchant: row.get(4)?,
        title: row.get(5)?,
        store_id: row.get(6)?,
        expire_at: row.get::<_, Option<Timestamp>>(7)?.map(|t| t.0),
        published_at: row.get::<_, Option<Timestamp>>(8)?.map(|t| t.0),
        store: Store {
            lat: row.get(9)?,
            long: row.get(10)?,
            city: row.get(11)?,
            phone: row.get(12)?,
            state: row.get(13)?,
            street: row.get(14)?,
            zip: row.get(15)?,
        },
    })
}

fn query_coupon(conn: &Connection, id: i64) -> Result<Option<Coupon>, StorageError> {
    conn.query_row(
        &format!("{SELECT_COUPON} WHERE c.id = ?1"),
        params![id],
        read_coupon,
    )
    .optional()
    .map_err(map_err)
}

fn query_store_id(conn: &Connection, coupon_id: i64) -> Result<i64, StorageError> {
    conn.query_row(
        "SELECT store_id FROM coupons WHERE id = ?1",
        params![coupon_id],
        |row| row.get::<_, i64>(0),
    )
    .optional()
    .map_err(map_err)?
    .ok_or(StorageError::NotFound)
}

/// SQL condition equivalent to [`CouponFilter::matches`].
fn filter_clause(filter: &CouponFilter) -> &'static str {
    match filter {
        CouponFilter::Status(Status::Valid) => "c.expire_at >= c.published_at",
        CouponFilter::Status(Status::Invalid) => "c.expire_at < c.published_at",
    }
}

fn insert_one(conn: &Connection, coupon: &NewCoupon) -> Result<Coupon, StorageError> {
    let store = &coupon.store;
    conn.execute(
        "INSERT INTO stores (lat, long, city, phone, state, street, zip)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            store.lat,
            store.long,
            store.city,
            store.phone,
            store.state,
            store.street,
            store.zip,
        ],
    )
    .map_err(map_err)?;
    let store_id = conn.last_insert_rowid();

    conn.execute(
        "INSERT INTO coupons
            (category, couponcode, description, merchant, title, store_id, expire_at, published_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            coupon.category,
            coupon.couponcode,
            coupon.description,
            coupon.merchant,
            coupon.title,
            store_id,
            CouponDateTime.format(&coupon.expire_at),
            CouponDateTime.format(&coupon.published_at),
        ],
    )
    .map_err(map_err)?;
    let id = conn.last_insert_rowid();

    Ok(Coupon {
        id,
        category: coupon.category.clone(),
        couponcode: coupon.couponcode.clone(),
        description: coupon.description.clone(),
        merchant: coupon.merchant.clone(),
        title: coupon.title.clone(),
        store_id,
        store: coupon.store.clone(),
        expire_at: Some(coupon.expire_at),
        published_at: Some(coupon.published_at),
    })
}

// ---------------------------------------------------------------------------
// Storage impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_schema(&self, reset: bool) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(map_err)?;
            if reset {
                tx.execute_batch(DROP_SCHEMA).map_err(map_err)?;
            }
            tx.execute_batch(SCHEMA).map_err(map_err)?;
            tx.commit().map_err(map_err)
        })
        .await
    }

    async fn count_coupons(&self) -> Result<u64, StorageError> {
        self.with_conn(|conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM coupons", [], |row| row.get(0))
                .map_err(map_err)?;
            Ok(count.max(0) as u64)
        })
        .await
    }

    async fn list_coupons(&self, filters: &[CouponFilter]) -> Result<Vec<Coupon>, StorageError> {
        let filters = filters.to_vec();

        self.with_conn(move |conn| {
            let mut sql = format!("{SELECT_COUPON} WHERE 1=1");
            for filter in &filters {
                sql.push_str(" AND ");
                sql.push_str(filter_clause(filter));
            }
            sql.push_str(" ORDER BY c.id ASC");

            let mut stmt = conn.prepare(&sql).map_err(map_err)?;
            let coupons = stmt
                .query_map([], read_coupon)
                .map_err(map_err)?
                .collect::<Result<Vec<_>, _>>()
                .map_err(map_err)?;
            Ok(coupons)
        })
        .await
    }

    async fn get_coupon(&self, id: i64) -> Result<Option<Coupon>, StorageError> {
        self.with_conn(move |conn| query_coupon(conn, id)).await
    }

    async fn insert_coupon(&self, coupon: &NewCoupon) -> Result<Coupon, StorageError> {
        let coupon = coupon.clone();

        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(map_err)?;
            let stored = insert_one(&tx, &coupon)?;
            tx.commit().map_err(map_err)?;
            Ok(stored)
        })
        .await
    }

    async fn insert_coupons(&self, coupons: &[NewCoupon]) -> Result<Vec<i64>, StorageError> {
        let coupons = coupons.to_vec();

        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(map_err)?;
            let mut ids = Vec::with_capacity(coupons.len());
            for coupon in &coupons {
                ids.push(insert_one(&tx, coupon)?.id);
            }
            tx.commit().map_err(map_err)?;
            Ok(ids)
        })
        .await
    }

    async fn update_coupon(&self, id: i64, coupon: &Coupon) -> Result<Coupon, StorageError> {
        let coupon = coupon.clone();

        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(map_err)?;
            let store_id = query_store_id(&tx, id)?;

            let store = &coupon.store;
            tx.execute(
                "UPDATE stores
                 SET lat = ?1, long = ?2, city = ?3, phone = ?4, state = ?5, street = ?6, zip = ?7
                 WHERE id = ?8",
                params![
                    store.lat,
                    store.long,
                    store.city,
                    store.phone,
                    store.state,
                    store.street,
                    store.zip,
                    store_id,
                ],
            )
            .map_err(map_err)?;

            tx.execute(
                "UPDATE coupons
                 SET id = ?1, category = ?2, couponcode = ?3, description = ?4,
                     merchant = ?5, title = ?6, expire_at = ?7, published_at = ?8
                 WHERE id = ?9",
                params![
                    coupon.id,
                    coupon.category,
                    coupon.couponcode,
                    coupon.description,
                    coupon.merchant,
                    coupon.title,
                    format_timestamp(coupon.expire_at.as_ref()),
                    format_timestamp(coupon.published_at.as_ref()),
                    id,
                ],
            )
            .map_err(map_err)?;

            let updated = query_coupon(&tx, coupon.id)?.ok_or_else(|| {
                StorageError::Internal(format!("coupon {} missing after update", coupon.id))
            })?;
            tx.commit().map_err(map_err)?;
            Ok(updated)
        })
        .await
    }

    async fn delete_coupon(&self, id: i64) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction().map_err(map_err)?;
            let store_id = query_store_id(&tx, id)?;

            tx.execute("DELETE FROM coupons WHERE id = ?1", params![id])
                .map_err(map_err)?;
            tx.execute(
                "DELETE FROM stores
                 WHERE id = ?1 AND NOT EXISTS (SELECT 1 FROM coupons WHERE store_id = ?1)",
                params![store_id],
            )
            .map_err(map_err)?;

            tx.commit().map_err(map_err)
        })
        .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
