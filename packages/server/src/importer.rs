//! One-shot fixture import.
//!
//! At startup an empty database is seeded from a JSON file: an array of
//! wire-format coupons without ids. Every record is decoded through
//! [`CouponCodec::load_many`] first, so one bad record rejects the whole file
//! with all problems keyed `[index].field`. The decoded batch is then
//! inserted in a single transaction.

use std::path::{Path, PathBuf};

use coupon_core::{CouponCodec, NewCoupon, ValidationErrors};

use crate::storage::{Storage, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read fixture {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("fixture {} is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("fixture {} failed validation: {errors}", path.display())]
    Invalid {
        path: PathBuf,
        errors: ValidationErrors,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Read and decode a fixture file without touching storage.
pub async fn load_fixture(codec: &CouponCodec, path: &Path) -> Result<Vec<NewCoupon>, ImportError> {
    let raw = tokio::fs::read(path).await.map_err(|source| ImportError::Read {
        path: path.to_owned(),
        source,
    })?;
    let payload: serde_json::Value =
        serde_json::from_slice(&raw).map_err(|source| ImportError::Json {
            path: path.to_owned(),
            source,
        })?;
    codec.load_many(&payload).map_err(|errors| ImportError::Invalid {
        path: path.to_owned(),
        errors,
    })
}

/// Import every coupon in `path`. Returns the number inserted.
pub async fn import_fixture(
    storage: &dyn Storage,
    codec: &CouponCodec,
    path: &Path,
) -> Result<usize, ImportError> {
    let coupons = load_fixture(codec, path).await?;
    let ids = storage.insert_coupons(&coupons).await?;
    tracing::info!(count = ids.len(), path = %path.display(), "fixture imported");
    Ok(ids.len())
}

/// Import `path` only when no coupons are stored yet.
///
/// Returns `None` when the import was skipped.
pub async fn import_if_empty(
    storage: &dyn Storage,
    codec: &CouponCodec,
    path: &Path,
) -> Result<Option<usize>, ImportError> {
    let existing = storage.count_coupons().await?;
    if existing > 0 {
        tracing::info!(existing, "coupons already present, skipping fixture import");
        return Ok(None);
    }
    import_fixture(storage, codec, path).await.map(Some)
}
