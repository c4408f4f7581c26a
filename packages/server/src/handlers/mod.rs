//! HTTP request handlers for the coupon API.
//!
//! Handlers are pure async functions that receive Axum extractors and return
//! `Result<impl IntoResponse, AppError>`. Request validation, filter
//! resolution and wire encoding happen here; storage only persists.

pub mod coupons;

use std::sync::Arc;

use axum::http::{Method, Uri};
use coupon_core::{CouponCodec, FilterRegistry};

use crate::{error::AppError, storage::Storage};

/// Shared application state threaded through all Axum handlers via [`axum::extract::State`].
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    /// Wire encoder/decoder. Stateless, built once in [`crate::build_router`].
    pub codec: CouponCodec,
    /// Whitelist for `GET /coupons` query arguments.
    pub filters: FilterRegistry,
}

/// `GET /`
pub async fn root() -> &'static str {
    "Coupon API"
}

/// Any unrouted path. Returns the same JSON error shape as the handlers.
pub async fn fallback(uri: Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}

/// A known path hit with a method it does not serve.
pub async fn method_not_allowed(method: Method, uri: Uri) -> AppError {
    AppError::MethodNotAllowed(format!("method {method} not allowed on {}", uri.path()))
}
