//! Assembles the Axum [`Router`] from the handler modules.

use std::sync::Arc;

use axum::{routing::get, Router};
use coupon_core::{CouponCodec, FilterRegistry};
use tower_http::trace::TraceLayer;

use crate::{
    handlers::{self, coupons, AppState},
    middleware::error_log::log_errors,
    storage::Storage,
};

/// Build the complete application router with shared state.
pub fn build_router(storage: Arc<dyn Storage>) -> Router {
    let state = AppState {
        storage,
        codec: CouponCodec::new(),
        filters: FilterRegistry::new(),
    };

    Router::new()
        .route("/", get(handlers::root))
        .route("/coupons", get(coupons::list).post(coupons::create))
        .route(
            "/coupons/{id}",
            get(coupons::get_by_id)
                .put(coupons::update)
                .delete(coupons::delete),
        )
        .method_not_allowed_fallback(handlers::method_not_allowed)
        .fallback(handlers::fallback)
        .with_state(state)
        // Error logging sits inside the trace span so its events carry the request context.
        .layer(axum::middleware::from_fn(log_errors))
        .layer(TraceLayer::new_for_http())
}
