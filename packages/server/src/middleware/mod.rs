//! Axum middleware applied to every route.

pub mod error_log;
