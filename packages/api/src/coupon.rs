//! Coupon endpoint bodies that are not the coupon itself.
//!
//! Coupon payloads are plain JSON objects produced and checked by
//! `coupon_core::CouponCodec`; they have no derived type here.

use serde::{Deserialize, Serialize};

/// The response body for a successful `POST /coupons` (201).
///
/// The `Location` header carries the same id as `/coupons/{id}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreatedResponse {
    pub id: i64,
}

impl CreatedResponse {
    /// Canonical path of the created resource.
    pub fn location(&self) -> String {
        format!("/coupons/{}", self.id)
    }
}
