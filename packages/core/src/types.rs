//! Domain records for the coupon API: [`Coupon`], its embedded [`Store`],
//! the insert-side [`NewCoupon`], and the derived [`Status`].
//!
//! These are plain Rust values. The JSON wire format lives in
//! [`crate::schema`], which owns field coercion and validation; nothing here
//! derives `Serialize`/`Deserialize` on purpose so the two cannot drift.

use chrono::NaiveDateTime;

/// A physical merchant location.
///
/// The store's own primary key is internal to storage and never appears on
/// the wire, so it is not part of this type. Storage tracks it through
/// [`Coupon::store_id`].
#[derive(Debug, Clone, PartialEq)]
pub struct Store {
    pub lat: f64,
    pub long: f64,
    pub city: String,
    pub phone: String,
    pub state: String,
    pub street: String,
    pub zip: String,
}

/// A persisted coupon together with the store it belongs to.
///
/// The timestamp columns are nullable in storage, so a row written by another
/// tool may lack them. The API and the importer never produce such rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Coupon {
    pub id: i64,
    pub category: String,
    pub couponcode: String,
    pub description: String,
    pub merchant: String,
    pub title: String,
    pub store_id: i64,
    pub store: Store,
    pub expire_at: Option<NaiveDateTime>,
    pub published_at: Option<NaiveDateTime>,
}

impl Coupon {
    /// The derived status, or `None` when either timestamp is missing.
    pub fn status(&self) -> Option<Status> {
        match (self.expire_at, self.published_at) {
            (Some(expire_at), Some(published_at)) => Some(Status::derive(expire_at, published_at)),
            _ => None,
        }
    }
}

/// A fully validated coupon that has not been assigned ids yet.
///
/// Produced by [`crate::CouponCodec::load_new`] for `POST /coupons` and for
/// every fixture record. Each insert creates a fresh store row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCoupon {
    pub category: String,
    pub couponcode: String,
    pub description: String,
    pub merchant: String,
    pub title: String,
    pub store: Store,
    pub expire_at: NaiveDateTime,
    pub published_at: NaiveDateTime,
}

impl NewCoupon {
    pub fn status(&self) -> Status {
        Status::derive(self.expire_at, self.published_at)
    }
}

/// Whether a coupon is still redeemable relative to its publication date.
///
/// Never stored; always computed from `expire_at` and `published_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// `expire_at >= published_at`.
    Valid,
    /// `expire_at < published_at`.
    Invalid,
}

impl Status {
    pub fn derive(expire_at: NaiveDateTime, published_at: NaiveDateTime) -> Self {
        if expire_at >= published_at {
            Status::Valid
        } else {
            Status::Invalid
        }
    }
}
