//! Domain core of the coupon API.
//!
//! Everything here is pure: no I/O, no HTTP types, no storage. The server
//! crate wires these pieces into its request pipeline.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`types`] | [`Coupon`], [`Store`], [`NewCoupon`], derived [`Status`] |
//! | [`filter`] | [`FilterRegistry`]: whitelisted `GET /coupons` query arguments |
//! | [`validation`] | Path id and `Content-Type` checks |
//! | [`schema`] | [`CouponCodec`]: JSON wire format, patches, aggregated [`ValidationErrors`] |
//! | [`datetime`] | The `YYYY-MM-DDTHH:MM:SS.mmmZ` timestamp field |
//!
//! # Quick start
//!
//! ```rust
//! use coupon_core::{CouponCodec, FilterRegistry, Status, CouponFilter};
//!
//! let filters = FilterRegistry::new()
//!     .resolve_all(&[("status", "invalid")])
//!     .unwrap();
//! assert_eq!(filters, vec![CouponFilter::Status(Status::Invalid)]);
//!
//! let codec = CouponCodec::new();
//! let err = codec
//!     .load_patch(&serde_json::json!({"published_at": ""}))
//!     .unwrap_err();
//! assert!(err.get("published_at").is_some());
//! ```

pub mod datetime;
pub mod filter;
pub mod schema;
pub mod types;
pub mod validation;

pub use datetime::CouponDateTime;
pub use filter::{CouponFilter, FilterKey, FilterRegistry, InvalidArgs, UnresolvedArg};
pub use schema::{CouponCodec, CouponPatch, StorePatch, ValidationErrors};
pub use types::{Coupon, NewCoupon, Status, Store};
pub use validation::{parse_coupon_id, require_json_content_type, ValidationError};
