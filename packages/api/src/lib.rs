//! Request and response types for the coupon HTTP API.
//!
//! # Endpoints covered
//!
//! | Method | Path | Type |
//! |--------|------|------|
//! | GET | `/coupons` | → array of coupon objects |
//! | GET | `/coupons/{id}` | → coupon object |
//! | PUT | `/coupons/{id}` | partial coupon object → coupon object |
//! | DELETE | `/coupons/{id}` | → `204` |
//! | POST | `/coupons` | coupon object → [`CreatedResponse`] |
//!
//! Every non-2xx response carries an [`ErrorResponse`].

pub mod coupon;
pub mod error;

pub use coupon::CreatedResponse;
pub use error::{ErrorMessage, ErrorResponse};
