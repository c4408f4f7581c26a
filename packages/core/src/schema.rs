//! JSON wire codec for coupons.
//!
//! [`CouponCodec`] turns request payloads into domain values and domain values
//! back into JSON. It works over [`serde_json::Value`] instead of derived
//! `Deserialize` impls so that every bad field is reported in one pass: all
//! problems are collected into a [`ValidationErrors`] keyed by field name
//! before anything is returned.
//!
//! # Wire shape
//!
//! ```json
//! {
//!   "id": 1,
//!   "category": "Coupons & Special Offers",
//!   "couponcode": "60 31261",
//!   "description": "Offer limited to in-store purchase only.",
//!   "merchant": "Super Sporting Goods",
//!   "title": "20% Off 2 Regular-Priced Items",
//!   "store": {
//!     "lat": 47.66001, "long": -122.31313, "city": "Seattle",
//!     "phone": "547-2445", "state": "Wa",
//!     "street": "4315 UNIVERSITY WAY N.E.", "zip": "98105"
//!   },
//!   "expire_at": "2016-08-05T08:40:51.620Z",
//!   "published_at": "2016-03-05T08:40:51.620Z"
//! }
//! ```
//!
//! The store never carries its own id, and `store_id` is never emitted.
//! Unknown keys on input are ignored.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde_json::{json, Map, Value};

use crate::datetime::CouponDateTime;
use crate::types::{Coupon, NewCoupon, Store};

/// Field-level error messages.
pub mod messages {
    pub const REQUIRED: &str = "Missing data for required field.";
    pub const NULL: &str = "Field may not be null.";
    pub const INVALID_INPUT_TYPE: &str = "Invalid input type.";
    pub const INVALID_STRING: &str = "Not a valid string.";
    pub const INVALID_NUMBER: &str = "Not a valid number.";
    pub const INVALID_INTEGER: &str = "Not a valid integer.";
    pub const INVALID_DATETIME: &str = "Not a valid datetime.";
    pub const POSITIVE_INTEGER: &str = "Must be greater than or equal to 1.";
    pub const NUMERIC_RANGE: &str = "Value does not fit NUMERIC(7, 4).";
}

/// Key used for errors that concern the payload as a whole.
pub const SCHEMA_KEY: &str = "_schema";

/// Largest magnitude a NUMERIC(7, 4) column can hold, exclusive.
const COORDINATE_LIMIT: f64 = 1000.0;

// ---------------------------------------------------------------------------
// ValidationErrors
// ---------------------------------------------------------------------------

/// Every field problem found in one payload, keyed by field path.
///
/// Nested store fields use a dotted path (`store.zip`); fixture records are
/// prefixed with their array index (`[3].published_at`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single error.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    /// Fold `other` in, prefixing each of its keys.
    pub fn extend_prefixed(&mut self, prefix: &str, other: ValidationErrors) {
        for (field, messages) in other.fields {
            self.fields
                .entry(format!("{prefix}{field}"))
                .or_default()
                .extend(messages);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Messages recorded for `field`, if any.
    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> &BTreeMap<String, Vec<String>> {
        &self.fields
    }

    pub fn into_fields(self) -> BTreeMap<String, Vec<String>> {
        self.fields
    }

    /// `Ok(value)` when nothing was recorded, otherwise `Err(self)`.
    fn finish<T>(self, value: impl FnOnce() -> Option<T>) -> Result<T, ValidationErrors> {
        if !self.is_empty() {
            return Err(self);
        }
        // Every decoder that returned `None` also recorded an error.
        value().ok_or(self)
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.fields {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// ---------------------------------------------------------------------------
// Patches
// ---------------------------------------------------------------------------

/// Store fields present in an update payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorePatch {
    pub lat: Option<f64>,
    pub long: Option<f64>,
    pub city: Option<String>,
    pub phone: Option<String>,
    pub state: Option<String>,
    pub street: Option<String>,
    pub zip: Option<String>,
}

impl StorePatch {
    pub fn apply(self, mut store: Store) -> Store {
        if let Some(v) = self.lat {
            store.lat = v;
        }
        if let Some(v) = self.long {
            store.long = v;
        }
        if let Some(v) = self.city {
            store.city = v;
        }
        if let Some(v) = self.phone {
            store.phone = v;
        }
        if let Some(v) = self.state {
            store.state = v;
        }
        if let Some(v) = self.street {
            store.street = v;
        }
        if let Some(v) = self.zip {
            store.zip = v;
        }
        store
    }
}

/// Coupon fields present in an update payload. Absent keys are `None` and
/// leave the stored value alone.
///
/// `id` is accepted: it re-keys the coupon, which storage rejects when the
/// new id is taken.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CouponPatch {
    pub id: Option<i64>,
    pub category: Option<String>,
    pub couponcode: Option<String>,
    pub description: Option<String>,
    pub merchant: Option<String>,
    pub title: Option<String>,
    pub store: Option<StorePatch>,
    pub expire_at: Option<NaiveDateTime>,
    pub published_at: Option<NaiveDateTime>,
}

impl CouponPatch {
    /// Merge onto an existing coupon.
    pub fn apply(self, mut coupon: Coupon) -> Coupon {
        if let Some(v) = self.id {
            coupon.id = v;
        }
        if let Some(v) = self.category {
            coupon.category = v;
        }
        if let Some(v) = self.couponcode {
            coupon.couponcode = v;
        }
        if let Some(v) = self.description {
            coupon.description = v;
        }
        if let Some(v) = self.merchant {
            coupon.merchant = v;
        }
        if let Some(v) = self.title {
            coupon.title = v;
        }
        if let Some(store) = self.store {
            coupon.store = store.apply(coupon.store);
        }
        if self.expire_at.is_some() {
            coupon.expire_at = self.expire_at;
        }
        if self.published_at.is_some() {
            coupon.published_at = self.published_at;
        }
        coupon
    }
}

// ---------------------------------------------------------------------------
// CouponCodec
// ---------------------------------------------------------------------------

/// Stateless encoder/decoder for the coupon wire format.
///
/// Built once at startup and handed to whoever needs it; holds no mutable
/// state, so copies are interchangeable.
#[derive(Debug, Clone, Copy, Default)]
pub struct CouponCodec {
    datetime: CouponDateTime,
}

impl CouponCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a persisted coupon.
    ///
    /// Fails when a timestamp is missing; the field is never dropped.
    pub fn dump(&self, coupon: &Coupon) -> Result<Value, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let expire_at = self
            .datetime
            .serialize(coupon.expire_at.as_ref())
            .map_err(|e| errors.add("expire_at", e))
            .ok();
        let published_at = self
            .datetime
            .serialize(coupon.published_at.as_ref())
            .map_err(|e| errors.add("published_at", e))
            .ok();

        errors.finish(|| {
            Some(json!({
                "id": coupon.id,
                "category": coupon.category,
                "couponcode": coupon.couponcode,
                "description": coupon.description,
                "merchant": coupon.merchant,
                "title": coupon.title,
                "store": dump_store(&coupon.store),
                "expire_at": expire_at?,
                "published_at": published_at?,
            }))
        })
    }

    /// Encode a list, keying any errors by array index.
    pub fn dump_many(&self, coupons: &[Coupon]) -> Result<Value, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut out = Vec::with_capacity(coupons.len());
        for (i, coupon) in coupons.iter().enumerate() {
            match self.dump(coupon) {
                Ok(v) => out.push(v),
                Err(e) => errors.extend_prefixed(&format!("[{i}]."), e),
            }
        }
        errors.finish(|| Some(Value::Array(out)))
    }

    /// Decode a full coupon for insertion. Every field is required.
    pub fn load_new(&self, payload: &Value) -> Result<NewCoupon, ValidationErrors> {
        let obj = as_payload(payload)?;
        let mut errors = ValidationErrors::new();
        let mut d = Decoder::new(obj, "", &mut errors);

        let category = d.required("category", as_string);
        let couponcode = d.required("couponcode", as_string);
        let description = d.required("description", as_string);
        let merchant = d.required("merchant", as_string);
        let title = d.required("title", as_string);
        let expire_at = d.required("expire_at", |v| self.datetime.deserialize(v));
        let published_at = d.required("published_at", |v| self.datetime.deserialize(v));
        let store = d
            .required("store", as_object)
            .and_then(|store| load_store(store, &mut errors));

        errors.finish(|| {
            Some(NewCoupon {
                category: category?,
                couponcode: couponcode?,
                description: description?,
                merchant: merchant?,
                title: title?,
                store: store?,
                expire_at: expire_at?,
                published_at: published_at?,
            })
        })
    }

    /// Decode a fixture file: a JSON array of full coupons.
    pub fn load_many(&self, payload: &Value) -> Result<Vec<NewCoupon>, ValidationErrors> {
        let items = payload
            .as_array()
            .ok_or_else(|| ValidationErrors::single(SCHEMA_KEY, messages::INVALID_INPUT_TYPE))?;

        let mut errors = ValidationErrors::new();
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match self.load_new(item) {
                Ok(coupon) => out.push(coupon),
                Err(e) => errors.extend_prefixed(&format!("[{i}]."), e),
            }
        }
        errors.finish(|| Some(out))
    }

    /// Decode a partial update. Only present keys are decoded; `null` is
    /// rejected for every field.
    pub fn load_patch(&self, payload: &Value) -> Result<CouponPatch, ValidationErrors> {
        let obj = as_payload(payload)?;
        let mut errors = ValidationErrors::new();
        let mut d = Decoder::new(obj, "", &mut errors);

        let patch = CouponPatch {
            id: d.optional("id", as_id),
            category: d.optional("category", as_string),
            couponcode: d.optional("couponcode", as_string),
            description: d.optional("description", as_string),
            merchant: d.optional("merchant", as_string),
            title: d.optional("title", as_string),
            expire_at: d.optional("expire_at", |v| self.datetime.deserialize(v)),
            published_at: d.optional("published_at", |v| self.datetime.deserialize(v)),
            store: d
                .optional("store", as_object)
                .map(|store| load_store_patch(store, &mut errors)),
        };

        errors.finish(|| Some(patch))
    }

    /// Check a merged coupon before it is persisted.
    pub fn validate(&self, coupon: &Coupon) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if coupon.id < 1 {
            errors.add("id", messages::POSITIVE_INTEGER);
        }
        if coupon.expire_at.is_none() {
            errors.add("expire_at", messages::REQUIRED);
        }
        if coupon.published_at.is_none() {
            errors.add("published_at", messages::REQUIRED);
        }
        errors.finish(|| Some(()))
    }
}

fn dump_store(store: &Store) -> Value {
    json!({
        "lat": store.lat,
        "long": store.long,
        "city": store.city,
        "phone": store.phone,
        "state": store.state,
        "street": store.street,
        "zip": store.zip,
    })
}

fn load_store(obj: &Map<String, Value>, errors: &mut ValidationErrors) -> Option<Store> {
    let mut d = Decoder::new(obj, "store.", errors);
    let lat = d.required("lat", as_coordinate);
    let long = d.required("long", as_coordinate);
    let city = d.required("city", as_string);
    let phone = d.required("phone", as_string);
    let state = d.required("state", as_string);
    let street = d.required("street", as_string);
    let zip = d.required("zip", as_string);
    Some(Store {
        lat: lat?,
        long: long?,
        city: city?,
        phone: phone?,
        state: state?,
        street: street?,
        zip: zip?,
    })
}

fn load_store_patch(obj: &Map<String, Value>, errors: &mut ValidationErrors) -> StorePatch {
    let mut d = Decoder::new(obj, "store.", errors);
    StorePatch {
        lat: d.optional("lat", as_coordinate),
        long: d.optional("long", as_coordinate),
        city: d.optional("city", as_string),
        phone: d.optional("phone", as_string),
        state: d.optional("state", as_string),
        street: d.optional("street", as_string),
        zip: d.optional("zip", as_string),
    }
}

// ---------------------------------------------------------------------------
// Field decoding
// ---------------------------------------------------------------------------

/// Reads fields out of one JSON object, recording failures under
/// `prefix + name`.
struct Decoder<'a, 'e> {
    obj: &'a Map<String, Value>,
    prefix: &'static str,
    errors: &'e mut ValidationErrors,
}

impl<'a, 'e> Decoder<'a, 'e> {
    fn new(obj: &'a Map<String, Value>, prefix: &'static str, errors: &'e mut ValidationErrors) -> Self {
        Self { obj, prefix, errors }
    }

    fn required<T>(
        &mut self,
        name: &str,
        decode: impl FnOnce(&'a Value) -> Result<T, String>,
    ) -> Option<T> {
        if !self.obj.contains_key(name) {
            self.errors.add(format!("{}{name}", self.prefix), messages::REQUIRED);
            return None;
        }
        self.optional(name, decode)
    }

    fn optional<T>(
        &mut self,
        name: &str,
        decode: impl FnOnce(&'a Value) -> Result<T, String>,
    ) -> Option<T> {
        let value = self.obj.get(name)?;
        let result = if value.is_null() {
            Err(messages::NULL.to_string())
        } else {
            decode(value)
        };
        match result {
            Ok(v) => Some(v),
            Err(message) => {
                self.errors.add(format!("{}{name}", self.prefix), message);
                None
            }
        }
    }
}

fn as_payload(payload: &Value) -> Result<&Map<String, Value>, ValidationErrors> {
    payload
        .as_object()
        .ok_or_else(|| ValidationErrors::single(SCHEMA_KEY, messages::INVALID_INPUT_TYPE))
}

fn as_object(value: &Value) -> Result<&Map<String, Value>, String> {
    value
        .as_object()
        .ok_or_else(|| messages::INVALID_INPUT_TYPE.to_string())
}

fn as_string(value: &Value) -> Result<String, String> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| messages::INVALID_STRING.to_string())
}

fn as_coordinate(value: &Value) -> Result<f64, String> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
    .ok_or_else(|| messages::INVALID_NUMBER.to_string())?;

    if n.abs() >= COORDINATE_LIMIT {
        return Err(messages::NUMERIC_RANGE.to_string());
    }
    Ok(n)
}

fn as_id(value: &Value) -> Result<i64, String> {
    let id = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| messages::INVALID_INTEGER.to_string())?;

    if id < 1 {
        return Err(messages::POSITIVE_INTEGER.to_string());
    }
    Ok(id)
}
