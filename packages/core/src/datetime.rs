//! The coupon timestamp field: `2016-08-05T08:40:51.620Z`.
//!
//! Exactly millisecond precision, a literal `Z`, always UTC. Anything else is
//! rejected on input rather than normalised, so a value survives a round trip
//! byte for byte.

use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde_json::Value;

use crate::schema::messages;

/// Human-readable form of the accepted format, used in error messages.
pub const DISPLAY_FORMAT: &str = "YYYY-MM-DDTHH:MM:SS.mmmZ";

const PARSE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";
const WRITE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// `^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z$`
static SHAPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}Z$")
        .expect("invalid timestamp regex")
});

/// Field codec for `expire_at` and `published_at`.
///
/// Stateless; the schema holds one by value.
#[derive(Debug, Clone, Copy, Default)]
pub struct CouponDateTime;

impl CouponDateTime {
    /// Parse a wire string. The error is the field-level message.
    pub fn parse(&self, input: &str) -> Result<NaiveDateTime, String> {
        if !SHAPE_RE.is_match(input) {
            return Err(format_mismatch(input));
        }
        NaiveDateTime::parse_from_str(input, PARSE_FORMAT).map_err(|_| format_mismatch(input))
    }

    /// Decode a non-null JSON value. Non-string values are reported with
    /// their JSON text as the offending input.
    pub fn deserialize(&self, value: &Value) -> Result<NaiveDateTime, String> {
        match value {
            Value::String(s) => self.parse(s),
            other => Err(format_mismatch(&other.to_string())),
        }
    }

    pub fn format(&self, value: &NaiveDateTime) -> String {
        value.format(WRITE_FORMAT).to_string()
    }

    /// Encode for output. A missing value is an error, never an omitted field.
    pub fn serialize(&self, value: Option<&NaiveDateTime>) -> Result<String, String> {
        value
            .map(|v| self.format(v))
            .ok_or_else(|| messages::INVALID_DATETIME.to_string())
    }
}

fn format_mismatch(input: &str) -> String {
    format!("\"{input}\" does not match format {DISPLAY_FORMAT}.")
}
