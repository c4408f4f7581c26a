//! Standard error response body.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// The JSON body returned for all error responses.
///
/// ```json
/// { "error": "coupon 21 not found" }
/// ```
///
/// Schema validation failures carry the per-field messages instead of a
/// sentence:
///
/// ```json
/// { "error": { "published_at": ["\"\" does not match format YYYY-MM-DDTHH:MM:SS.mmmZ."] } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: ErrorMessage,
}

/// Either a human-readable description or a field → messages map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum ErrorMessage {
    Text(String),
    Fields(BTreeMap<String, Vec<String>>),
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: ErrorMessage::Text(error.into()),
        }
    }

    pub fn fields(fields: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            error: ErrorMessage::Fields(fields),
        }
    }
}

impl std::fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorMessage::Text(text) => f.write_str(text),
            ErrorMessage::Fields(fields) => {
                let mut first = true;
                for (field, messages) in fields {
                    for message in messages {
                        if !first {
                            f.write_str("; ")?;
                        }
                        write!(f, "{field}: {message}")?;
                        first = false;
                    }
                }
                Ok(())
            }
        }
    }
}
