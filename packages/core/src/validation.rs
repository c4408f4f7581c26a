use thiserror::Error;

/// The media type every request body must declare.
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// Errors from validating the request envelope (path id and media type),
/// before the body is looked at.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid coupon id: {0:?} (expected a positive integer)")]
    InvalidId(String),

    #[error("Expected Content-Type: 'application/json', got: {}", describe(.0))]
    UnsupportedMediaType(Option<String>),
}

fn describe(declared: &Option<String>) -> String {
    match declared {
        Some(v) => format!("'{v}'"),
        None => "none".to_string(),
    }
}

/// Parse a coupon id taken from the request path.
///
/// Only base-10 digits with an optional leading `+` are accepted (what
/// `i64::from_str` takes), and the result must be at least 1.
pub fn parse_coupon_id(raw: &str) -> Result<i64, ValidationError> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(ValidationError::InvalidId(raw.to_string())),
    }
}

/// Require a JSON `Content-Type`.
///
/// Accepts `application/json` and structured-syntax types such as
/// `application/merge-patch+json`. Parameters (`; charset=utf-8`) and case
/// are ignored.
pub fn require_json_content_type(declared: Option<&str>) -> Result<(), ValidationError> {
    let Some(declared) = declared else {
        return Err(ValidationError::UnsupportedMediaType(None));
    };

    let essence = declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let is_json = essence == JSON_MEDIA_TYPE
        || essence
            .strip_prefix("application/")
            .is_some_and(|subtype| subtype.ends_with("+json"));

    if is_json {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedMediaType(Some(declared.to_string())))
    }
}
