//! Server configuration, populated from environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Runtime configuration for the coupon server.
///
/// All fields are populated from environment variables with sensible
/// defaults, so the server can be started with zero configuration.
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `COUPON_BIND` | `0.0.0.0:5000` | TCP socket address to listen on |
/// | `COUPON_DB` | (absent = in-memory) | Path to the SQLite database file |
/// | `COUPON_FIXTURE` | `coupons.json` | Fixture imported when the collection is empty |
/// | `COUPON_LOG_DIR` | `.` | Directory of the daily-rotating `error.log` |
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address the server binds to.
    pub bind_addr: SocketAddr,

    /// Path to the SQLite database file.
    /// `None` means use an in-memory database (data is lost on restart).
    pub db_path: Option<String>,

    /// JSON array of coupons loaded into an empty database at startup.
    pub fixture_path: PathBuf,

    /// Where failed requests are written, one file per day.
    pub log_dir: PathBuf,
}

/// A variable was set but could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("COUPON_BIND must be a valid socket address (e.g. 0.0.0.0:5000), got {0:?}")]
    InvalidBind(String),
}

pub const DEFAULT_BIND: &str = "0.0.0.0:5000";
pub const DEFAULT_FIXTURE: &str = "coupons.json";
pub const DEFAULT_LOG_DIR: &str = ".";

impl ServerConfig {
    /// Populate config from environment variables, applying defaults where absent.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind = lookup("COUPON_BIND").unwrap_or_else(|| DEFAULT_BIND.into());
        let bind_addr = bind
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind.clone()))?;

        Ok(Self {
            bind_addr,
            db_path: lookup("COUPON_DB").filter(|p| !p.is_empty()),
            fixture_path: lookup("COUPON_FIXTURE")
                .unwrap_or_else(|| DEFAULT_FIXTURE.into())
                .into(),
            log_dir: lookup("COUPON_LOG_DIR")
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_DIR.into())
                .into(),
        })
    }
}
