//! Tracing subscriber setup for the binary.
//!
//! Two layers share one registry:
//!
//! - stdout, filtered by `RUST_LOG` (default [`DEFAULT_FILTER`]);
//! - a daily-rotating `error.log` in the configured directory that receives
//!   only the failed-request events of [`crate::middleware::error_log`] at
//!   `warn` and above. The current file and the five previous days are kept.

use std::path::Path;

use tracing::{Level, Subscriber};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{InitError, RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    filter::Targets,
    fmt::{self, MakeWriter},
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::middleware::error_log::LOG_TARGET;

pub const DEFAULT_FILTER: &str = "coupon_server=info,tower_http=debug";

/// Rotated files are named `error.YYYY-MM-DD.log`.
pub const ERROR_LOG_PREFIX: &str = "error";
pub const ERROR_LOG_SUFFIX: &str = "log";

/// Today's file plus five days of history.
pub const MAX_ERROR_LOG_FILES: usize = 6;

/// Daily-rotating appender for the error log inside `dir`.
pub fn error_log_appender(dir: &Path) -> Result<RollingFileAppender, InitError> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(ERROR_LOG_PREFIX)
        .filename_suffix(ERROR_LOG_SUFFIX)
        .max_log_files(MAX_ERROR_LOG_FILES)
        .build(dir)
}

/// Plain-text layer that keeps only failed-request events.
pub fn error_log_layer<S, W>(writer: W) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(writer)
        .with_filter(Targets::new().with_target(LOG_TARGET, Level::WARN))
}

/// Install the global subscriber.
///
/// The returned guard flushes the error log when dropped, so the caller must
/// hold it for the life of the process.
pub fn init(log_dir: &Path) -> Result<WorkerGuard, InitError> {
    let (writer, guard) = tracing_appender::non_blocking(error_log_appender(log_dir)?);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(env_filter))
        .with(error_log_layer(writer))
        .init();

    Ok(guard)
}
