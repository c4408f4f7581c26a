//! Logs every non-2xx response.
//!
//! Handlers report failures through [`AppError`], which leaves an
//! [`ErrorContext`] on the response. This middleware reads it back and emits
//! one event per failed request: `warn` for 4xx, `error` for 5xx. A response
//! built without [`AppError`] carries no context and is logged with the
//! status reason instead.
//!
//! Events go to the [`LOG_TARGET`] target with the message
//! `"METHOD URI" reason`, which is also the line format of the rotating
//! `error.log` file set up in [`crate::logging`].
//!
//! [`AppError`]: crate::error::AppError

use axum::{extract::Request, middleware::Next, response::Response};

use crate::error::ErrorContext;

/// Target of the per-request failure events.
pub const LOG_TARGET: &str = "coupon_server::requests";

/// Axum `from_fn` middleware that logs failed requests.
pub async fn log_errors(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();

    let resp = next.run(req).await;
    let status = resp.status();
    if status.is_success() {
        return resp;
    }

    let message = resp
        .extensions()
        .get::<ErrorContext>()
        .map(|c| c.0.clone())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_string());

    let code = status.as_u16();
    if status.is_server_error() {
        tracing::error!(target: LOG_TARGET, status = code, "\"{method} {uri}\" {message}");
    } else {
        tracing::warn!(target: LOG_TARGET, status = code, "\"{method} {uri}\" {message}");
    }
    resp
}

#[cfg(test)]
mod tests {
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware::from_fn,
        response::IntoResponse,
        routing::get,
        Router,
    };
    use tower::ServiceExt;
    use tracing_subscriber::fmt::MakeWriter;

    use crate::error::AppError;

    /// In-memory log sink shared between the subscriber and the test.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Captured {
        type Writer = Captured;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    fn app() -> Router {
        Router::new()
            .route("/ok", get(|| async { "fine" }))
            .route(
                "/missing",
                get(|| async { AppError::NotFound("coupon 9 not found".into()).into_response() }),
            )
            .route(
                "/broken",
                get(|| async { AppError::Internal("disk on fire".into()).into_response() }),
            )
            .layer(from_fn(log_errors))
    }

    async fn call(uri: &str) -> Response {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        app().oneshot(req).await.unwrap()
    }

    #[tokio::test]
    async fn success_passes_through() {
        let resp = call("/ok").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(resp.extensions().get::<ErrorContext>().is_none());
    }

    #[tokio::test]
    async fn failures_keep_status_and_context() {
        let resp = call("/missing").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            resp.extensions().get::<ErrorContext>().unwrap().0,
            "coupon 9 not found"
        );

        let resp = call("/broken").await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn failures_are_logged_with_level_and_request_line() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(captured.clone())
            .with_ansi(false)
            .finish();
        // Current-thread runtime, so the thread-local default covers the requests.
        let _guard = tracing::subscriber::set_default(subscriber);

        call("/ok").await;
        call("/missing").await;
        call("/broken").await;

        let logs = captured.text();
        let lines: Vec<&str> = logs.lines().collect();
        assert_eq!(lines.len(), 2, "{logs}");

        let warn = lines[0];
        assert!(warn.contains("WARN"), "{warn}");
        assert!(warn.contains(LOG_TARGET), "{warn}");
        assert!(warn.contains("\"GET /missing\" coupon 9 not found"), "{warn}");
        assert!(warn.contains("status=404"), "{warn}");

        let error = lines[1];
        assert!(error.contains("ERROR"), "{error}");
        assert!(error.contains("\"GET /broken\" disk on fire"), "{error}");
        assert!(error.contains("status=500"), "{error}");
    }

    #[tokio::test]
    async fn responses_without_context_are_left_alone() {
        let req = Request::builder()
            .method("POST")
            .uri("/ok")
            .body(Body::empty())
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
