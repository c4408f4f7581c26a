//! Coupon handlers: list, retrieve, update, delete, create.
//!
//! # Validation order
//!
//! - `PUT /coupons/{id}`: id shape, existence, `Content-Type`, body.
//! - `POST /coupons`: `Content-Type`, body.
//! - `GET /coupons`: every query argument is resolved before storage is
//!   touched, so a bad filter is a 400 even when storage is broken.
//!
//! Bodies are taken as raw bytes rather than through `Json<T>` so that a
//! wrong media type, malformed JSON and schema failures each produce the
//! uniform error body instead of an axum rejection. Extractor rejections
//! (undecodable path segments, oversized bodies) are converted the same way.

use axum::{
    body::Bytes,
    extract::{
        rejection::{BytesRejection, QueryRejection},
        FromRequestParts, Path, Query, State,
    },
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use coupon_api::CreatedResponse;
use coupon_core::{parse_coupon_id, require_json_content_type, Coupon, CouponCodec};
use serde_json::Value;

use crate::{error::AppError, storage::StorageError};

use super::AppState;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn not_found(id: i64) -> AppError {
    AppError::NotFound(format!("coupon {id} not found"))
}

/// Convert a storage error, naming the coupon when it is missing.
fn storage_error(id: i64) -> impl FnOnce(StorageError) -> AppError {
    move |e| match e {
        StorageError::NotFound => not_found(id),
        other => other.into(),
    }
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

fn parse_body(body: &Bytes) -> Result<Value, AppError> {
    serde_json::from_slice(body).map_err(|e| AppError::BadRequest(format!("invalid JSON body: {e}")))
}

/// Encoding a stored row is a server-side failure, never the caller's.
fn encode(codec: &CouponCodec, coupon: &Coupon) -> Result<Value, AppError> {
    codec
        .dump(coupon)
        .map_err(|e| AppError::Internal(format!("failed to encode coupon {}: {e}", coupon.id)))
}

async fn find(state: &AppState, id: i64) -> Result<Coupon, AppError> {
    state.storage.get_coupon(id).await?.ok_or_else(|| not_found(id))
}

/// The `{id}` path segment, parsed as a coupon id.
///
/// A segment that does not percent-decode to UTF-8 is reported as it was
/// sent, e.g. `invalid coupon id: "%FF"`.
pub struct CouponId(pub i64);

impl<S: Send + Sync> FromRequestParts<S> for CouponId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let raw = match Path::<String>::from_request_parts(parts, state).await {
            Ok(Path(raw)) => raw,
            Err(_) => parts
                .uri
                .path()
                .rsplit('/')
                .next()
                .unwrap_or_default()
                .to_owned(),
        };
        Ok(CouponId(parse_coupon_id(&raw)?))
    }
}

// ---------------------------------------------------------------------------
// GET /coupons
// ---------------------------------------------------------------------------

/// `GET /coupons`: every coupon, optionally filtered by `status`.
pub async fn list(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(args) = query?;
    let filters = state.filters.resolve_all(&args)?;
    let coupons = state.storage.list_coupons(&filters).await?;
    let body = state
        .codec
        .dump_many(&coupons)
        .map_err(|e| AppError::Internal(format!("failed to encode coupons: {e}")))?;
    Ok(Json(body))
}

// ---------------------------------------------------------------------------
// GET /coupons/{id}
// ---------------------------------------------------------------------------

/// `GET /coupons/{id}`
pub async fn get_by_id(
    State(state): State<AppState>,
    CouponId(id): CouponId,
) -> Result<impl IntoResponse, AppError> {
    let coupon = find(&state, id).await?;
    Ok(Json(encode(&state.codec, &coupon)?))
}

// ---------------------------------------------------------------------------
// PUT /coupons/{id}
// ---------------------------------------------------------------------------

/// `PUT /coupons/{id}`: merge the fields present in the body onto the
/// stored coupon and return the result.
pub async fn update(
    State(state): State<AppState>,
    CouponId(id): CouponId,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, AppError> {
    let existing = find(&state, id).await?;
    require_json_content_type(content_type(&headers).as_deref())?;

    let patch = state.codec.load_patch(&parse_body(&body?)?)?;
    let merged = patch.apply(existing);
    state.codec.validate(&merged)?;

    let updated = state
        .storage
        .update_coupon(id, &merged)
        .await
        .map_err(storage_error(id))?;
    Ok(Json(encode(&state.codec, &updated)?))
}

// ---------------------------------------------------------------------------
// DELETE /coupons/{id}
// ---------------------------------------------------------------------------

/// `DELETE /coupons/{id}`: 204 with an empty body.
pub async fn delete(
    State(state): State<AppState>,
    CouponId(id): CouponId,
) -> Result<impl IntoResponse, AppError> {
    state
        .storage
        .delete_coupon(id)
        .await
        .map_err(storage_error(id))?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// POST /coupons
// ---------------------------------------------------------------------------

/// `POST /coupons`: create a coupon and its store.
///
/// Returns 201 with `{"id": n}` and `Location: /coupons/{n}`.
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, AppError> {
    require_json_content_type(content_type(&headers).as_deref())?;

    let new = state.codec.load_new(&parse_body(&body?)?)?;
    let stored = state.storage.insert_coupon(&new).await?;
    tracing::info!(id = stored.id, couponcode = %stored.couponcode, "coupon created");

    let created = CreatedResponse { id: stored.id };
    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, created.location())],
        Json(created),
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{body::Body, http::Request, Router};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::{
        router::build_router,
        storage::{sqlite::SqliteStorage, Storage},
    };

    use super::*;

    fn coupon_body(code: &str, expire_at: &str, published_at: &str) -> Value {
        json!({
            "category": "Coupons & Special Offers",
            "couponcode": code,
            "description": "Offer limited to in-store purchase only.",
            "merchant": "Super Sporting Goods",
            "title": "20% Off 2 Regular-Priced Items and/or 10% Off 2 Sale-Priced Items",
            "store": {
                "lat": 47.66001,
                "long": -122.31313,
                "city": "Seattle",
                "phone": "547-2445",
                "state": "Wa",
                "street": "4315 UNIVERSITY WAY N.E.",
                "zip": "98105"
            },
            "expire_at": expire_at,
            "published_at": published_at
        })
    }

    /// Three coupons: ids 1 and 3 valid, id 2 invalid.
    async fn seeded_app() -> Router {
        let storage = SqliteStorage::open_in_memory().unwrap();
        storage.create_schema(false).await.unwrap();

        let fixture = json!([
            coupon_body("60 31261", "2016-08-05T08:40:51.620Z", "2016-03-05T08:40:51.620Z"),
            coupon_body("EXPIRED", "2016-01-05T08:40:51.620Z", "2016-03-05T08:40:51.620Z"),
            coupon_body("SAME-DAY", "2016-03-05T08:40:51.620Z", "2016-03-05T08:40:51.620Z"),
        ]);
        let coupons = CouponCodec::new().load_many(&fixture).unwrap();
        storage.insert_coupons(&coupons).await.unwrap();

        build_router(Arc::new(storage))
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, headers, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn with_body(method: &str, uri: &str, content_type: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type)
            .body(body.into())
            .unwrap()
    }

    fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
        with_body(method, uri, "application/json", body.to_string())
    }

    fn ids(body: &Value) -> Vec<i64> {
        body.as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_i64().unwrap())
            .collect()
    }

    // -- Root / fallback --

    #[tokio::test]
    async fn root_returns_banner() {
        let (status, _, body) = send(seeded_app().await, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("Coupon API"));
    }

    #[tokio::test]
    async fn unknown_route_returns_json_404() {
        let (status, _, body) = send(seeded_app().await, get("/vouchers")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "no route for /vouchers"}));
    }

    #[tokio::test]
    async fn unsupported_method_returns_json_405() {
        let req = Request::builder()
            .method("PATCH")
            .uri("/coupons/1")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(seeded_app().await, req).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body, json!({"error": "method PATCH not allowed on /coupons/1"}));
    }

    // -- List --

    #[tokio::test]
    async fn list_returns_every_coupon_in_id_order() {
        let (status, _, body) = send(seeded_app().await, get("/coupons")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ids(&body), vec![1, 2, 3]);
        assert!(body[0].get("store_id").is_none());
        assert!(body[0]["store"].get("id").is_none());
        assert_eq!(body[0]["expire_at"], "2016-08-05T08:40:51.620Z");
    }

    #[tokio::test]
    async fn status_filters_partition_the_collection() {
        let app = seeded_app().await;
        let (_, _, valid) = send(app.clone(), get("/coupons?status=valid")).await;
        let (_, _, invalid) = send(app, get("/coupons?status=invalid")).await;
        assert_eq!(ids(&valid), vec![1, 3]);
        assert_eq!(ids(&invalid), vec![2]);
    }

    #[tokio::test]
    async fn repeated_filters_combine() {
        let (status, _, body) =
            send(seeded_app().await, get("/coupons?status=valid&status=invalid")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn invalid_filters_are_all_reported() {
        let (status, _, body) =
            send(seeded_app().await, get("/coupons?foo=valid&status=expired")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"error": "invalid query argument(s): foo=valid, status=expired"})
        );
    }

    #[tokio::test]
    async fn list_without_schema_is_500() {
        let storage = SqliteStorage::open_in_memory().unwrap();
        let app = build_router(Arc::new(storage));

        let (status, _, body) = send(app.clone(), get("/coupons")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("no such table: coupons"));

        // Filter resolution runs first.
        let (status, _, _) = send(app, get("/coupons?status=maybe")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // -- Get --

    #[tokio::test]
    async fn get_returns_single_coupon() {
        let (status, _, body) = send(seeded_app().await, get("/coupons/1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], 1);
        assert_eq!(body["couponcode"], "60 31261");
        assert_eq!(body["store"]["city"], "Seattle");
    }

    #[tokio::test]
    async fn malformed_ids_are_400() {
        let app = seeded_app().await;
        for raw in ["abc", "0", "-3", "1.5"] {
            let (status, _, body) = send(app.clone(), get(&format!("/coupons/{raw}"))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{raw}");
            assert!(body["error"].as_str().unwrap().contains(raw));
        }
    }

    #[tokio::test]
    async fn undecodable_id_segment_is_json_400() {
        let app = seeded_app().await;
        let delete = Request::builder()
            .method("DELETE")
            .uri("/coupons/%FF")
            .body(Body::empty())
            .unwrap();
        for req in [get("/coupons/%FF"), delete] {
            let (status, _, body) = send(app.clone(), req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(
                body,
                json!({"error": "invalid coupon id: \"%FF\" (expected a positive integer)"})
            );
        }
    }

    #[tokio::test]
    async fn missing_coupon_is_404() {
        let (status, _, body) = send(seeded_app().await, get("/coupons/21")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "coupon 21 not found"}));
    }

    // -- Update --

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let app = seeded_app().await;
        let (_, _, before) = send(app.clone(), get("/coupons/1")).await;

        let (status, _, after) = send(
            app.clone(),
            json_request("PUT", "/coupons/1", &json!({"couponcode": "UPDATED_COUPON"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let mut expected = before;
        expected["couponcode"] = json!("UPDATED_COUPON");
        assert_eq!(after, expected);

        let (_, _, stored) = send(app, get("/coupons/1")).await;
        assert_eq!(stored, expected);
    }

    #[tokio::test]
    async fn update_merges_nested_store() {
        let (status, _, body) = send(
            seeded_app().await,
            json_request("PUT", "/coupons/1", &json!({"store": {"zip": "98000"}})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["store"]["zip"], "98000");
        assert_eq!(body["store"]["city"], "Seattle");
    }

    #[tokio::test]
    async fn update_can_flip_status() {
        let app = seeded_app().await;
        let (status, _, _) = send(
            app.clone(),
            json_request(
                "PUT",
                "/coupons/2",
                &json!({"expire_at": "2017-01-05T08:40:51.620Z"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, _, invalid) = send(app, get("/coupons?status=invalid")).await;
        assert_eq!(invalid, json!([]));
    }

    #[tokio::test]
    async fn update_rejects_bad_timestamp_per_field() {
        let (status, _, body) = send(
            seeded_app().await,
            json_request(
                "PUT",
                "/coupons/1",
                &json!({"published_at": "", "expire_at": null, "title": 7}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"error": {
                "expire_at": ["Field may not be null."],
                "published_at": ["\"\" does not match format YYYY-MM-DDTHH:MM:SS.mmmZ."],
                "title": ["Not a valid string."]
            }})
        );
    }

    #[tokio::test]
    async fn update_with_wrong_media_type_is_415() {
        let (status, _, body) = send(
            seeded_app().await,
            with_body("PUT", "/coupons/1", "text/plain", r#"{"couponcode":"X"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .contains("Expected Content-Type: 'application/json'"));
    }

    #[tokio::test]
    async fn update_checks_id_then_existence_then_media_type() {
        let app = seeded_app().await;
        let (status, _, _) =
            send(app.clone(), with_body("PUT", "/coupons/abc", "text/plain", "x")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _, _) = send(app, with_body("PUT", "/coupons/99", "text/plain", "x")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_with_malformed_or_non_object_body_is_400() {
        let app = seeded_app().await;
        let (status, _, body) = send(
            app.clone(),
            with_body("PUT", "/coupons/1", "application/json", "{not json"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("invalid JSON body"));

        let (status, _, body) = send(app, json_request("PUT", "/coupons/1", &json!([1, 2]))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": {"_schema": ["Invalid input type."]}}));
    }

    #[tokio::test]
    async fn update_onto_existing_id_is_500_and_rolls_back() {
        let app = seeded_app().await;
        let (_, _, before) = send(app.clone(), get("/coupons/1")).await;

        let (status, _, body) = send(
            app.clone(),
            json_request("PUT", "/coupons/1", &json!({"id": "2", "couponcode": "X"})),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());

        let (_, _, after) = send(app, get("/coupons/1")).await;
        assert_eq!(after, before);
    }

    // -- Delete --

    #[tokio::test]
    async fn delete_twice_is_204_then_404() {
        let app = seeded_app().await;
        let req = || Request::builder().method("DELETE").uri("/coupons/2").body(Body::empty()).unwrap();

        let (status, _, body) = send(app.clone(), req()).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(body, Value::Null);

        let (status, _, _) = send(app.clone(), req()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, _, remaining) = send(app, get("/coupons")).await;
        assert_eq!(ids(&remaining), vec![1, 3]);
    }

    // -- Create --

    #[tokio::test]
    async fn create_returns_201_with_location() {
        let app = seeded_app().await;
        let payload = coupon_body("NEW", "2016-09-05T08:40:51.620Z", "2016-03-05T08:40:51.620Z");

        let (status, headers, body) =
            send(app.clone(), json_request("POST", "/coupons", &payload)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, json!({"id": 4}));
        assert_eq!(headers.get(header::LOCATION).unwrap(), "/coupons/4");

        let (_, _, stored) = send(app, get("/coupons/4")).await;
        let mut expected = payload;
        expected["id"] = json!(4);
        assert_eq!(stored, expected);
    }

    #[tokio::test]
    async fn create_aggregates_missing_fields() {
        let mut payload = coupon_body("NEW", "2016-09-05T08:40:51.620Z", "2016-03-05T08:40:51.620Z");
        payload.as_object_mut().unwrap().remove("merchant");
        payload["store"].as_object_mut().unwrap().remove("zip");

        let (status, _, body) =
            send(seeded_app().await, json_request("POST", "/coupons", &payload)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"error": {
                "merchant": ["Missing data for required field."],
                "store.zip": ["Missing data for required field."]
            }})
        );
    }

    #[tokio::test]
    async fn create_with_wrong_media_type_is_415() {
        let payload = coupon_body("NEW", "2016-09-05T08:40:51.620Z", "2016-03-05T08:40:51.620Z");
        let (status, _, body) = send(
            seeded_app().await,
            with_body("POST", "/coupons", "text/plain", payload.to_string()),
        )
        .await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(
            body,
            json!({"error": "Expected Content-Type: 'application/json', got: 'text/plain'"})
        );
    }

    #[tokio::test]
    async fn oversized_body_is_json_400() {
        let app = seeded_app().await;
        // Over axum's default 2 MB body limit.
        let huge = format!("\"{}\"", "x".repeat(3 * 1024 * 1024));
        for (method, uri) in [("POST", "/coupons"), ("PUT", "/coupons/1")] {
            let (status, _, body) =
                send(app.clone(), with_body(method, uri, "application/json", huge.clone())).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
            assert!(body["error"]
                .as_str()
                .unwrap()
                .starts_with("invalid request body"));
        }

        let (_, _, stored) = send(app, get("/coupons")).await;
        assert_eq!(ids(&stored), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn create_without_media_type_is_415() {
        let req = Request::builder()
            .method("POST")
            .uri("/coupons")
            .body(Body::from("{}"))
            .unwrap();
        let (status, _, body) = send(seeded_app().await, req).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(
            body,
            json!({"error": "Expected Content-Type: 'application/json', got: none"})
        );
    }
}
