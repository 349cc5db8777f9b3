//! HTTP trigger surface.
//!
//! `GET|POST /process-email-outbox?limit=N` runs one invocation after the
//! `x-cron-secret` header is checked. `GET /health` needs no secret.

use crate::app::AppState;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use email_outbox::clamp_limit;
use serde::Deserialize;
use serde_json::{json, Value};
use subtle::ConstantTimeEq;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

/// Header carrying the shared secret.
pub const CRON_SECRET_HEADER: &str = "x-cron-secret";

/// Build the router. Methods other than GET and POST get `405`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/process-email-outbox",
            get(process_outbox).post(process_outbox),
        )
        .route("/health", get(health))
        .with_state(state)
}

/// Query string of the trigger. `limit` stays raw so bad input falls back.
#[derive(Debug, Default, Deserialize)]
struct TriggerQuery {
    limit: Option<String>,
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn process_outbox(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<TriggerQuery>, QueryRejection>,
) -> (StatusCode, Json<Value>) {
    let invocation_id = Uuid::new_v4();

    let provided = headers
        .get(CRON_SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    if !secret_matches(provided, &state.cron_secret) {
        warn!(%invocation_id, "Rejected trigger with missing or wrong secret");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "success": false, "error": "unauthorized" })),
        );
    }

    let query = query.map(|Query(query)| query).unwrap_or_default();
    let limit = parse_limit(query.limit.as_deref());
    info!(%invocation_id, limit, "Outbox invocation triggered");

    let span = tracing::info_span!("invocation", %invocation_id);
    match state.dispatcher.run(limit).instrument(span).await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({ "success": true, "processed": report.processed })),
        ),
        Err(e) => {
            error!(%invocation_id, error = %e, "Outbox invocation failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": e.to_string() })),
            )
        }
    }
}

/// Compare in constant time. An empty expected secret never matches.
fn secret_matches(provided: Option<&str>, expected: &str) -> bool {
    match provided {
        Some(provided) if !expected.is_empty() => {
            provided.as_bytes().ct_eq(expected.as_bytes()).into()
        }
        _ => false,
    }
}

/// Clamp a decoded `limit` value. Anything unparseable means default.
fn parse_limit(raw: Option<&str>) -> usize {
    clamp_limit(raw.and_then(|value| value.trim().parse::<i64>().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_support::{dispatcher_for, seeded_store};
    use axum::body::Body;
    use axum::http::{Method, Request};
    use email_outbox::{OutboxStatus, DEFAULT_CLAIM_LIMIT, MAX_CLAIM_LIMIT};
    use outbox_store::InMemoryOutboxStore;
    use std::sync::Arc;
    use tower::ServiceExt;

    const SECRET: &str = "cron-secret";

    fn app(store: Arc<InMemoryOutboxStore>) -> Router {
        router(AppState::new(dispatcher_for(store), SECRET))
    }

    fn trigger(method: Method, uri: &str, secret: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(secret) = secret {
            builder = builder.header(CRON_SECRET_HEADER, secret);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[test]
    fn test_parse_limit() {
        assert_eq!(parse_limit(None), DEFAULT_CLAIM_LIMIT);
        assert_eq!(parse_limit(Some("5")), 5);
        assert_eq!(parse_limit(Some(" 7 ")), 7);
        assert_eq!(parse_limit(Some("0")), 1);
        assert_eq!(parse_limit(Some("500")), MAX_CLAIM_LIMIT);
        assert_eq!(parse_limit(Some("abc")), DEFAULT_CLAIM_LIMIT);
        assert_eq!(parse_limit(Some("")), DEFAULT_CLAIM_LIMIT);
    }

    #[test]
    fn test_secret_matches() {
        assert!(secret_matches(Some("abc"), "abc"));
        assert!(!secret_matches(Some("abd"), "abc"));
        assert!(!secret_matches(Some("abcd"), "abc"));
        assert!(!secret_matches(None, "abc"));
        assert!(!secret_matches(Some(""), ""));
    }

    #[tokio::test]
    async fn test_health_needs_no_secret() {
        let (status, body) = call(
            app(seeded_store(0)),
            trigger(Method::GET, "/health", None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn test_missing_secret_is_rejected_without_store_access() {
        let store = seeded_store(3);
        let (status, body) = call(
            app(store.clone()),
            trigger(Method::POST, "/process-email-outbox", None),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "success": false, "error": "unauthorized" }));
        assert_eq!(store.claim_calls().await, 0);
        assert_eq!(store.record_calls().await, 0);
    }

    #[tokio::test]
    async fn test_wrong_secret_is_rejected() {
        let store = seeded_store(3);
        let (status, _) = call(
            app(store.clone()),
            trigger(Method::GET, "/process-email-outbox", Some("nope")),
        )
        .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(store.claim_calls().await, 0);
    }

    #[tokio::test]
    async fn test_authorized_trigger_processes_batch() {
        let store = seeded_store(3);
        let (status, body) = call(
            app(store.clone()),
            trigger(Method::POST, "/process-email-outbox", Some(SECRET)),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "processed": 3 }));
        let items = store.items().await;
        assert!(items.iter().all(|item| item.status == OutboxStatus::Sent));
    }

    #[tokio::test]
    async fn test_limit_query_is_honored() {
        let store = seeded_store(15);
        let (_, body) = call(
            app(store.clone()),
            trigger(Method::GET, "/process-email-outbox?limit=4", Some(SECRET)),
        )
        .await;
        assert_eq!(body["processed"], 4);
    }

    #[tokio::test]
    async fn test_percent_encoded_limit_is_decoded() {
        let store = seeded_store(15);
        let (_, body) = call(
            app(store),
            trigger(Method::GET, "/process-email-outbox?foo=1&limit=%35", Some(SECRET)),
        )
        .await;
        assert_eq!(body["processed"], 5);
    }

    #[tokio::test]
    async fn test_malformed_query_uses_default_limit() {
        let store = seeded_store(15);
        let (status, body) = call(
            app(store),
            trigger(Method::GET, "/process-email-outbox?limit=%ZZ&&=", Some(SECRET)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["processed"], DEFAULT_CLAIM_LIMIT);
    }

    #[tokio::test]
    async fn test_non_integer_limit_uses_default() {
        let store = seeded_store(15);
        let (_, body) = call(
            app(store),
            trigger(Method::GET, "/process-email-outbox?limit=lots", Some(SECRET)),
        )
        .await;
        assert_eq!(body["processed"], DEFAULT_CLAIM_LIMIT);
    }

    #[tokio::test]
    async fn test_oversized_limit_is_clamped() {
        let store = seeded_store(25);
        let (_, body) = call(
            app(store),
            trigger(Method::GET, "/process-email-outbox?limit=100", Some(SECRET)),
        )
        .await;
        assert_eq!(body["processed"], MAX_CLAIM_LIMIT);
    }

    #[tokio::test]
    async fn test_empty_outbox_reports_zero() {
        let (status, body) = call(
            app(seeded_store(0)),
            trigger(Method::GET, "/process-email-outbox", Some(SECRET)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "success": true, "processed": 0 }));
    }

    #[tokio::test]
    async fn test_other_methods_are_not_allowed() {
        let (status, _) = call(
            app(seeded_store(1)),
            trigger(Method::PUT, "/process-email-outbox", Some(SECRET)),
        )
        .await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_claim_failure_returns_500() {
        let store = seeded_store(2);
        store.fail_claims_with("connection refused").await;

        let (status, body) = call(
            app(store.clone()),
            trigger(Method::POST, "/process-email-outbox", Some(SECRET)),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().contains("connection refused"));
        assert_eq!(store.record_calls().await, 0);
    }
}
