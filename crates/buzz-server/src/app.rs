// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! HTTP routes: buzz intake, ranked listing, admin clear and health.

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use buzz_core::{AdminGate, OrderingEngine, Submission};
use buzz_proto::{BuzzRecord, ClearedBody, HealthBody};
use serde_json::Value;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::error::ApiError;
use crate::ws;

const SERVICE_NAME: &str = "BUZZ IT API";

/// Shared by every handler.
pub(crate) struct AppState {
    pub engine: OrderingEngine,
    pub gate: AdminGate,
    /// `None` accepts any origin.
    pub allow_origins: Option<HashSet<String>>,
}

impl AppState {
    pub(crate) fn new(engine: OrderingEngine, gate: AdminGate, origins: &[String]) -> Self {
        let allow_origins = if origins.is_empty() || origins.iter().any(|o| o == "*") {
            None
        } else {
            Some(origins.iter().cloned().collect())
        };
        Self {
            engine,
            gate,
            allow_origins,
        }
    }
}

pub(crate) fn router(state: Arc<AppState>) -> Router {
    let buzz = get(list_buzzes).post(create_buzz).delete(clear_buzzes);
    let cors = cors_layer(state.allow_origins.as_ref());
    Router::new()
        .route("/", get(health))
        .route("/buzz", buzz.clone())
        .route("/api/buzz", buzz)
        .route("/ws", get(ws::ws_handler))
        .fallback(not_found)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: Option<&HashSet<String>>) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);
    match origins {
        None => layer.allow_origin(AnyOrigin),
        Some(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(err) => {
                        warn!(?err, origin = %origin, "ignoring unusable origin");
                        None
                    }
                })
                .collect();
            layer.allow_origin(AllowOrigin::list(values))
        }
    }
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| err.downcast_ref::<String>().cloned())
        .unwrap_or_default();
    error!(panic = %detail, "handler panicked");
    ApiError::Internal.into_response()
}

/// Run store work off the async workers.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|err| {
        error!(?err, "blocking task failed");
        ApiError::Internal
    })
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthBody>, ApiError> {
    let engine = state.engine.clone();
    let records = blocking(move || engine.count())
        .await?
        .map_err(|err| ApiError::from_buzz(err, "Failed to fetch buzzes"))?;
    Ok(Json(HealthBody {
        status: "ok".into(),
        service: SERVICE_NAME.into(),
        records,
        subscribers: state.engine.hub().subscriber_count(),
    }))
}

async fn create_buzz(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<BuzzRecord>), ApiError> {
    let value: Value = serde_json::from_slice(&body)
        .map_err(|_| ApiError::BadRequest("request body must be a JSON object".into()))?;
    let submission = Submission::from_json(&value).map_err(|err| {
        warn!(%err, "buzz rejected");
        ApiError::BadRequest(err.to_string())
    })?;
    let engine = state.engine.clone();
    let record = blocking(move || engine.accept(submission))
        .await?
        .map_err(|err| ApiError::from_buzz(err, "Failed to store buzz"))?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_buzzes(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<BuzzRecord>>, ApiError> {
    let engine = state.engine.clone();
    let records = blocking(move || engine.list())
        .await?
        .map_err(|err| ApiError::from_buzz(err, "Failed to fetch buzzes"))?;
    Ok(Json(records))
}

async fn clear_buzzes(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ClearedBody>, ApiError> {
    let authorization = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let grant = state.gate.authorize(authorization).map_err(|err| {
        warn!(%err, "clear rejected");
        ApiError::Unauthorized
    })?;
    let engine = state.engine.clone();
    let cleared = blocking(move || engine.clear_all(grant))
        .await?
        .map_err(|err| ApiError::from_buzz(err, "Failed to clear buzzes"))?;
    Ok(Json(ClearedBody {
        message: "All buzz records cleared".into(),
        cleared,
    }))
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use buzz_core::{BroadcastHub, NewRecord, RecordStore, StorageError};
    use buzz_proto::HubEvent;
    use tower::ServiceExt;

    const TOKEN: &str = "s3cret";

    fn app_with(engine: OrderingEngine) -> Router {
        router(Arc::new(AppState::new(
            engine,
            AdminGate::new(TOKEN),
            &["http://localhost:5173".to_string()],
        )))
    }

    async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    fn delete(auth: Option<&str>) -> Request<Body> {
        let mut req = Request::delete("/buzz");
        if let Some(auth) = auth {
            req = req.header(AUTHORIZATION, auth);
        }
        req.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn post_returns_created_record_and_broadcasts() {
        let engine = OrderingEngine::in_memory();
        let mut sub = engine.hub().subscribe();
        let app = app_with(engine);

        let (status, body) = send(
            &app,
            post("/buzz", r#"{"teamName":"  Alpha ","timestamp":1704459849007}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["teamName"], "Alpha");
        assert_eq!(body["timestamp"], 1_704_459_849_007_i64);
        assert_eq!(body["time"], "13:04:09.007");
        assert_eq!(body["date"], "Jan 05, 2024");
        assert_eq!(body["id"], 1);

        match sub.try_recv() {
            Some(HubEvent::NewBuzz(record)) => assert_eq!(record.team_name, "Alpha"),
            other => panic!("expected new-buzz, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_submissions_are_rejected_with_message() {
        let app = app_with(OrderingEngine::in_memory());
        let cases = [
            (r#"{"teamName":"   ","timestamp":1}"#, "teamName is required"),
            (r#"{"timestamp":1}"#, "teamName is required"),
            (r#"{"teamName":"A","timestamp":"soon"}"#, "timestamp must be a number"),
        ];
        for (body, expected) in cases {
            let (status, json) = send(&app, post("/buzz", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
            assert_eq!(json["message"], expected, "{body}");
        }

        let (status, json) = send(&app, post("/buzz", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(json["message"].is_string());

        let (_, listed) = send(&app, get_req("/buzz")).await;
        assert_eq!(listed, Value::Array(Vec::new()));
    }

    #[tokio::test]
    async fn list_is_ranked_by_press_time_on_both_mounts() {
        let app = app_with(OrderingEngine::in_memory());
        send(&app, post("/buzz", r#"{"teamName":"Alpha","timestamp":1000}"#)).await;
        send(&app, post("/api/buzz", r#"{"teamName":"Beta","timestamp":500}"#)).await;

        for uri in ["/buzz", "/api/buzz"] {
            let (status, body) = send(&app, get_req(uri)).await;
            assert_eq!(status, StatusCode::OK);
            let names: Vec<&str> = body
                .as_array()
                .unwrap()
                .iter()
                .map(|r| r["teamName"].as_str().unwrap())
                .collect();
            assert_eq!(names, ["Beta", "Alpha"], "{uri}");
        }
    }

    #[tokio::test]
    async fn clear_requires_admin_token() {
        let app = app_with(OrderingEngine::in_memory());
        send(&app, post("/buzz", r#"{"teamName":"A","timestamp":1}"#)).await;
        send(&app, post("/buzz", r#"{"teamName":"B","timestamp":2}"#)).await;

        for auth in [None, Some("Bearer nope"), Some(TOKEN)] {
            let (status, body) = send(&app, delete(auth)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{auth:?}");
            assert_eq!(body["message"], "Unauthorized");
        }
        let (_, listed) = send(&app, get_req("/buzz")).await;
        assert_eq!(listed.as_array().unwrap().len(), 2);

        let (status, body) = send(&app, delete(Some("Bearer s3cret"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "All buzz records cleared");
        assert_eq!(body["cleared"], 2);

        let (_, listed) = send(&app, get_req("/buzz")).await;
        assert_eq!(listed, Value::Array(Vec::new()));
    }

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let app = app_with(OrderingEngine::in_memory());
        let (status, body) = send(&app, get_req("/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Not Found");
    }

    #[tokio::test]
    async fn health_reports_counts() {
        let engine = OrderingEngine::in_memory();
        let _sub = engine.hub().subscribe();
        let app = app_with(engine);
        send(&app, post("/buzz", r#"{"teamName":"A","timestamp":1}"#)).await;

        let (status, body) = send(&app, get_req("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["service"], SERVICE_NAME);
        assert_eq!(body["records"], 1);
        assert_eq!(body["subscribers"], 1);
    }

    struct FailingStore;

    impl RecordStore for FailingStore {
        fn create(&self, _new: NewRecord) -> Result<BuzzRecord, StorageError> {
            Err(StorageError::Poisoned)
        }
        fn all(&self) -> Result<Vec<BuzzRecord>, StorageError> {
            Err(StorageError::Poisoned)
        }
        fn clear(&self) -> Result<usize, StorageError> {
            Err(StorageError::Poisoned)
        }
        fn count(&self) -> Result<usize, StorageError> {
            Err(StorageError::Poisoned)
        }
    }

    #[tokio::test]
    async fn storage_failures_name_the_operation() {
        let engine = OrderingEngine::new(Arc::new(FailingStore), BroadcastHub::default());
        let app = app_with(engine);

        let (status, body) = send(&app, post("/buzz", r#"{"teamName":"A","timestamp":1}"#)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to store buzz");
        assert!(body["error"].is_string());

        let (status, body) = send(&app, get_req("/buzz")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to fetch buzzes");

        let (status, body) = send(&app, delete(Some("Bearer s3cret"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to clear buzzes");
    }
}
