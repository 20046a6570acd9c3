use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ordermart_core::{EtlRunner, StorageEvent};
use serde_json::{json, Value};
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    runner: EtlRunner,
}

impl AppState {
    pub fn new(runner: EtlRunner) -> Self {
        Self { runner }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(receive_event))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn bad_request(message: String) -> Response {
    warn!(error = %message, "rejected event");
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

/// Accepts a storage CloudEvent in binary or structured mode and runs the transform for
/// it. Failed runs answer 200 unless failures are surfaced.
async fn receive_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(err) => return bad_request(format!("invalid JSON body: {err}")),
    };
    let event = match StorageEvent::from_cloud_event(
        &payload,
        header(&headers, "ce-id"),
        header(&headers, "ce-type"),
    ) {
        Ok(event) => event,
        Err(err) => return bad_request(format!("invalid storage event: {err}")),
    };

    let report = state.runner.run_event(&event).await;
    let status = if !report.succeeded() && state.runner.config().surface_failures {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (status, Json(report)).into_response()
}
