use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::cards::FeedStatus;
use crate::common::AppState;

/// Health check endpoint
///
/// Returns 200 OK if the service is running.
/// This endpoint is not rate-limited and suitable for Kubernetes probes.
#[utoipa::path(
    get,
    path = "/healthz",
    responses(
        (status = 200, description = "Service is healthy"),
    ),
    tag = "health"
)]
pub async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub ready: bool,
    pub generation: u64,
    pub status: String,
}

/// Readiness check endpoint
///
/// Ready once the last refresh reached the backend, even if it returned no data.
#[utoipa::path(
    get,
    path = "/readyz",
    responses(
        (status = 200, description = "Feed reachable", body = ReadinessResponse),
        (status = 503, description = "Feed not polled yet or unreachable", body = ReadinessResponse),
    ),
    tag = "health"
)]
pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let snapshot = state.store.snapshot().await;
    let ready = matches!(
        snapshot.status,
        FeedStatus::Live { .. } | FeedStatus::NoData
    );
    let code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(ReadinessResponse {
            ready,
            generation: snapshot.generation,
            status: snapshot.status_text.clone(),
        }),
    )
}
