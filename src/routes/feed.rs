use axum::{extract::State, response::Redirect, Json};

use crate::common::AppState;
use crate::error::AppResult;
use crate::feed::CleanupResponse;
use crate::sync::worker;

/// Delete aged records on the backend
///
/// Forwards to the backend cleanup endpoint; on success the dashboard is refreshed before
/// responding.
#[utoipa::path(
    post,
    path = "/api/cleanup",
    responses(
        (status = 200, description = "Cleanup done", body = CleanupResponse),
        (status = 502, description = "Backend unreachable or cleanup failed"),
    ),
    tag = "feed"
)]
pub async fn cleanup(State(state): State<AppState>) -> AppResult<Json<CleanupResponse>> {
    let response = worker::cleanup(&state.feed_client, &state.store).await?;
    Ok(Json(response))
}

/// Download the backend export
///
/// Redirects to the backend, which owns the file format.
#[utoipa::path(
    get,
    path = "/api/export",
    responses(
        (status = 307, description = "Redirect to the backend export"),
    ),
    tag = "feed"
)]
pub async fn export(State(state): State<AppState>) -> Redirect {
    Redirect::temporary(&state.feed_client.export_url())
}
