use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::Response,
};

use crate::common::AppState;
use crate::error::{AppError, AppResult};
use crate::routes::cache;

/// Get the dashboard snapshot
///
/// Status line, per-device cards and every chart with its series and axis ranges.
#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Current dashboard state", body = crate::common::DashboardSnapshot),
    ),
    tag = "dashboard"
)]
pub async fn get_dashboard(State(state): State<AppState>) -> AppResult<Response> {
    let snapshot = state.store.snapshot().await;

    let cache_key = cache::cache_key(
        "dashboard",
        &[
            &snapshot.generation.to_string(),
            &snapshot.revision.to_string(),
        ],
    );

    if let Some(cached) = cache::get_cached(&state, &cache_key).await {
        return cache::json_response((*cached).clone(), true);
    }

    cache::cache_and_respond(&state, cache_key, &*snapshot).await
}

/// Export normalized series as CSV
///
/// One row per point: `device,field,timestamp,value`. Gaps have an empty value.
#[utoipa::path(
    get,
    path = "/api/dashboard/series.csv",
    responses(
        (status = 200, description = "CSV export of the normalized series", content_type = "text/csv"),
        (status = 503, description = "No data fetched yet"),
    ),
    tag = "dashboard"
)]
pub async fn get_series_csv(State(state): State<AppState>) -> AppResult<Response> {
    let feed = state
        .store
        .feed()
        .await
        .ok_or_else(|| AppError::ServiceUnavailable("No data has been fetched yet".to_string()))?;

    let mut writer = csv::Writer::from_writer(Vec::new());
    let csv_err = |e: csv::Error| AppError::Internal(format!("CSV encoding failed: {e}"));

    writer
        .write_record(["device", "field", "timestamp", "value"])
        .map_err(csv_err)?;
    for series in &feed.series {
        for point in &series.points {
            let timestamp = point.t.to_rfc3339();
            let value = point.v.map(|v| v.to_string()).unwrap_or_default();
            writer
                .write_record([
                    series.device.as_str(),
                    series.field.as_str(),
                    timestamp.as_str(),
                    value.as_str(),
                ])
                .map_err(csv_err)?;
        }
    }

    let body = writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("CSV encoding failed: {e}")))?;

    Response::builder()
        .header(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"))
        .header(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"series.csv\""),
        )
        .body(axum::body::Body::from(body))
        .map_err(|e| AppError::Internal(e.to_string()))
}
