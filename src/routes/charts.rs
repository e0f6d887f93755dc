use axum::{
    extract::{Path, State},
    Json,
};

use crate::chart::registry::ViewportCommand;
use crate::chart::ChartView;
use crate::common::AppState;
use crate::error::AppResult;

/// Pan, zoom, jump or reset a chart
///
/// Navigation survives refreshes until the chart is reset.
#[utoipa::path(
    post,
    path = "/api/charts/{chart_id}/viewport",
    params(
        ("chart_id" = String, Path, description = "Chart id (temperature, humidity, pressure, battery, battery_pct, signal)"),
    ),
    request_body = ViewportCommand,
    responses(
        (status = 200, description = "Chart re-rendered with the new viewport", body = ChartView),
        (status = 400, description = "Invalid command"),
        (status = 404, description = "Unknown chart"),
        (status = 503, description = "No data fetched yet"),
    ),
    tag = "charts"
)]
pub async fn update_viewport(
    State(state): State<AppState>,
    Path(chart_id): Path<String>,
    Json(command): Json<ViewportCommand>,
) -> AppResult<Json<ChartView>> {
    let view = state.store.apply_viewport(&chart_id, &command).await?;
    Ok(Json(view))
}
