pub mod cache;
pub mod charts;
pub mod dashboard;
pub mod feed;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::common::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthz,
        health::readyz,
        dashboard::get_dashboard,
        dashboard::get_series_csv,
        charts::update_viewport,
        feed::cleanup,
        feed::export,
    ),
    components(
        schemas(
            health::ReadinessResponse,
            crate::common::DashboardSnapshot,
            crate::cards::FeedStatus,
            crate::cards::DeviceCards,
            crate::cards::CardValue,
            crate::cards::CardState,
            crate::cards::SignalQuality,
            crate::cards::SignalBand,
            crate::chart::ChartView,
            crate::chart::Dataset,
            crate::chart::axis::AxisRange,
            crate::chart::axis::TimeWindow,
            crate::chart::axis::RangeSource,
            crate::chart::registry::ViewportCommand,
            crate::normalize::SeriesPoint,
            crate::feed::CleanupResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "dashboard", description = "Normalized series, axis ranges and cards"),
        (name = "charts", description = "Chart navigation"),
        (name = "feed", description = "Backend maintenance passthrough"),
    ),
    info(
        title = "Feed Dash API",
        description = "Telemetry feed normalizer and chart-ready dashboard API",
        version = "0.1.0"
    )
)]
struct ApiDoc;

pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    let api_routes_base = Router::new()
        .route("/dashboard", get(dashboard::get_dashboard))
        .route("/dashboard/series.csv", get(dashboard::get_series_csv))
        .route("/charts/{chart_id}/viewport", post(charts::update_viewport))
        .route("/cleanup", post(feed::cleanup))
        .route("/export", get(feed::export));

    let limiter = if config.disable_rate_limiting {
        tracing::warn!("Rate limiting DISABLED");
        None
    } else {
        let built = GovernorConfigBuilder::default()
            .key_extractor(SmartIpKeyExtractor)
            .per_second(config.rate_limit_per_second)
            .burst_size(config.rate_limit_burst)
            .finish();
        if built.is_none() {
            tracing::warn!(
                per_second = config.rate_limit_per_second,
                burst = config.rate_limit_burst,
                "Invalid rate limit settings, rate limiting DISABLED"
            );
        }
        built
    };

    let api_routes = match limiter {
        Some(limiter) => {
            tracing::info!(
                rate = %format!("{}/s burst {}", config.rate_limit_per_second, config.rate_limit_burst),
                "Rate limiting configured"
            );
            api_routes_base.layer(GovernorLayer {
                config: Arc::new(limiter),
            })
        }
        None => api_routes_base,
    }
    .layer(RequestBodyLimitLayer::new(64 * 1024)); // viewport commands are tiny

    // Health check routes (NO rate limiting)
    let health_routes = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz));

    // OpenAPI documentation
    let docs_routes = Router::new().merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(docs_routes)
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
