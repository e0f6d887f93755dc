//! Refresh cycle tests against a fake history backend served on a local port.
//!
//! Run with: cargo test --test sync_test

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Router};
use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

use feed_dash::cards::FeedStatus;
use feed_dash::chart::axis::{AxisRange, RangeSource};
use feed_dash::chart::registry::ViewportCommand;
use feed_dash::common::{ApplyOutcome, DashboardStore};
use feed_dash::config::Config;
use feed_dash::error::AppError;
use feed_dash::feed::{FeedClient, FeedPayload};
use feed_dash::sync::worker;

#[derive(Clone)]
struct Backend {
    history: Arc<Mutex<(StatusCode, String)>>,
    cleanup: Arc<Mutex<(StatusCode, String)>>,
    history_hits: Arc<AtomicUsize>,
}

impl Backend {
    fn new(history: serde_json::Value) -> Self {
        Self {
            history: Arc::new(Mutex::new((StatusCode::OK, history.to_string()))),
            cleanup: Arc::new(Mutex::new((
                StatusCode::OK,
                json!({"status": "success", "message": "Deleted 3 records"}).to_string(),
            ))),
            history_hits: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn set_history(&self, status: StatusCode, body: &str) {
        *self.history.lock().unwrap() = (status, body.to_string());
    }

    fn set_cleanup(&self, status: StatusCode, body: &str) {
        *self.cleanup.lock().unwrap() = (status, body.to_string());
    }

    /// Serve on an ephemeral port and return the base URL.
    async fn serve(&self) -> String {
        async fn history(State(b): State<Backend>) -> (StatusCode, String) {
            b.history_hits.fetch_add(1, Ordering::SeqCst);
            b.history.lock().unwrap().clone()
        }
        async fn cleanup(State(b): State<Backend>) -> (StatusCode, String) {
            b.cleanup.lock().unwrap().clone()
        }

        let app = Router::new()
            .route("/api/history", get(history))
            .route("/api/cleanup", post(cleanup))
            .with_state(self.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}

fn sample_history() -> serde_json::Value {
    json!([
        {"timestamp": "2024-01-01T12:05:00Z", "t1": 21.5, "rssi": -70},
        {"timestamp": "2024-01-01T12:00:00Z", "t1": -127, "rssi": -72},
    ])
}

fn setup(base_url: String) -> (FeedClient, DashboardStore) {
    let config = Config {
        feed_base_url: base_url,
        feed_timeout_seconds: 5,
        ..Config::default()
    };
    let client = FeedClient::new(&config).unwrap();
    (client, DashboardStore::from_config(&config))
}

/// A base URL nothing listens on.
async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

#[tokio::test]
async fn refresh_publishes_normalized_charts() {
    let backend = Backend::new(sample_history());
    let (client, store) = setup(backend.serve().await);

    assert_eq!(
        worker::refresh_dashboard(&client, &store).await,
        ApplyOutcome::Applied
    );

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.generation, 1);
    assert_eq!(
        snapshot.status,
        FeedStatus::Live {
            latest: Utc.with_ymd_and_hms(2024, 1, 1, 12, 5, 0).unwrap()
        }
    );
    assert_eq!(snapshot.status_text, "Synced: 12:05:00");

    let temperature = snapshot
        .charts
        .iter()
        .find(|c| c.id == "temperature")
        .unwrap();
    let values: Vec<Option<f64>> = temperature.datasets[0].points.iter().map(|p| p.v).collect();
    assert_eq!(values, vec![None, Some(21.5)]);
    assert_eq!(temperature.y, AxisRange::new(20.0, 23.0));
    assert_eq!(temperature.y_source, RangeSource::Dynamic);

    assert_eq!(snapshot.devices.len(), 1);
    assert_eq!(snapshot.devices[0].values[0].text, "21.5 °C");
}

#[tokio::test]
async fn failed_refresh_keeps_previous_charts() {
    let backend = Backend::new(sample_history());
    let (client, store) = setup(backend.serve().await);

    worker::refresh_dashboard(&client, &store).await;
    let before = store.snapshot().await;

    backend.set_history(StatusCode::INTERNAL_SERVER_ERROR, "boom");
    worker::refresh_dashboard(&client, &store).await;
    let after = store.snapshot().await;

    assert!(matches!(after.status, FeedStatus::ConnectionFailed { .. }));
    assert!(after.status_text.starts_with("Connection failed:"));
    assert_eq!(after.generation, 2);
    assert_eq!(after.charts, before.charts);
    assert_eq!(after.devices, before.devices);
    assert!(store.feed().await.is_some());
}

#[tokio::test]
async fn unreachable_backend_reports_connection_failure() {
    let (client, store) = setup(closed_port_url().await);

    worker::refresh_dashboard(&client, &store).await;

    let snapshot = store.snapshot().await;
    assert!(matches!(snapshot.status, FeedStatus::ConnectionFailed { .. }));
    // Charts still render on their fallback ranges
    assert!(snapshot
        .charts
        .iter()
        .all(|c| c.datasets.is_empty() && c.x.is_none()));
}

#[tokio::test]
async fn malformed_body_is_a_failure() {
    let backend = Backend::new(sample_history());
    backend.set_history(StatusCode::OK, "\"not a history\"");
    let (client, store) = setup(backend.serve().await);

    worker::refresh_dashboard(&client, &store).await;

    assert!(matches!(
        store.snapshot().await.status,
        FeedStatus::ConnectionFailed { .. }
    ));
}

#[tokio::test]
async fn empty_feed_sets_no_data_and_keeps_charts() {
    let backend = Backend::new(sample_history());
    let (client, store) = setup(backend.serve().await);

    worker::refresh_dashboard(&client, &store).await;
    let before = store.snapshot().await;

    backend.set_history(StatusCode::OK, "null");
    worker::refresh_dashboard(&client, &store).await;
    let after = store.snapshot().await;

    assert_eq!(after.status, FeedStatus::NoData);
    assert_eq!(after.status_text, "No data yet");
    assert_eq!(after.charts, before.charts);
    assert!(after.devices.iter().all(|d| d.values.is_empty()));
    // The last non-empty feed is still available for navigation and export
    assert_eq!(store.feed().await.unwrap().reading_count(), 2);
}

#[tokio::test]
async fn stale_generation_is_discarded() {
    let (_client, store) = setup(closed_port_url().await);

    let older = store.begin_refresh();
    let newer = store.begin_refresh();
    assert!(newer > older);

    let newer_payload = FeedPayload::from_value(json!([
        {"timestamp": "2024-01-01T13:00:00Z", "t1": 30.0}
    ]))
    .unwrap();
    let older_payload = FeedPayload::from_value(json!([
        {"timestamp": "2024-01-01T12:00:00Z", "t1": 10.0}
    ]))
    .unwrap();

    assert_eq!(
        store.apply_payload(newer, newer_payload).await,
        ApplyOutcome::Applied
    );
    assert_eq!(
        store.apply_payload(older, older_payload).await,
        ApplyOutcome::Stale { newest: newer }
    );
    assert_eq!(
        store.apply_failure(older, "late timeout".to_string()).await,
        ApplyOutcome::Stale { newest: newer }
    );

    let snapshot = store.snapshot().await;
    assert_eq!(snapshot.generation, newer);
    assert_eq!(
        snapshot.status,
        FeedStatus::Live {
            latest: Utc.with_ymd_and_hms(2024, 1, 1, 13, 0, 0).unwrap()
        }
    );
}

#[tokio::test]
async fn navigation_survives_refresh_until_reset() {
    let backend = Backend::new(sample_history());
    let (client, store) = setup(backend.serve().await);

    worker::refresh_dashboard(&client, &store).await;
    let panned = store
        .apply_viewport("temperature", &ViewportCommand::Pan { seconds: -3600 })
        .await
        .unwrap();
    let window = panned.x.unwrap();
    assert_eq!(
        window.end,
        Utc.with_ymd_and_hms(2024, 1, 1, 11, 5, 0).unwrap()
    );

    // New data arrives; the navigated window stays put
    backend.set_history(
        StatusCode::OK,
        &json!([
            {"timestamp": "2024-01-01T12:00:00Z", "t1": 20.0},
            {"timestamp": "2024-01-01T12:30:00Z", "t1": 22.0},
        ])
        .to_string(),
    );
    worker::refresh_dashboard(&client, &store).await;
    let snapshot = store.snapshot().await;
    let temperature = snapshot
        .charts
        .iter()
        .find(|c| c.id == "temperature")
        .unwrap();
    assert_eq!(temperature.x, Some(window));
    assert_eq!(snapshot.revision, 1);

    let reset = store
        .apply_viewport("temperature", &ViewportCommand::Reset)
        .await
        .unwrap();
    let fresh = reset.x.unwrap();
    assert_eq!(
        fresh.end,
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap()
    );
    assert_eq!(fresh.width(), Duration::minutes(360));
}

#[tokio::test]
async fn viewport_errors() {
    let (_client, store) = setup(closed_port_url().await);

    assert!(matches!(
        store
            .apply_viewport("rainfall", &ViewportCommand::Reset)
            .await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        store
            .apply_viewport("temperature", &ViewportCommand::Reset)
            .await,
        Err(AppError::ServiceUnavailable(_))
    ));
}

#[tokio::test]
async fn cleanup_success_triggers_refresh() {
    let backend = Backend::new(sample_history());
    let (client, store) = setup(backend.serve().await);

    let response = tokio_test::assert_ok!(worker::cleanup(&client, &store).await);
    assert!(response.is_success());
    assert_eq!(response.message, "Deleted 3 records");

    assert_eq!(backend.history_hits.load(Ordering::SeqCst), 1);
    assert_eq!(store.snapshot().await.generation, 1);
}

#[tokio::test]
async fn cleanup_failure_is_reported_without_refresh() {
    let backend = Backend::new(sample_history());
    backend.set_cleanup(
        StatusCode::INTERNAL_SERVER_ERROR,
        &json!({"status": "error", "message": "disk full"}).to_string(),
    );
    let (client, store) = setup(backend.serve().await);

    let err = tokio_test::assert_err!(worker::cleanup(&client, &store).await);
    assert!(matches!(&err, AppError::Feed(msg) if msg == "disk full"));
    assert_eq!(backend.history_hits.load(Ordering::SeqCst), 0);

    backend.set_cleanup(StatusCode::BAD_GATEWAY, "<html>proxy error</html>");
    let err = tokio_test::assert_err!(worker::cleanup(&client, &store).await);
    assert!(matches!(err, AppError::Feed(_)));
}
