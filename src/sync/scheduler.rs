use std::time::Duration;
use tokio::time::interval;

use crate::common::AppState;
use crate::sync::worker;

/// Poll the history feed on a schedule.
///
/// Every tick spawns its own refresh, so a slow backend never delays the timer. Responses that
/// resolve out of order are sorted out by the store's generation check.
pub async fn run_feed_poll(state: AppState) {
    let interval_secs = state.config.poll_interval_seconds;
    let base_url = state.feed_client.base_url().to_string();

    tracing::info!(interval_secs, base_url = %base_url, "Starting history poll scheduler");

    let mut ticker = interval(Duration::from_secs(interval_secs));

    loop {
        // First tick completes immediately
        ticker.tick().await;

        let generation = state.store.begin_refresh();
        tracing::debug!(generation, "Polling history feed...");

        let client = state.feed_client.clone();
        let store = state.store.clone();
        tokio::spawn(async move {
            worker::refresh_generation(&client, &store, generation).await;
        });
    }
}
