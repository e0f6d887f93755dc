use crate::common::{ApplyOutcome, DashboardStore};
use crate::error::{AppError, AppResult};
use crate::feed::{CleanupResponse, FeedClient};

/// Run one refresh cycle under a fresh generation.
pub async fn refresh_dashboard(client: &FeedClient, store: &DashboardStore) -> ApplyOutcome {
    let generation = store.begin_refresh();
    refresh_generation(client, store, generation).await
}

/// Fetch the history and hand the result to the store under `generation`.
///
/// Failures never propagate: they become the "connection failed" status and the next tick
/// tries again.
pub async fn refresh_generation(
    client: &FeedClient,
    store: &DashboardStore,
    generation: u64,
) -> ApplyOutcome {
    let outcome = match client.get_history().await {
        Ok(payload) => {
            if payload.is_empty() {
                tracing::info!(generation, "History feed returned no data");
            }
            store.apply_payload(generation, payload).await
        }
        Err(e) => {
            tracing::error!(error = %e, generation, "Failed to fetch history");
            store.apply_failure(generation, e.to_string()).await
        }
    };

    if let ApplyOutcome::Stale { newest } = outcome {
        tracing::warn!(
            generation,
            newest,
            "History response arrived after a newer one, discarded"
        );
    }
    outcome
}

/// Trigger the backend cleanup and refresh right away when it succeeds.
///
/// # Errors
///
/// Returns `AppError::Feed` if the request fails or the backend reports a failure.
pub async fn cleanup(client: &FeedClient, store: &DashboardStore) -> AppResult<CleanupResponse> {
    let response = client.post_cleanup().await?;

    if !response.is_success() {
        tracing::warn!(
            status = %response.status,
            message = %response.message,
            "Cleanup rejected by backend"
        );
        let message = if response.message.is_empty() {
            format!("cleanup failed with status '{}'", response.status)
        } else {
            response.message
        };
        return Err(AppError::Feed(message));
    }

    tracing::info!(message = %response.message, "Cleanup completed, refreshing");
    refresh_dashboard(client, store).await;
    Ok(response)
}
