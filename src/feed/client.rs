use reqwest::Client;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::feed::models::{CleanupResponse, FeedPayload};

pub struct FeedClient {
    http_client: Client,
    base_url: String,
}

impl FeedClient {
    /// Build a client for the backend at `config.feed_base_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.feed_timeout_seconds))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: config.feed_base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Where the backend serves its CSV export. The service only points browsers at it.
    #[must_use]
    pub fn export_url(&self) -> String {
        format!("{}/api/export", self.base_url)
    }

    /// Fetch the reading history.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Feed` if the request fails, returns an error status, or the body is
    /// not a history payload.
    pub async fn get_history(&self) -> AppResult<FeedPayload> {
        let url = format!("{}/api/history", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| AppError::Feed(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Feed(format!(
                "HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| AppError::Feed(format!("Failed to get response text: {e}")))?;

        FeedPayload::from_body(&text).inspect_err(|e| {
            tracing::error!(
                error = %e,
                body_preview = %text.chars().take(500).collect::<String>(),
                "Failed to parse history response"
            );
        })
    }

    /// Ask the backend to delete aged records.
    ///
    /// A non-success `status` in the body is returned as-is; the caller decides what it means.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Feed` if the request fails, returns an error status without a
    /// readable message, or the body cannot be parsed.
    pub async fn post_cleanup(&self) -> AppResult<CleanupResponse> {
        let url = format!("{}/api/cleanup", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .send()
            .await
            .map_err(|e| AppError::Feed(format!("Request failed: {e}")))?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        match serde_json::from_str::<CleanupResponse>(&text) {
            Ok(body) => Ok(body),
            Err(_) if !status.is_success() => {
                Err(AppError::Feed(format!("HTTP {status}: {text}")))
            }
            Err(e) => Err(AppError::Feed(format!("Failed to parse response: {e}"))),
        }
    }
}
