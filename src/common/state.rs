use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

use crate::common::store::DashboardStore;
use crate::config::Config;
use crate::feed::FeedClient;

/// Serialized response body, shared between cache hits.
#[derive(Clone)]
pub struct CachedResponse {
    pub data: Arc<Vec<u8>>,
}

/// Cache for API responses. Key is generation + viewport revision, value is the serialized body.
/// Weighted by byte size to enforce memory limit.
pub type ResponseCache = Cache<String, CachedResponse>;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub feed_client: Arc<FeedClient>,
    pub store: Arc<DashboardStore>,
    pub response_cache: ResponseCache,
}

impl AppState {
    pub fn new(config: Config, feed_client: FeedClient) -> Self {
        // Cache weighted by byte size, not entry count
        let cache: ResponseCache = Cache::builder()
            .weigher(|_key: &String, value: &CachedResponse| -> u32 {
                value.data.len().try_into().unwrap_or(u32::MAX)
            })
            .max_capacity(config.cache_max_bytes)
            .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
            .build();

        Self {
            store: Arc::new(DashboardStore::from_config(&config)),
            config: Arc::new(config),
            feed_client: Arc::new(feed_client),
            response_cache: cache,
        }
    }
}
