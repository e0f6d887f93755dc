use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use utoipa::ToSchema;

use crate::cards::{device_cards, DeviceCards, FeedStatus};
use crate::chart::axis::XWindowMode;
use crate::chart::registry::{ChartRegistry, ViewportCommand};
use crate::chart::{ChartRenderer, ChartView};
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::feed::models::FeedPayload;
use crate::normalize::partition::DeviceTable;
use crate::normalize::sentinel::FieldCatalog;
use crate::normalize::{NormalizedFeed, Normalizer};

/// What `GET /api/dashboard` returns.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DashboardSnapshot {
    /// Generation of the last applied refresh (0 before the first one).
    pub generation: u64,
    /// Chart registry revision; changes on every viewport command.
    pub revision: u64,
    pub fetched_at: Option<DateTime<Utc>>,
    pub status: FeedStatus,
    pub status_text: String,
    pub devices: Vec<DeviceCards>,
    pub charts: Vec<ChartView>,
}

/// Result of handing a refresh result to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Applied,
    /// A newer refresh was already applied; this one was dropped.
    Stale { newest: u64 },
}

struct Dashboard {
    applied: u64,
    /// Last feed that carried readings. Empty and failed refreshes leave it untouched.
    feed: Option<Arc<NormalizedFeed>>,
    registry: ChartRegistry,
    snapshot: Arc<DashboardSnapshot>,
}

/// Latest dashboard state, shared by the poller and the HTTP handlers.
///
/// Refreshes may overlap. Each one takes a generation from [`DashboardStore::begin_refresh`]
/// and its result is applied only if no newer generation got there first.
pub struct DashboardStore {
    normalizer: Normalizer,
    renderer: ChartRenderer,
    next_generation: AtomicU64,
    inner: RwLock<Dashboard>,
}

impl DashboardStore {
    #[must_use]
    pub fn new(normalizer: Normalizer, renderer: ChartRenderer, window: XWindowMode) -> Self {
        let mut registry = ChartRegistry::new(window);
        let empty = normalizer.normalize(FeedPayload::Empty);

        let status = FeedStatus::Waiting;
        let snapshot = DashboardSnapshot {
            generation: 0,
            revision: registry.revision(),
            fetched_at: None,
            status_text: status.text(),
            status,
            devices: cards_for(&empty, normalizer.catalog()),
            charts: renderer.render_all(&empty, normalizer.catalog(), &mut registry),
        };

        Self {
            normalizer,
            renderer,
            next_generation: AtomicU64::new(0),
            inner: RwLock::new(Dashboard {
                applied: 0,
                feed: None,
                registry,
                snapshot: Arc::new(snapshot),
            }),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let normalizer = Normalizer::new(
            DeviceTable::new(config.device_slots.clone()),
            FieldCatalog::standard(),
            config.feed_history_limit,
        );
        Self::new(normalizer, ChartRenderer::default(), config.chart_window)
    }

    /// Reserve the generation for a refresh that is about to start.
    pub fn begin_refresh(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Normalize a fetched payload and publish it.
    ///
    /// An empty payload only changes the status and the cards; charts keep their last state.
    pub async fn apply_payload(&self, generation: u64, payload: FeedPayload) -> ApplyOutcome {
        let feed = self.normalizer.normalize(payload);
        let catalog = self.normalizer.catalog();

        let mut guard = self.inner.write().await;
        let dash = &mut *guard;
        if generation <= dash.applied {
            tracing::debug!(generation, newest = dash.applied, "Discarding stale refresh");
            return ApplyOutcome::Stale {
                newest: dash.applied,
            };
        }
        dash.applied = generation;

        let previous = Arc::clone(&dash.snapshot);
        let (status, charts) = match feed.time_bounds() {
            Some((_, latest)) => {
                let charts = self
                    .renderer
                    .render_all(&feed, catalog, &mut dash.registry);
                (FeedStatus::Live { latest }, charts)
            }
            None => (FeedStatus::NoData, previous.charts.clone()),
        };

        tracing::debug!(
            generation,
            readings = feed.reading_count(),
            series = feed.series.len(),
            "Dashboard refreshed"
        );

        dash.snapshot = Arc::new(DashboardSnapshot {
            generation,
            revision: dash.registry.revision(),
            fetched_at: Some(Utc::now()),
            status_text: status.text(),
            status,
            devices: cards_for(&feed, catalog),
            charts,
        });
        if !feed.is_empty() {
            dash.feed = Some(Arc::new(feed));
        }

        ApplyOutcome::Applied
    }

    /// Publish a failed fetch. Everything but the status line stays as it was.
    pub async fn apply_failure(&self, generation: u64, message: String) -> ApplyOutcome {
        let mut guard = self.inner.write().await;
        let dash = &mut *guard;
        if generation <= dash.applied {
            tracing::debug!(generation, newest = dash.applied, "Discarding stale failure");
            return ApplyOutcome::Stale {
                newest: dash.applied,
            };
        }
        dash.applied = generation;

        let status = FeedStatus::ConnectionFailed { message };
        let mut snapshot = (*dash.snapshot).clone();
        snapshot.generation = generation;
        snapshot.fetched_at = Some(Utc::now());
        snapshot.status_text = status.text();
        snapshot.status = status;
        dash.snapshot = Arc::new(snapshot);

        ApplyOutcome::Applied
    }

    pub async fn snapshot(&self) -> Arc<DashboardSnapshot> {
        Arc::clone(&self.inner.read().await.snapshot)
    }

    /// Last feed that carried readings.
    pub async fn feed(&self) -> Option<Arc<NormalizedFeed>> {
        self.inner.read().await.feed.clone()
    }

    /// Apply a navigation command to one chart and re-render it.
    ///
    /// # Errors
    ///
    /// `AppError::NotFound` for an unknown chart, `AppError::ServiceUnavailable` before any
    /// data has been fetched, `AppError::BadRequest` for invalid command arguments.
    pub async fn apply_viewport(
        &self,
        chart_id: &str,
        command: &ViewportCommand,
    ) -> AppResult<ChartView> {
        let spec = self
            .renderer
            .spec(chart_id)
            .ok_or_else(|| AppError::NotFound(format!("Chart '{chart_id}' not found")))?;

        let mut guard = self.inner.write().await;
        let dash = &mut *guard;
        let feed = dash.feed.clone().ok_or_else(|| {
            AppError::ServiceUnavailable("No data has been fetched yet".to_string())
        })?;

        dash.registry.apply(chart_id, command)?;
        let view = self.renderer.render(
            spec,
            &feed,
            self.normalizer.catalog(),
            &mut dash.registry,
        );

        let mut snapshot = (*dash.snapshot).clone();
        snapshot.revision = dash.registry.revision();
        if let Some(slot) = snapshot.charts.iter_mut().find(|c| c.id == view.id) {
            *slot = view.clone();
        }
        dash.snapshot = Arc::new(snapshot);

        tracing::debug!(chart = chart_id, ?command, "Viewport updated");
        Ok(view)
    }
}

fn cards_for(feed: &NormalizedFeed, catalog: &FieldCatalog) -> Vec<DeviceCards> {
    feed.partitions
        .iter()
        .map(|p| device_cards(p, catalog))
        .collect()
}
