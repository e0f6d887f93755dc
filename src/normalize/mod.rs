//! Telemetry feed normalizer.
//!
//! Turns a raw history payload into per-device, per-field series:
//!
//! 1. coerce the payload into a sequence of [`Reading`]s (keyed payloads lose their keys)
//! 2. sort ascending by timestamp (the backend does not guarantee delivery order), breaking
//!    ties on device id and field values
//! 3. partition by device through the alias table
//! 4. extract each known field, mapping sentinel or unparsable values to gaps
//!
//! Every series of a partition has exactly one point per reading of that partition, so index
//! `i` of any series lines up with index `i` of [`Partition::timestamps`].

pub mod partition;
pub mod sentinel;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::feed::models::{FeedPayload, Reading};
use partition::{DeviceTable, Partition};
use sentinel::{FieldCatalog, SentinelPolicy};

/// One chart point. `v` is `None` for a gap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, ToSchema)]
pub struct SeriesPoint {
    pub t: DateTime<Utc>,
    pub v: Option<f64>,
}

/// One field of one device, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub device: String,
    pub field: String,
    pub points: Vec<SeriesPoint>,
}

impl Series {
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn valid_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().filter_map(|p| p.v)
    }

    #[must_use]
    pub fn values(&self) -> Vec<Option<f64>> {
        self.points.iter().map(|p| p.v).collect()
    }
}

/// Output of one normalization pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedFeed {
    pub partitions: Vec<Partition>,
    pub series: Vec<Series>,
}

impl NormalizedFeed {
    /// No reading survived coercion and partitioning.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.partitions.iter().all(Partition::is_empty)
    }

    #[must_use]
    pub fn reading_count(&self) -> usize {
        self.partitions.iter().map(Partition::len).sum()
    }

    #[must_use]
    pub fn series_for(&self, device: &str, field: &str) -> Option<&Series> {
        self.series
            .iter()
            .find(|s| s.device == device && s.field == field)
    }

    #[must_use]
    pub fn partition(&self, device: &str) -> Option<&Partition> {
        self.partitions.iter().find(|p| p.device == device)
    }

    /// Earliest and latest timestamp across all partitions.
    #[must_use]
    pub fn time_bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self
            .partitions
            .iter()
            .filter_map(|p| p.readings.first())
            .map(|r| r.timestamp)
            .min()?;
        let last = self
            .partitions
            .iter()
            .filter_map(|p| p.latest())
            .map(|r| r.timestamp)
            .max()?;
        Some((first, last))
    }
}

/// Flatten a payload into readings, dropping records without a usable timestamp.
#[must_use]
pub fn coerce(payload: FeedPayload) -> Vec<Reading> {
    let records = payload.into_records();
    let total = records.len();

    let readings: Vec<Reading> = records.into_iter().filter_map(Reading::from_record).collect();

    if readings.len() < total {
        tracing::debug!(
            dropped = total - readings.len(),
            total,
            "Records without a usable timestamp dropped"
        );
    }
    readings
}

/// Ascending sort by timestamp.
///
/// Equal timestamps are ordered by device id, then by the serialized field map, so the result
/// does not depend on delivery order.
pub fn sort_chronologically(readings: &mut [Reading]) {
    readings.sort_by_cached_key(|r| {
        (
            r.timestamp,
            r.device_id.clone(),
            serde_json::to_string(&r.fields).unwrap_or_default(),
        )
    });
}

/// Extract one field of a partition, mapping invalid values to gaps.
#[must_use]
pub fn extract(partition: &Partition, field: &str, policy: &SentinelPolicy) -> Series {
    Series {
        device: partition.device.clone(),
        field: field.to_string(),
        points: partition
            .readings
            .iter()
            .map(|r| SeriesPoint {
                t: r.timestamp,
                v: policy.clean(r.raw(field)),
            })
            .collect(),
    }
}

/// Stateless feed normalizer; one instance serves every refresh.
#[derive(Debug, Clone)]
pub struct Normalizer {
    devices: DeviceTable,
    catalog: FieldCatalog,
    /// Keep only the most recent N readings after sorting; 0 keeps everything.
    history_limit: usize,
}

impl Normalizer {
    #[must_use]
    pub fn new(devices: DeviceTable, catalog: FieldCatalog, history_limit: usize) -> Self {
        Self {
            devices,
            catalog,
            history_limit,
        }
    }

    #[must_use]
    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    /// Run the full pipeline. Series are produced for every catalogued field that appears at
    /// least once in a partition.
    #[must_use]
    pub fn normalize(&self, payload: FeedPayload) -> NormalizedFeed {
        let mut readings = coerce(payload);
        sort_chronologically(&mut readings);

        if self.history_limit > 0 && readings.len() > self.history_limit {
            readings.drain(..readings.len() - self.history_limit);
        }

        let partitions = self.devices.partition(readings);

        let series = partitions
            .iter()
            .flat_map(|p| {
                self.catalog
                    .iter()
                    .filter(move |f| p.has_field(&f.key))
                    .map(move |f| extract(p, &f.key, &f.policy))
            })
            .collect();

        NormalizedFeed { partitions, series }
    }
}
