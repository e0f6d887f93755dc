//! Text cards for the latest reading of each device, plus the feed status line.

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::normalize::partition::Partition;
use crate::normalize::sentinel::{FieldCatalog, FieldSpec};

pub const MISSING_TEXT: &str = "--";
pub const ERROR_TEXT: &str = "ERR";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CardState {
    Ok,
    Error,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CardValue {
    pub field: String,
    pub label: String,
    pub text: String,
    pub state: CardState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SignalBand {
    Unknown,
    None,
    Weak,
    Fair,
    Good,
    Excellent,
}

impl SignalBand {
    /// Bars to light on a 4-bar indicator.
    #[must_use]
    pub fn bars(self) -> u8 {
        match self {
            Self::Unknown | Self::None => 0,
            Self::Weak => 1,
            Self::Fair => 2,
            Self::Good => 3,
            Self::Excellent => 4,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::None => "No signal",
            Self::Weak => "Weak",
            Self::Fair => "Fair",
            Self::Good => "Good",
            Self::Excellent => "Excellent",
        }
    }
}

/// Classify a LoRa RSSI in dBm.
#[must_use]
pub fn signal_band(rssi: Option<f64>) -> SignalBand {
    match rssi {
        Some(v) if !v.is_finite() => SignalBand::Unknown,
        Some(v) if v >= -60.0 => SignalBand::Excellent,
        Some(v) if v >= -75.0 => SignalBand::Good,
        Some(v) if v >= -90.0 => SignalBand::Fair,
        Some(v) if v >= -105.0 => SignalBand::Weak,
        Some(_) => SignalBand::None,
        None => SignalBand::Unknown,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SignalQuality {
    pub rssi: Option<f64>,
    pub band: SignalBand,
    pub bars: u8,
    pub label: String,
}

impl SignalQuality {
    #[must_use]
    pub fn from_rssi(rssi: Option<f64>) -> Self {
        let band = signal_band(rssi);
        Self {
            rssi,
            band,
            bars: band.bars(),
            label: band.label().to_string(),
        }
    }
}

/// Cards for one device.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DeviceCards {
    pub device: String,
    pub label: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub values: Vec<CardValue>,
    pub signal: Option<SignalQuality>,
    /// Every field of the latest reading was a sensor fault.
    pub fault: bool,
}

/// `21.5 °C`, `87 %`, `-80 dBm`.
#[must_use]
pub fn format_value(value: f64, decimals: usize, unit: &str) -> String {
    format!("{value:.decimals$} {unit}")
}

/// Card for one field of a reading.
#[must_use]
pub fn card_value(spec: &FieldSpec, raw: Option<&serde_json::Value>) -> CardValue {
    let (text, state) = match raw {
        None | Some(serde_json::Value::Null) => (MISSING_TEXT.to_string(), CardState::Missing),
        Some(value) => match spec.policy.clean(Some(value)) {
            Some(v) => (
                format_value(v, spec.decimals, spec.axis.unit()),
                CardState::Ok,
            ),
            None => (ERROR_TEXT.to_string(), CardState::Error),
        },
    };

    CardValue {
        field: spec.key.clone(),
        label: spec.label.clone(),
        text,
        state,
    }
}

/// Project the latest reading of a partition into cards.
///
/// Only fields the partition has ever reported get a card. Values always come from the latest
/// reading: a faulted field shows `ERR`, never an older number.
#[must_use]
pub fn device_cards(partition: &Partition, catalog: &FieldCatalog) -> DeviceCards {
    let latest = partition.latest();

    let values: Vec<CardValue> = catalog
        .iter()
        .filter(|f| partition.has_field(&f.key))
        .map(|f| card_value(f, latest.and_then(|r| r.raw(&f.key))))
        .collect();

    let signal = catalog
        .get("rssi")
        .filter(|_| partition.has_field("rssi"))
        .map(|spec| SignalQuality::from_rssi(latest.and_then(|r| spec.policy.clean(r.raw("rssi")))));

    let reported: Vec<&CardValue> = values
        .iter()
        .filter(|v| v.state != CardState::Missing)
        .collect();
    let fault = !reported.is_empty() && reported.iter().all(|v| v.state == CardState::Error);

    DeviceCards {
        device: partition.device.clone(),
        label: partition.label.clone(),
        updated_at: latest.map(|r| r.timestamp),
        values,
        signal,
        fault,
    }
}

/// Feed state shown in the header.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FeedStatus {
    /// Nothing fetched yet.
    Waiting,
    /// The last fetch returned readings.
    Live { latest: DateTime<Utc> },
    /// The last fetch succeeded but carried no readings.
    NoData,
    /// The last fetch failed; charts show the previous data.
    ConnectionFailed { message: String },
}

impl FeedStatus {
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Waiting => "Waiting for data...".to_string(),
            Self::Live { latest } => format!("Synced: {}", latest.format("%H:%M:%S")),
            Self::NoData => "No data yet".to_string(),
            Self::ConnectionFailed { message } => format!("Connection failed: {message}"),
        }
    }
}
