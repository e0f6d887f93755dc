use serde_json::Value;

use crate::chart::axis::AxisKind;
use crate::feed::models::coerce_number;

/// Tolerance for equality exclusions (`999.0`, `-99.9`, …).
const EXCLUSION_TOLERANCE: f64 = 1e-6;

/// Validity predicate for one field.
///
/// A value is valid when it is a finite number, strictly above `above`, at most `at_most`, and
/// not equal to any excluded sentinel. Everything else becomes a gap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentinelPolicy {
    pub above: Option<f64>,
    pub at_most: Option<f64>,
    pub excluded: Vec<f64>,
}

impl SentinelPolicy {
    /// Accept any finite number.
    #[must_use]
    pub fn finite() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn above(mut self, threshold: f64) -> Self {
        self.above = Some(threshold);
        self
    }

    #[must_use]
    pub fn at_most(mut self, limit: f64) -> Self {
        self.at_most = Some(limit);
        self
    }

    #[must_use]
    pub fn excluding(mut self, sentinels: &[f64]) -> Self {
        self.excluded.extend_from_slice(sentinels);
        self
    }

    #[must_use]
    pub fn accepts(&self, value: f64) -> bool {
        value.is_finite()
            && self.above.is_none_or(|t| value > t)
            && self.at_most.is_none_or(|l| value <= l)
            && !self
                .excluded
                .iter()
                .any(|s| (value - s).abs() < EXCLUSION_TOLERANCE)
    }

    /// Clean a raw field value: the parsed number when valid, `None` otherwise.
    #[must_use]
    pub fn clean(&self, raw: Option<&Value>) -> Option<f64> {
        raw.and_then(coerce_number).filter(|v| self.accepts(*v))
    }
}

/// How one feed key is interpreted and displayed.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub key: String,
    pub label: String,
    pub axis: AxisKind,
    /// Decimal places on the text cards.
    pub decimals: usize,
    pub policy: SentinelPolicy,
}

impl FieldSpec {
    #[must_use]
    pub fn new(key: &str, label: &str, axis: AxisKind, policy: SentinelPolicy) -> Self {
        let decimals = match axis {
            AxisKind::BatteryPercent | AxisKind::Signal => 0,
            _ => 1,
        };
        Self {
            key: key.to_string(),
            label: label.to_string(),
            axis,
            decimals,
            policy,
        }
    }
}

/// The set of fields the dashboard knows about, in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCatalog {
    fields: Vec<FieldSpec>,
}

impl FieldCatalog {
    #[must_use]
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    /// Fields reported by the LoRa nodes and their sentinel conventions.
    ///
    /// DS18B20 probes report `-127` when disconnected; older firmware used `999.0` and `-99.9`.
    #[must_use]
    pub fn standard() -> Self {
        let temperature = SentinelPolicy::finite()
            .above(-120.0)
            .excluding(&[999.0, -99.9]);
        let humidity = SentinelPolicy::finite()
            .at_most(100.0)
            .excluding(&[999.0, -99.9]);

        let t = |key: &str, label: &str| {
            FieldSpec::new(key, label, AxisKind::Temperature, temperature.clone())
        };

        Self::new(vec![
            t("t_aht", "Ambient"),
            t("temp", "Temperature"),
            t("temp1", "Temperature 1"),
            t("temp2", "Temperature 2"),
            t("t1", "Probe 1"),
            t("t2", "Probe 2"),
            t("t3", "Probe 3"),
            t("t4", "Probe 4"),
            FieldSpec::new("h_aht", "Humidity", AxisKind::Humidity, humidity.clone()),
            FieldSpec::new("hum", "Humidity", AxisKind::Humidity, humidity),
            FieldSpec::new(
                "pres",
                "Pressure",
                AxisKind::Pressure,
                SentinelPolicy::finite().above(0.0).excluding(&[999.0]),
            ),
            FieldSpec::new(
                "batt",
                "Battery",
                AxisKind::BatteryVoltage,
                SentinelPolicy::finite().above(0.0).excluding(&[999.0, -99.9]),
            ),
            FieldSpec::new(
                "pct",
                "Battery",
                AxisKind::BatteryPercent,
                SentinelPolicy::finite().above(-1.0).excluding(&[999.0]),
            ),
            FieldSpec::new(
                "rssi",
                "Signal",
                AxisKind::Signal,
                SentinelPolicy::finite()
                    .above(-200.0)
                    .at_most(0.0)
                    .excluding(&[999.0]),
            ),
        ])
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter()
    }
}

impl Default for FieldCatalog {
    fn default() -> Self {
        Self::standard()
    }
}
