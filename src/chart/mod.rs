pub mod axis;
pub mod registry;

use serde::Serialize;
use utoipa::ToSchema;

use crate::normalize::sentinel::FieldCatalog;
use crate::normalize::{NormalizedFeed, SeriesPoint};
use axis::{AxisKind, AxisRange, RangeSource, TimeWindow};
use registry::ChartRegistry;

const PALETTE: [&str; 8] = [
    "#ff6384", "#ff9f40", "#4bc0c0", "#9966ff", "#c9cbcf", "#36a2eb", "#ffcd56", "#2ecc71",
];

/// Which fields are drawn together on one chart.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSpec {
    pub id: String,
    pub title: String,
    pub axis: AxisKind,
    pub fields: Vec<String>,
}

impl ChartSpec {
    #[must_use]
    pub fn new(id: &str, title: &str, axis: AxisKind, fields: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            axis,
            fields: fields.iter().map(ToString::to_string).collect(),
        }
    }
}

#[must_use]
pub fn default_layout() -> Vec<ChartSpec> {
    vec![
        ChartSpec::new(
            "temperature",
            "Temperatures",
            AxisKind::Temperature,
            &["t_aht", "temp", "temp1", "temp2", "t1", "t2", "t3", "t4"],
        ),
        ChartSpec::new("humidity", "Humidity", AxisKind::Humidity, &["h_aht", "hum"]),
        ChartSpec::new("pressure", "Pressure", AxisKind::Pressure, &["pres"]),
        ChartSpec::new("battery", "Battery voltage", AxisKind::BatteryVoltage, &["batt"]),
        ChartSpec::new("battery_pct", "Battery level", AxisKind::BatteryPercent, &["pct"]),
        ChartSpec::new("signal", "Signal strength", AxisKind::Signal, &["rssi"]),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Dataset {
    pub device: String,
    pub field: String,
    pub label: String,
    pub color: String,
    pub points: Vec<SeriesPoint>,
}

/// Everything a chart widget needs to draw itself.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ChartView {
    pub id: String,
    pub title: String,
    pub unit: String,
    /// Visible time range; `None` until the chart has seen data.
    pub x: Option<TimeWindow>,
    pub y: AxisRange,
    pub y_source: RangeSource,
    pub datasets: Vec<Dataset>,
}

/// Builds chart views from a normalized feed and the registry's navigation state.
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    layout: Vec<ChartSpec>,
}

impl ChartRenderer {
    #[must_use]
    pub fn new(layout: Vec<ChartSpec>) -> Self {
        Self { layout }
    }

    #[must_use]
    pub fn spec(&self, id: &str) -> Option<&ChartSpec> {
        self.layout.iter().find(|c| c.id == id)
    }

    pub fn render_all(
        &self,
        feed: &NormalizedFeed,
        catalog: &FieldCatalog,
        registry: &mut ChartRegistry,
    ) -> Vec<ChartView> {
        self.layout
            .iter()
            .map(|spec| self.render(spec, feed, catalog, registry))
            .collect()
    }

    /// Render one chart. Creates its registry entry on first sight of data.
    pub fn render(
        &self,
        spec: &ChartSpec,
        feed: &NormalizedFeed,
        catalog: &FieldCatalog,
        registry: &mut ChartRegistry,
    ) -> ChartView {
        let multi_device = feed.partitions.len() > 1;

        let mut datasets = Vec::new();
        for partition in &feed.partitions {
            for field in &spec.fields {
                let Some(series) = feed.series_for(&partition.device, field) else {
                    continue;
                };
                let field_label = catalog
                    .get(field)
                    .map_or(field.as_str(), |f| f.label.as_str());
                let label = if multi_device {
                    format!("{} · {}", partition.label, field_label)
                } else {
                    field_label.to_string()
                };

                datasets.push(Dataset {
                    device: partition.device.clone(),
                    field: field.clone(),
                    label,
                    color: PALETTE[datasets.len() % PALETTE.len()].to_string(),
                    points: series.points.clone(),
                });
            }
        }

        let x = registry.window_for(&spec.id, feed.time_bounds());

        let (y, y_source) = match registry.get(&spec.id).and_then(|s| s.y_override) {
            Some(range) => (range, RangeSource::User),
            None => spec
                .axis
                .scale()
                .range_for(datasets.iter().flat_map(|d| d.points.iter().filter_map(|p| p.v))),
        };

        ChartView {
            id: spec.id.clone(),
            title: spec.title.clone(),
            unit: spec.axis.unit().to_string(),
            x,
            y,
            y_source,
            datasets,
        }
    }
}

impl Default for ChartRenderer {
    fn default() -> Self {
        Self::new(default_layout())
    }
}
