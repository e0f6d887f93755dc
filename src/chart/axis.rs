//! Axis range policy.
//!
//! Y bounds are recomputed from scratch on every refresh:
//!
//! 1. `min = floor(observed_min - margin)`, `max = ceil(observed_max + margin)`, rounded to the
//!    axis precision.
//! 2. If the span is below the minimum visible span, both bounds are pushed out until it is met.
//! 3. An optional safety clamp is applied last.
//! 4. With no valid value at all, a fixed per-unit fallback is used instead. Values too large
//!    to place on the grid count as no value.
//!
//! Bounds are computed on an integer grid of `10^-decimals` so a widened range stays exactly
//! widened when fed back in.
//!
//! X bounds come from [`XWindowMode`] on first render or after a reset; otherwise the chart
//! registry keeps whatever window the user navigated to.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Absorbs float noise like `3.65 * 10 = 36.49999…` before rounding to the grid.
const GRID_EPSILON: f64 = 1e-9;

/// Largest magnitude, in grid units, a bound may take. Well inside both `i64` and the exact
/// integer range of `f64`.
const GRID_LIMIT: f64 = 1e15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AxisKind {
    Temperature,
    Humidity,
    Pressure,
    BatteryVoltage,
    BatteryPercent,
    Signal,
}

impl AxisKind {
    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Humidity | Self::BatteryPercent => "%",
            Self::Pressure => "hPa",
            Self::BatteryVoltage => "V",
            Self::Signal => "dBm",
        }
    }

    /// Y scale used by charts on this axis.
    #[must_use]
    pub fn scale(self) -> YScale {
        match self {
            Self::Temperature => YScale::Dynamic(DynamicAxis {
                margin: 1.0,
                min_span: 2.0,
                decimals: 0,
                clamp: Some(AxisRange::new(-15.0, 60.0)),
                fallback: AxisRange::new(10.0, 40.0),
            }),
            Self::Humidity => YScale::Dynamic(DynamicAxis {
                margin: 2.0,
                min_span: 5.0,
                decimals: 0,
                clamp: Some(AxisRange::new(0.0, 100.0)),
                fallback: AxisRange::new(0.0, 100.0),
            }),
            Self::Pressure => YScale::Dynamic(DynamicAxis {
                margin: 1.0,
                min_span: 4.0,
                decimals: 0,
                clamp: None,
                fallback: AxisRange::new(900.0, 1100.0),
            }),
            Self::BatteryVoltage => YScale::Dynamic(DynamicAxis {
                margin: 0.05,
                min_span: 0.2,
                decimals: 1,
                clamp: None,
                fallback: AxisRange::new(3.0, 4.5),
            }),
            Self::BatteryPercent => YScale::Fixed(AxisRange::new(0.0, 100.0)),
            Self::Signal => YScale::Dynamic(DynamicAxis {
                margin: 5.0,
                min_span: 10.0,
                decimals: 0,
                clamp: Some(AxisRange::new(-130.0, 0.0)),
                fallback: AxisRange::new(-120.0, -30.0),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AxisRange {
    pub min: f64,
    pub max: f64,
}

impl AxisRange {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Where a chart's Y range came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RangeSource {
    Dynamic,
    Fallback,
    Fixed,
    User,
}

#[derive(Debug, Clone, PartialEq)]
pub enum YScale {
    Dynamic(DynamicAxis),
    Fixed(AxisRange),
}

impl YScale {
    /// Y range for the valid values of every series sharing the axis.
    pub fn range_for<I>(&self, values: I) -> (AxisRange, RangeSource)
    where
        I: IntoIterator<Item = f64>,
    {
        match self {
            Self::Fixed(range) => (*range, RangeSource::Fixed),
            Self::Dynamic(axis) => match axis.derive(values) {
                Some(range) => (range, RangeSource::Dynamic),
                None => (axis.fallback, RangeSource::Fallback),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DynamicAxis {
    pub margin: f64,
    pub min_span: f64,
    /// Precision of the bounds: 0 rounds to whole units, 1 to tenths.
    pub decimals: u32,
    pub clamp: Option<AxisRange>,
    pub fallback: AxisRange,
}

impl DynamicAxis {
    /// Derive bounds from observed values. Non-finite values are ignored; `None` when nothing
    /// is left.
    pub fn derive<I>(&self, values: I) -> Option<AxisRange>
    where
        I: IntoIterator<Item = f64>,
    {
        let (lo, hi) = values
            .into_iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })?;

        let grid = Grid::new(self.decimals);
        if !grid.fits(lo - self.margin) || !grid.fits(hi + self.margin) {
            tracing::warn!(min = lo, max = hi, "Values out of axis range, using fallback");
            return None;
        }

        let lo_units = grid.floor(lo - self.margin);
        let hi_units = grid.ceil(hi + self.margin);
        let span_units = grid.span(self.min_span);

        let (mut lo_units, mut hi_units) = widen_units(lo_units, hi_units, span_units);

        if let Some(clamp) = self.clamp {
            let c_lo = grid.round(clamp.min);
            let c_hi = grid.round(clamp.max);
            lo_units = lo_units.clamp(c_lo, c_hi);
            hi_units = hi_units.clamp(c_lo, c_hi);

            // Clipping can eat into the minimum span; grow back inwards.
            if hi_units - lo_units < span_units {
                if hi_units >= c_hi {
                    lo_units = (c_hi - span_units).max(c_lo);
                } else {
                    hi_units = (c_lo + span_units).min(c_hi);
                }
            }
        }

        Some(AxisRange::new(grid.value(lo_units), grid.value(hi_units)))
    }
}

/// Push `range` out symmetrically until it spans at least `min_span`.
///
/// Bounds are snapped to the `10^-decimals` grid first; when the missing span is an odd number
/// of grid steps the extra step goes to the upper bound. Applying it twice changes nothing.
#[must_use]
pub fn widen_to_span(range: AxisRange, min_span: f64, decimals: u32) -> AxisRange {
    let grid = Grid::new(decimals);
    let (lo, hi) = widen_units(
        grid.floor(range.min),
        grid.ceil(range.max),
        grid.span(min_span),
    );
    AxisRange::new(grid.value(lo), grid.value(hi))
}

fn widen_units(lo: i64, hi: i64, span: i64) -> (i64, i64) {
    let current = hi.saturating_sub(lo);
    if current >= span {
        return (lo, hi);
    }
    let deficit = span.saturating_sub(current);
    (
        lo.saturating_sub(deficit / 2),
        hi.saturating_add(deficit - deficit / 2),
    )
}

struct Grid {
    scale: f64,
}

impl Grid {
    fn new(decimals: u32) -> Self {
        Self {
            scale: 10f64.powi(decimals as i32),
        }
    }

    fn fits(&self, v: f64) -> bool {
        (v * self.scale).abs() < GRID_LIMIT
    }

    fn floor(&self, v: f64) -> i64 {
        (v * self.scale + GRID_EPSILON).floor() as i64
    }

    fn ceil(&self, v: f64) -> i64 {
        (v * self.scale - GRID_EPSILON).ceil() as i64
    }

    fn round(&self, v: f64) -> i64 {
        (v * self.scale).round() as i64
    }

    fn span(&self, v: f64) -> i64 {
        self.ceil(v).max(0)
    }

    fn value(&self, units: i64) -> f64 {
        units as f64 / self.scale
    }
}

/// A time range on the X axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    #[must_use]
    pub fn width(&self) -> Duration {
        self.end - self.start
    }

    #[must_use]
    pub fn center(&self) -> DateTime<Utc> {
        self.start + self.width() / 2
    }

    /// `None` when the result leaves the representable date range.
    #[must_use]
    pub fn shifted(&self, by: Duration) -> Option<Self> {
        Some(Self {
            start: self.start.checked_add_signed(by)?,
            end: self.end.checked_add_signed(by)?,
        })
    }

    /// Same width, centred on `at`.
    #[must_use]
    pub fn centered_on(&self, at: DateTime<Utc>) -> Option<Self> {
        Self::around(at, self.width())
    }

    /// Scale the width around the centre. `factor > 1` zooms in. Never narrower than a second.
    #[must_use]
    pub fn zoomed(&self, factor: f64) -> Option<Self> {
        let millis = (self.width().num_milliseconds() as f64 / factor).round();
        if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
            return None;
        }
        let width = Duration::try_milliseconds((millis as i64).max(1000))?;
        Self::around(self.center(), width)
    }

    fn around(center: DateTime<Utc>, width: Duration) -> Option<Self> {
        let start = center.checked_sub_signed(width / 2)?;
        Some(Self {
            start,
            end: start.checked_add_signed(width)?,
        })
    }
}

/// How the initial time window is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XWindowMode {
    /// Fixed-length window ending at the latest timestamp.
    Trailing(Duration),
    /// Full span of the data, padded on both sides.
    FullSpan { margin: Duration },
}

impl XWindowMode {
    /// Padding that would leave the date range is dropped.
    #[must_use]
    pub fn initial_window(&self, first: DateTime<Utc>, last: DateTime<Utc>) -> TimeWindow {
        match *self {
            Self::Trailing(width) => TimeWindow {
                start: last.checked_sub_signed(width).unwrap_or(DateTime::<Utc>::MIN_UTC),
                end: last,
            },
            Self::FullSpan { margin } => TimeWindow {
                start: first.checked_sub_signed(margin).unwrap_or(first),
                end: last.checked_add_signed(margin).unwrap_or(last),
            },
        }
    }
}
