//! Tests for the axis range policy, the chart registry and chart rendering.
//!
//! Run with: cargo test --test axis_test

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;

use feed_dash::chart::axis::{
    widen_to_span, AxisKind, AxisRange, RangeSource, TimeWindow, XWindowMode, YScale,
};
use feed_dash::chart::registry::{ChartRegistry, ViewportCommand};
use feed_dash::chart::ChartRenderer;
use feed_dash::error::AppError;
use feed_dash::feed::FeedPayload;
use feed_dash::normalize::partition::{DeviceSlot, DeviceTable};
use feed_dash::normalize::sentinel::FieldCatalog;
use feed_dash::normalize::Normalizer;

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, h, m, 0).unwrap()
}

fn range(kind: AxisKind, values: &[f64]) -> (AxisRange, RangeSource) {
    kind.scale().range_for(values.iter().copied())
}

// ---------------------------------------------------------------------------
// Y axis
// ---------------------------------------------------------------------------

#[test]
fn no_valid_values_uses_fallback() {
    assert_eq!(
        range(AxisKind::Temperature, &[]),
        (AxisRange::new(10.0, 40.0), RangeSource::Fallback)
    );
    assert_eq!(
        range(AxisKind::Humidity, &[f64::NAN]),
        (AxisRange::new(0.0, 100.0), RangeSource::Fallback)
    );
    assert_eq!(
        range(AxisKind::Signal, &[]),
        (AxisRange::new(-120.0, -30.0), RangeSource::Fallback)
    );
}

#[test]
fn margin_then_floor_and_ceil() {
    assert_eq!(
        range(AxisKind::Temperature, &[18.2, 24.7]).0,
        AxisRange::new(17.0, 26.0)
    );
    assert_eq!(
        range(AxisKind::Signal, &[-80.0]).0,
        AxisRange::new(-85.0, -75.0)
    );
}

#[test]
fn flat_series_is_widened_to_min_span() {
    // 21.0 ± 1 already spans the 2 °C minimum
    assert_eq!(
        range(AxisKind::Temperature, &[21.0, 21.0]).0,
        AxisRange::new(20.0, 22.0)
    );
    // 1012..1015 is one hPa short; the odd step goes up
    assert_eq!(
        range(AxisKind::Pressure, &[1013.2]).0,
        AxisRange::new(1012.0, 1016.0)
    );
}

#[test]
fn tenth_precision_for_battery_voltage() {
    let (r, source) = range(AxisKind::BatteryVoltage, &[3.7, 3.72]);
    assert_eq!(source, RangeSource::Dynamic);
    assert_eq!(r, AxisRange::new(3.6, 3.8));
}

#[test]
fn widening_is_exact_and_idempotent() {
    let once = widen_to_span(AxisRange::new(10.0, 11.0), 4.0, 0);
    assert_eq!(once, AxisRange::new(9.0, 13.0));
    assert!((once.span() - 4.0).abs() < f64::EPSILON);

    let twice = widen_to_span(once, 4.0, 0);
    assert_eq!(once, twice);

    // Already wide enough: untouched
    let wide = AxisRange::new(0.0, 50.0);
    assert_eq!(widen_to_span(wide, 4.0, 0), wide);
}

#[test]
fn clamp_keeps_minimum_span_inside_limits() {
    let (r, _) = range(AxisKind::Humidity, &[99.5]);
    assert_eq!(r, AxisRange::new(95.0, 100.0));

    let (r, _) = range(AxisKind::Humidity, &[0.5]);
    assert_eq!(r, AxisRange::new(0.0, 5.0));
}

#[test]
fn huge_finite_values_fall_back_instead_of_overflowing() {
    assert_eq!(
        range(AxisKind::Pressure, &[1.0e300]),
        (AxisRange::new(900.0, 1100.0), RangeSource::Fallback)
    );
    assert_eq!(
        range(AxisKind::Humidity, &[-3.4e38]),
        (AxisRange::new(0.0, 100.0), RangeSource::Fallback)
    );
    assert_eq!(
        range(AxisKind::BatteryVoltage, &[3.7, f64::MAX]),
        (AxisRange::new(3.0, 4.5), RangeSource::Fallback)
    );

    let wide = widen_to_span(AxisRange::new(-1.0e300, 1.0e300), 4.0, 0);
    assert!(wide.min <= wide.max);
    let flat = widen_to_span(AxisRange::new(1.0e300, 1.0e300), 4.0, 0);
    assert!(flat.min <= flat.max);
}

#[test]
fn battery_percent_is_fixed() {
    assert_eq!(
        range(AxisKind::BatteryPercent, &[42.0]),
        (AxisRange::new(0.0, 100.0), RangeSource::Fixed)
    );
    assert!(matches!(AxisKind::BatteryPercent.scale(), YScale::Fixed(_)));
}

// ---------------------------------------------------------------------------
// X axis
// ---------------------------------------------------------------------------

#[test]
fn initial_windows() {
    let trailing = XWindowMode::Trailing(Duration::hours(6)).initial_window(at(1, 0), at(12, 0));
    assert_eq!(trailing.start, at(6, 0));
    assert_eq!(trailing.end, at(12, 0));

    let full = XWindowMode::FullSpan {
        margin: Duration::minutes(1),
    }
    .initial_window(at(1, 0), at(12, 0));
    assert_eq!(full.start, at(0, 59));
    assert_eq!(full.end, at(12, 1));
}

#[test]
fn window_navigation() {
    let window = TimeWindow {
        start: at(10, 0),
        end: at(11, 0),
    };

    let panned = window.shifted(Duration::minutes(-30)).unwrap();
    assert_eq!((panned.start, panned.end), (at(9, 30), at(10, 30)));

    let zoomed = window.zoomed(2.0).unwrap();
    assert_eq!((zoomed.start, zoomed.end), (at(10, 15), at(10, 45)));

    let zoomed_out = window.zoomed(0.5).unwrap();
    assert_eq!((zoomed_out.start, zoomed_out.end), (at(9, 30), at(11, 30)));

    let tiny = window.zoomed(1.0e9).unwrap();
    assert_eq!(tiny.width(), Duration::seconds(1));

    let jumped = window.centered_on(at(20, 0)).unwrap();
    assert_eq!((jumped.start, jumped.end), (at(19, 30), at(20, 30)));
}

#[test]
fn navigation_past_the_date_range_is_refused() {
    let window = TimeWindow {
        start: at(10, 0),
        end: at(11, 0),
    };

    assert!(window.zoomed(1.0e-12).is_none());
    assert!(window.zoomed(f64::MIN_POSITIVE).is_none());
    assert!(window.shifted(Duration::seconds(9_000_000_000_000_000)).is_none());
    assert!(window.centered_on(DateTime::<Utc>::MAX_UTC).is_none());
    assert!(window.centered_on(DateTime::<Utc>::MIN_UTC).is_none());
}

#[test]
fn initial_window_stays_inside_date_range() {
    let last = DateTime::<Utc>::MAX_UTC;
    let full = XWindowMode::FullSpan {
        margin: Duration::minutes(1),
    }
    .initial_window(at(1, 0), last);
    assert_eq!((full.start, full.end), (at(0, 59), last));

    let first = DateTime::<Utc>::MIN_UTC;
    let trailing = XWindowMode::Trailing(Duration::hours(6)).initial_window(first, first);
    assert_eq!((trailing.start, trailing.end), (first, first));
}

// ---------------------------------------------------------------------------
// Chart registry
// ---------------------------------------------------------------------------

fn registry() -> ChartRegistry {
    ChartRegistry::new(XWindowMode::Trailing(Duration::hours(1)))
}

#[test]
fn window_is_created_once_and_then_preserved() {
    let mut reg = registry();

    assert!(reg.window_for("temperature", None).is_none());
    assert!(reg.is_empty());

    let first = reg
        .window_for("temperature", Some((at(8, 0), at(12, 0))))
        .unwrap();
    assert_eq!((first.start, first.end), (at(11, 0), at(12, 0)));

    // New data does not move an existing window
    let second = reg
        .window_for("temperature", Some((at(8, 0), at(13, 0))))
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(reg.len(), 1);
}

#[test]
fn commands_update_state_and_revision() {
    let mut reg = registry();
    reg.window_for("temperature", Some((at(8, 0), at(12, 0))));

    reg.apply("temperature", &ViewportCommand::Pan { seconds: 1800 })
        .unwrap();
    assert_eq!(reg.get("temperature").unwrap().window.end, at(12, 30));
    assert_eq!(reg.revision(), 1);

    reg.apply(
        "temperature",
        &ViewportCommand::SetY {
            min: 0.0,
            max: 30.0,
        },
    )
    .unwrap();
    assert_eq!(
        reg.get("temperature").unwrap().y_override,
        Some(AxisRange::new(0.0, 30.0))
    );

    reg.apply("temperature", &ViewportCommand::Reset).unwrap();
    assert!(reg.get("temperature").is_none());
    assert_eq!(reg.revision(), 3);

    // After a reset the window is derived from the data again
    let fresh = reg
        .window_for("temperature", Some((at(8, 0), at(14, 0))))
        .unwrap();
    assert_eq!(fresh.end, at(14, 0));
}

#[test]
fn invalid_commands_are_rejected_without_side_effects() {
    let mut reg = registry();

    assert!(matches!(
        reg.apply("temperature", &ViewportCommand::Pan { seconds: 60 }),
        Err(AppError::NotFound(_))
    ));

    reg.window_for("temperature", Some((at(8, 0), at(12, 0))));
    assert!(matches!(
        reg.apply("temperature", &ViewportCommand::Zoom { factor: 0.0 }),
        Err(AppError::BadRequest(_))
    ));
    assert!(matches!(
        reg.apply(
            "temperature",
            &ViewportCommand::SetY {
                min: 5.0,
                max: 5.0
            }
        ),
        Err(AppError::BadRequest(_))
    ));

    let before = *reg.get("temperature").unwrap();
    for cmd in [
        ViewportCommand::Zoom { factor: 1.0e-12 },
        ViewportCommand::Pan { seconds: i64::MAX },
        ViewportCommand::Pan { seconds: i64::MIN },
        ViewportCommand::JumpTo {
            at: DateTime::<Utc>::MAX_UTC,
        },
    ] {
        assert!(
            matches!(reg.apply("temperature", &cmd), Err(AppError::BadRequest(_))),
            "{cmd:?}"
        );
    }
    assert_eq!(*reg.get("temperature").unwrap(), before);
    assert_eq!(reg.revision(), 0);
}

#[test]
fn viewport_commands_deserialize_from_tagged_json() {
    let cmd: ViewportCommand =
        serde_json::from_value(json!({"action": "zoom", "factor": 2.5})).unwrap();
    assert_eq!(cmd, ViewportCommand::Zoom { factor: 2.5 });

    let cmd: ViewportCommand = serde_json::from_value(
        json!({"action": "jump_to", "at": "2024-01-01T12:00:00Z"}),
    )
    .unwrap();
    assert_eq!(cmd, ViewportCommand::JumpTo { at: at(12, 0) });

    let cmd: ViewportCommand = serde_json::from_value(json!({"action": "reset"})).unwrap();
    assert_eq!(cmd, ViewportCommand::Reset);

    assert!(serde_json::from_value::<ViewportCommand>(json!({"action": "spin"})).is_err());
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn history() -> FeedPayload {
    FeedPayload::from_value(json!([
        {"timestamp": "2024-01-01T12:00:00Z", "device_id": "n1", "t1": -127, "rssi": -70},
        {"timestamp": "2024-01-01T12:05:00Z", "device_id": "n1", "t1": 21.5, "rssi": -72},
        {"timestamp": "2024-01-01T12:06:00Z", "device_id": "n2", "t1": 19.0},
    ]))
    .unwrap()
}

#[test]
fn single_partition_uses_field_labels() {
    let normalizer = Normalizer::new(DeviceTable::new(Vec::new()), FieldCatalog::standard(), 0);
    let feed = normalizer.normalize(history());
    let mut reg = registry();

    let renderer = ChartRenderer::default();
    let view = renderer.render(
        renderer.spec("temperature").unwrap(),
        &feed,
        normalizer.catalog(),
        &mut reg,
    );

    assert_eq!(view.unit, "°C");
    assert_eq!(view.datasets.len(), 1);
    assert_eq!(view.datasets[0].label, "Probe 1");
    assert_eq!(view.y, AxisRange::new(18.0, 23.0));
    assert_eq!(view.y_source, RangeSource::Dynamic);
    assert_eq!(view.x.unwrap().end, at(12, 6));
}

#[test]
fn multiple_partitions_prefix_device_label() {
    let slots = vec![DeviceSlot::new("n1", "North"), DeviceSlot::new("n2", "South")];
    let normalizer = Normalizer::new(DeviceTable::new(slots), FieldCatalog::standard(), 0);
    let feed = normalizer.normalize(history());
    let mut reg = registry();

    let views = ChartRenderer::default().render_all(&feed, normalizer.catalog(), &mut reg);
    let temperature = views.iter().find(|v| v.id == "temperature").unwrap();

    let labels: Vec<&str> = temperature.datasets.iter().map(|d| d.label.as_str()).collect();
    assert_eq!(labels, vec!["North · Probe 1", "South · Probe 1"]);
    assert_ne!(temperature.datasets[0].color, temperature.datasets[1].color);

    // Charts without any matching field still render, on their fallback range
    let pressure = views.iter().find(|v| v.id == "pressure").unwrap();
    assert!(pressure.datasets.is_empty());
    assert_eq!(pressure.y_source, RangeSource::Fallback);
}

#[test]
fn oversized_reading_renders_on_fallback_range() {
    let normalizer = Normalizer::new(DeviceTable::new(Vec::new()), FieldCatalog::standard(), 0);
    let feed = normalizer.normalize(
        FeedPayload::from_value(json!([
            {"timestamp": "2024-01-01T12:00:00Z", "pres": 3.4e38, "hum": -3.4e38},
        ]))
        .unwrap(),
    );
    let mut reg = registry();

    let views = ChartRenderer::default().render_all(&feed, normalizer.catalog(), &mut reg);

    let pressure = views.iter().find(|v| v.id == "pressure").unwrap();
    assert_eq!(pressure.datasets.len(), 1);
    assert_eq!(pressure.y, AxisRange::new(900.0, 1100.0));
    assert_eq!(pressure.y_source, RangeSource::Fallback);

    let humidity = views.iter().find(|v| v.id == "humidity").unwrap();
    assert_eq!(humidity.y_source, RangeSource::Fallback);
}

#[test]
fn user_y_range_overrides_dynamic_range() {
    let normalizer = Normalizer::new(DeviceTable::new(Vec::new()), FieldCatalog::standard(), 0);
    let feed = normalizer.normalize(history());
    let renderer = ChartRenderer::default();
    let spec = renderer.spec("temperature").unwrap();
    let mut reg = registry();

    renderer.render(spec, &feed, normalizer.catalog(), &mut reg);
    reg.apply(
        "temperature",
        &ViewportCommand::SetY {
            min: -10.0,
            max: 50.0,
        },
    )
    .unwrap();

    let view = renderer.render(spec, &feed, normalizer.catalog(), &mut reg);
    assert_eq!(view.y, AxisRange::new(-10.0, 50.0));
    assert_eq!(view.y_source, RangeSource::User);
}
