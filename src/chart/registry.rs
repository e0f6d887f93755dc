use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use utoipa::ToSchema;

use crate::chart::axis::{AxisRange, TimeWindow, XWindowMode};
use crate::error::{AppError, AppResult};

/// Manual navigation on one chart.
#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ViewportCommand {
    /// Move the time window; positive goes forward in time.
    Pan { seconds: i64 },
    /// Scale the time window around its centre; `factor > 1` zooms in.
    Zoom { factor: f64 },
    /// Centre the time window on a date, keeping its width.
    JumpTo { at: DateTime<Utc> },
    /// Pin the Y axis.
    SetY { min: f64, max: f64 },
    /// Forget navigation; the next render recomputes both axes.
    Reset,
}

/// Navigation state owned by one chart. Survives refreshes until reset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartState {
    pub window: TimeWindow,
    pub y_override: Option<AxisRange>,
}

/// Chart id → chart state.
#[derive(Debug, Clone)]
pub struct ChartRegistry {
    charts: HashMap<String, ChartState>,
    mode: XWindowMode,
    revision: u64,
}

impl ChartRegistry {
    #[must_use]
    pub fn new(mode: XWindowMode) -> Self {
        Self {
            charts: HashMap::new(),
            mode,
            revision: 0,
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ChartState> {
        self.charts.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.charts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }

    /// Bumped on every accepted command, so cached views can be told apart.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Time window for a chart about to be rendered.
    ///
    /// An existing chart keeps its window. A new one gets the initial window for `bounds`, or
    /// nothing when there is no data to derive it from.
    pub fn window_for(
        &mut self,
        id: &str,
        bounds: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Option<TimeWindow> {
        if let Some(state) = self.charts.get(id) {
            return Some(state.window);
        }
        let (first, last) = bounds?;
        let window = self.mode.initial_window(first, last);
        self.charts.insert(
            id.to_string(),
            ChartState {
                window,
                y_override: None,
            },
        );
        Some(window)
    }

    /// Apply a navigation command.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` if the chart has not been rendered yet and
    /// `AppError::BadRequest` for a non-positive zoom factor, an empty Y range, or a move that
    /// would leave the representable date range. A rejected command changes nothing.
    pub fn apply(&mut self, id: &str, command: &ViewportCommand) -> AppResult<()> {
        match *command {
            ViewportCommand::Reset => {
                self.charts.remove(id);
                tracing::debug!(chart = id, "Chart viewport reset");
            }
            ViewportCommand::Pan { seconds } => {
                let state = self.state_mut(id)?;
                state.window = Duration::try_seconds(seconds)
                    .and_then(|by| state.window.shifted(by))
                    .ok_or_else(|| out_of_range("pan"))?;
            }
            ViewportCommand::Zoom { factor } => {
                if !factor.is_finite() || factor <= 0.0 {
                    return Err(AppError::BadRequest(
                        "zoom factor must be a positive number".to_string(),
                    ));
                }
                let state = self.state_mut(id)?;
                state.window = state
                    .window
                    .zoomed(factor)
                    .ok_or_else(|| out_of_range("zoom"))?;
            }
            ViewportCommand::JumpTo { at } => {
                let state = self.state_mut(id)?;
                state.window = state
                    .window
                    .centered_on(at)
                    .ok_or_else(|| out_of_range("jump_to"))?;
            }
            ViewportCommand::SetY { min, max } => {
                if !min.is_finite() || !max.is_finite() || min >= max {
                    return Err(AppError::BadRequest(
                        "y range needs finite bounds with min < max".to_string(),
                    ));
                }
                self.state_mut(id)?.y_override = Some(AxisRange::new(min, max));
            }
        }

        self.revision += 1;
        Ok(())
    }

    fn state_mut(&mut self, id: &str) -> AppResult<&mut ChartState> {
        self.charts
            .get_mut(id)
            .ok_or_else(|| AppError::NotFound(format!("Chart '{id}' has not been rendered yet")))
    }
}

fn out_of_range(action: &str) -> AppError {
    AppError::BadRequest(format!(
        "{action} would move the time window out of the supported date range"
    ))
}
