//! Recorded reader-event traces and their replay against a tracker.

use chrono::{DateTime, TimeDelta, Utc};
use readltr_core::model::{ScrollGeometry, Visibility};
use serde::Deserialize;
use services::ReadingTracker;
use tracing::debug;

/// Longest offset a trace may use: one week after mount.
const MAX_OFFSET_SECS: f64 = 7.0 * 24.0 * 60.0 * 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    Scroll,
    Resize,
    Tick,
    Hidden,
    Visible,
    Unmount,
}

/// One line of a trace: what happened, when (seconds after mount), and the
/// geometry at that moment. Omitted measurements repeat the previous value.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct TraceEvent {
    pub at_secs: f64,
    pub event: TraceKind,
    #[serde(default)]
    pub scroll_top: Option<f64>,
    #[serde(default)]
    pub content_height: Option<f64>,
    #[serde(default)]
    pub viewport_height: Option<f64>,
}

impl TraceEvent {
    fn geometry_after(&self, previous: ScrollGeometry) -> ScrollGeometry {
        ScrollGeometry::new(
            self.scroll_top.unwrap_or(previous.scroll_top),
            self.content_height.unwrap_or(previous.content_height),
            self.viewport_height.unwrap_or(previous.viewport_height),
        )
    }
}

#[derive(Debug)]
pub enum TraceError {
    Json(serde_json::Error),
    InvalidOffset { index: usize, at_secs: f64 },
}

impl std::fmt::Display for TraceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceError::Json(err) => write!(f, "invalid trace file: {err}"),
            TraceError::InvalidOffset { index, at_secs } => {
                write!(f, "trace event {index} has invalid offset {at_secs}")
            }
        }
    }
}

impl std::error::Error for TraceError {}

/// Parse a JSON array of trace events.
///
/// # Errors
///
/// Returns `TraceError` for malformed JSON, or offsets that are negative,
/// non-finite, or longer than a week.
pub fn parse_trace(raw: &str) -> Result<Vec<TraceEvent>, TraceError> {
    let events: Vec<TraceEvent> = serde_json::from_str(raw).map_err(TraceError::Json)?;
    for (index, event) in events.iter().enumerate() {
        if !(0.0..=MAX_OFFSET_SECS).contains(&event.at_secs) {
            return Err(TraceError::InvalidOffset {
                index,
                at_secs: event.at_secs,
            });
        }
    }
    Ok(events)
}

/// Feed `events` into a mounted tracker, stepping its clock from `mounted_at`.
///
/// # Errors
///
/// Returns `TraceError::InvalidOffset` if an event's time cannot be represented.
/// Events before it have already been applied.
pub fn apply(
    tracker: &mut ReadingTracker,
    mounted_at: DateTime<Utc>,
    events: &[TraceEvent],
) -> Result<(), TraceError> {
    let mut geometry = ScrollGeometry::default();
    for (index, event) in events.iter().enumerate() {
        geometry = event.geometry_after(geometry);
        let at = event_time(mounted_at, event.at_secs).ok_or(TraceError::InvalidOffset {
            index,
            at_secs: event.at_secs,
        })?;
        tracker.clock_mut().advance_to(at);

        let progress = match event.event {
            TraceKind::Scroll => tracker.on_scroll(geometry),
            TraceKind::Resize => tracker.on_resize(geometry),
            TraceKind::Tick => tracker.on_tick(geometry),
            TraceKind::Hidden => tracker.on_visibility(Visibility::Hidden, geometry),
            TraceKind::Visible => tracker.on_visibility(Visibility::Visible, geometry),
            TraceKind::Unmount => {
                tracker.unmount();
                tracker.progress()
            }
        };
        debug!(at_secs = event.at_secs, kind = ?event.event, %progress, state = %tracker.state(), "trace event applied");
    }
    Ok(())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn event_time(mounted_at: DateTime<Utc>, at_secs: f64) -> Option<DateTime<Utc>> {
    let millis = (at_secs * 1000.0).round();
    if !millis.is_finite() || millis < 0.0 || millis > i64::MAX as f64 {
        return None;
    }
    let offset = TimeDelta::try_milliseconds(millis as i64)?;
    mounted_at.checked_add_signed(offset)
}
