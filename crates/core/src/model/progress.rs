use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("progress percent out of range: {value}")]
    OutOfRange { value: i64 },
}

/// Reading completion as an integer percent in `0..=100`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct ProgressPercent(u8);

impl ProgressPercent {
    pub const ZERO: Self = Self(0);
    pub const COMPLETE: Self = Self(100);

    /// Creates a validated percent.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::OutOfRange` for values outside `0..=100`.
    pub fn new(value: i64) -> Result<Self, ProgressError> {
        u8::try_from(value)
            .ok()
            .filter(|v| *v <= 100)
            .map(Self)
            .ok_or(ProgressError::OutOfRange { value })
    }

    /// Creates a percent, saturating into `0..=100`.
    #[must_use]
    pub fn clamped(value: i64) -> Self {
        // Clamped into u8 range above, so the cast is lossless.
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Self(value.clamp(0, 100) as u8)
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_complete(self) -> bool {
        self.0 == 100
    }
}

impl TryFrom<i64> for ProgressPercent {
    type Error = ProgressError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ProgressPercent> for u8 {
    fn from(p: ProgressPercent) -> Self {
        p.0
    }
}

impl fmt::Debug for ProgressPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl fmt::Display for ProgressPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Whether the reader view is currently shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
}

impl Visibility {
    #[must_use]
    pub fn is_visible(self) -> bool {
        matches!(self, Visibility::Visible)
    }
}

/// Scroll state of the reader view, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollGeometry {
    pub scroll_top: f64,
    pub content_height: f64,
    pub viewport_height: f64,
}

impl ScrollGeometry {
    #[must_use]
    pub fn new(scroll_top: f64, content_height: f64, viewport_height: f64) -> Self {
        Self {
            scroll_top,
            content_height,
            viewport_height,
        }
    }

    /// True when the whole content is visible without scrolling, including
    /// degenerate heights (zero, negative or NaN).
    #[must_use]
    pub fn fits_viewport(&self) -> bool {
        let scrollable = self.content_height > 0.0 && self.content_height > self.viewport_height;
        !scrollable
    }

    /// Completion percent for this geometry.
    ///
    /// `round(min(content, scroll_top + viewport) / content * 100)` clamped to
    /// `0..=100`. Content that fits on one screen reads as complete.
    #[must_use]
    pub fn percent(&self) -> ProgressPercent {
        if self.fits_viewport() {
            return ProgressPercent::COMPLETE;
        }

        // f64::max drops NaN, so a garbage offset reads as the top of the page.
        let scroll_top = self.scroll_top.max(0.0);
        let viewport = self.viewport_height.max(0.0);
        let seen = (scroll_top + viewport).min(self.content_height);
        let ratio = (seen / self.content_height * 100.0).round();

        // ratio is finite and within 0..=100 given the guards above.
        #[allow(clippy::cast_possible_truncation)]
        ProgressPercent::clamped(ratio as i64)
    }
}
