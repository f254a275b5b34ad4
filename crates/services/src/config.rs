use std::env;
use std::time::Duration;

use readltr_core::model::ProgressPercent;
use readltr_core::{DEFAULT_MIN_SYNC_INTERVAL_SECS, DEFAULT_SAMPLE_INTERVAL_SECS, FINISH_THRESHOLD};

use crate::error::ConfigError;

const SAMPLE_INTERVAL_VAR: &str = "READLTR_SAMPLE_INTERVAL_SECS";
const SYNC_INTERVAL_VAR: &str = "READLTR_SYNC_INTERVAL_SECS";
const FINISH_THRESHOLD_VAR: &str = "READLTR_FINISH_THRESHOLD";

/// Timing and threshold knobs for reading-progress tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Period of the timer-driven sample while the reader is visible.
    pub sample_interval: Duration,
    /// Minimum spacing between two rate-limited progress writes.
    pub min_sync_interval: Duration,
    /// Percent at which the session is marked as fully read.
    pub finish_threshold: ProgressPercent,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_secs(DEFAULT_SAMPLE_INTERVAL_SECS),
            min_sync_interval: Duration::from_secs(DEFAULT_MIN_SYNC_INTERVAL_SECS),
            finish_threshold: ProgressPercent::clamped(i64::from(FINISH_THRESHOLD)),
        }
    }
}

impl TrackerConfig {
    /// Read overrides from `READLTR_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but not a valid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Same as [`TrackerConfig::from_env`] with an explicit variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set but not a valid value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(secs) = parse_u64(&lookup, SAMPLE_INTERVAL_VAR)? {
            config.sample_interval = positive_secs(SAMPLE_INTERVAL_VAR, secs)?;
        }
        if let Some(secs) = parse_u64(&lookup, SYNC_INTERVAL_VAR)? {
            config.min_sync_interval = Duration::from_secs(secs);
        }
        if let Some(value) = parse_u64(&lookup, FINISH_THRESHOLD_VAR)? {
            config.finish_threshold = i64::try_from(value)
                .ok()
                .filter(|v| *v > 0)
                .and_then(|v| ProgressPercent::new(v).ok())
                .ok_or(ConfigError::OutOfRange {
                    var: FINISH_THRESHOLD_VAR,
                    value,
                })?;
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    #[must_use]
    pub fn with_min_sync_interval(mut self, interval: Duration) -> Self {
        self.min_sync_interval = interval;
        self
    }

    #[must_use]
    pub fn with_finish_threshold(mut self, threshold: ProgressPercent) -> Self {
        self.finish_threshold = threshold;
        self
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<u64>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidNumber { var, raw })
}

fn positive_secs(var: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::OutOfRange { var, value: secs });
    }
    Ok(Duration::from_secs(secs))
}
