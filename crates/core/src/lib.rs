#![forbid(unsafe_code)]

pub mod model;
pub mod time;

pub use time::Clock;

/// Percent at which a reading session counts as fully read.
pub const FINISH_THRESHOLD: u8 = 90;

/// Seconds between timer-driven progress samples while the reader is visible.
pub const DEFAULT_SAMPLE_INTERVAL_SECS: u64 = 10;

/// Minimum seconds between two rate-limited progress writes for one session.
pub const DEFAULT_MIN_SYNC_INTERVAL_SECS: u64 = 10;
