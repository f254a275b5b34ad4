use chrono::{DateTime, Duration, Utc};
use readltr_core::model::ProgressPercent;
use tracing::debug;

/// Rate limiter for progress writes of a single session.
///
/// `offer` lets a value through only if it is above everything already let
/// through and at least `min_interval` has passed since the last accepted
/// write. `flush` always lets the final value through. Neither ever yields a
/// value below the highest one already yielded.
#[derive(Debug, Clone)]
pub struct SyncGate {
    min_interval: Duration,
    last_synced_at: DateTime<Utc>,
    highest_sent: ProgressPercent,
    pending: Option<ProgressPercent>,
}

impl SyncGate {
    /// Create a gate whose first window starts at `opened_at`.
    #[must_use]
    pub fn new(min_interval: std::time::Duration, opened_at: DateTime<Utc>) -> Self {
        Self {
            min_interval: Duration::from_std(min_interval).unwrap_or(Duration::MAX),
            last_synced_at: opened_at,
            highest_sent: ProgressPercent::ZERO,
            pending: None,
        }
    }

    /// Offer a computed percent. Returns the value to write, if any.
    pub fn offer(&mut self, percent: ProgressPercent, now: DateTime<Utc>) -> Option<ProgressPercent> {
        if percent <= self.highest_sent {
            return None;
        }

        if now - self.last_synced_at < self.min_interval {
            debug!(%percent, "progress buffered until the sync window elapses");
            self.pending = Some(self.pending.map_or(percent, |p| p.max(percent)));
            return None;
        }

        self.last_synced_at = now;
        self.highest_sent = percent;
        self.pending = None;
        Some(percent)
    }

    /// Final write at teardown, bypassing the rate limit.
    pub fn flush(&mut self, percent: ProgressPercent) -> ProgressPercent {
        let value = self
            .pending
            .take()
            .map_or(percent, |p| p.max(percent))
            .max(self.highest_sent);
        self.highest_sent = value;
        value
    }

    #[must_use]
    pub fn last_synced_at(&self) -> DateTime<Utc> {
        self.last_synced_at
    }

    #[must_use]
    pub fn highest_sent(&self) -> ProgressPercent {
        self.highest_sent
    }

    /// Highest value held back by the rate limit since the last accepted write.
    #[must_use]
    pub fn pending(&self) -> Option<ProgressPercent> {
        self.pending
    }
}
