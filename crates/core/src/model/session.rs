use chrono::{DateTime, Utc};

use crate::model::{ContentId, ProgressPercent, SessionId};

/// Local view of one reading session.
///
/// Progress only ever moves forward: a transient scroll back up is computed
/// (and stamped in `last_computed_at`) but never committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingSession {
    content_id: ContentId,
    session_id: Option<SessionId>,
    progress: ProgressPercent,
    started_at: DateTime<Utc>,
    last_computed_at: Option<DateTime<Utc>>,
    last_synced_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl ReadingSession {
    #[must_use]
    pub fn new(content_id: ContentId, started_at: DateTime<Utc>) -> Self {
        Self {
            content_id,
            session_id: None,
            progress: ProgressPercent::ZERO,
            started_at,
            last_computed_at: None,
            last_synced_at: None,
            finished_at: None,
        }
    }

    /// Record a freshly computed percent.
    ///
    /// Returns `true` when the committed progress increased.
    pub fn record(&mut self, percent: ProgressPercent, now: DateTime<Utc>) -> bool {
        self.last_computed_at = Some(now);
        if percent > self.progress {
            self.progress = percent;
            true
        } else {
            false
        }
    }

    pub fn attach_session_id(&mut self, id: SessionId) {
        self.session_id = Some(id);
    }

    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.last_synced_at = Some(at);
    }

    /// Stamp the session as fully read. Only the first call has an effect.
    pub fn mark_finished(&mut self, at: DateTime<Utc>) -> bool {
        if self.finished_at.is_some() {
            return false;
        }
        self.finished_at = Some(at);
        true
    }

    #[must_use]
    pub fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    #[must_use]
    pub fn progress(&self) -> ProgressPercent {
        self.progress
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn last_computed_at(&self) -> Option<DateTime<Utc>> {
        self.last_computed_at
    }

    #[must_use]
    pub fn last_synced_at(&self) -> Option<DateTime<Utc>> {
        self.last_synced_at
    }

    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;
    use chrono::Duration;

    fn pct(v: i64) -> ProgressPercent {
        ProgressPercent::new(v).unwrap()
    }

    fn session() -> ReadingSession {
        ReadingSession::new(ContentId::new("c-1").unwrap(), fixed_now())
    }

    #[test]
    fn record_commits_increases_only() {
        let mut s = session();
        let now = fixed_now();

        assert!(s.record(pct(40), now));
        assert!(!s.record(pct(20), now + Duration::seconds(1)));
        assert_eq!(s.progress(), pct(40));
        assert!(s.record(pct(41), now + Duration::seconds(2)));
        assert_eq!(s.progress(), pct(41));
    }

    #[test]
    fn record_stamps_computation_even_without_increase() {
        let mut s = session();
        let later = fixed_now() + Duration::seconds(30);
        s.record(ProgressPercent::ZERO, later);
        assert_eq!(s.last_computed_at(), Some(later));
        assert_eq!(s.last_synced_at(), None);
    }

    #[test]
    fn finish_is_stamped_once() {
        let mut s = session();
        let first = fixed_now() + Duration::seconds(5);
        assert!(s.mark_finished(first));
        assert!(!s.mark_finished(first + Duration::seconds(5)));
        assert_eq!(s.finished_at(), Some(first));
    }

    #[test]
    fn session_id_absent_until_attached() {
        let mut s = session();
        assert!(s.session_id().is_none());
        s.attach_session_id(SessionId::new("s-9").unwrap());
        assert_eq!(s.session_id().map(SessionId::as_str), Some("s-9"));
    }
}
