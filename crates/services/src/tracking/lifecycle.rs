use std::sync::Arc;

use chrono::{DateTime, Utc};
use readltr_core::Clock;
use readltr_core::model::{
    ContentId, ProgressPercent, ReadingSession, ScrollGeometry, SessionState, Visibility,
};
use storage::repository::ReadingSessionRepository;
use tracing::{debug, info};

use super::gate::SyncGate;
use super::poller::SampleTrigger;
use super::worker::{SyncCommand, SyncHandle, SyncReport};
use crate::config::TrackerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    Hidden,
    Finished,
    Unmounted,
    Dropped,
}

/// Reading-session lifecycle for one mounted reader view.
///
/// Owns the local `ReadingSession`, the `SyncGate` and the sync worker.
/// The session is closed exactly once per mount: on the first switch to
/// hidden, when the finish threshold is reached, on `unmount`, or on drop.
/// After that, samples still raise the local progress but nothing is written.
pub struct ReadingTracker {
    clock: Clock,
    config: TrackerConfig,
    store: Arc<dyn ReadingSessionRepository>,
    session: ReadingSession,
    state: SessionState,
    gate: SyncGate,
    sync: Option<SyncHandle>,
    visibility: Visibility,
}

impl ReadingTracker {
    /// Build an unopened tracker. Nothing is written until [`ReadingTracker::mount`].
    #[must_use]
    pub fn new(
        content_id: ContentId,
        store: Arc<dyn ReadingSessionRepository>,
        config: TrackerConfig,
        clock: Clock,
    ) -> Self {
        let now = clock.now();
        Self {
            clock,
            config,
            store,
            session: ReadingSession::new(content_id, now),
            state: SessionState::Unopened,
            gate: SyncGate::new(config.min_sync_interval, now),
            sync: None,
            visibility: Visibility::Visible,
        }
    }

    /// Open the session: spawns the sync worker, which creates it remotely.
    ///
    /// Only the first call has an effect.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn mount(&mut self) {
        if self.state != SessionState::Unopened {
            debug!(content_id = %self.session.content_id(), state = %self.state, "mount ignored");
            return;
        }
        let now = self.clock.now();
        self.session = ReadingSession::new(self.session.content_id().clone(), now);
        self.gate = SyncGate::new(self.config.min_sync_interval, now);
        self.sync = Some(SyncHandle::spawn(
            Arc::clone(&self.store),
            self.session.content_id().clone(),
            now,
        ));
        self.state = SessionState::Opening;
        info!(content_id = %self.session.content_id(), "reading session opening");
    }

    /// Fold one sample into the session. Returns the committed progress.
    pub fn sample(&mut self, trigger: SampleTrigger, geometry: ScrollGeometry) -> ProgressPercent {
        self.refresh();
        let now = self.clock.now();
        let percent = geometry.percent();
        self.session.record(percent, now);
        let progress = self.session.progress();

        if !self.state.accepts_progress() {
            return progress;
        }

        if progress >= self.config.finish_threshold && !self.session.is_finished() {
            self.finish(now);
            return progress;
        }

        if let Some(value) = self.gate.offer(progress, now) {
            debug!(?trigger, %value, "progress accepted for sync");
            self.submit(SyncCommand::Update { percent: value, at: now });
        }
        progress
    }

    pub fn on_scroll(&mut self, geometry: ScrollGeometry) -> ProgressPercent {
        self.sample(SampleTrigger::Scroll, geometry)
    }

    pub fn on_resize(&mut self, geometry: ScrollGeometry) -> ProgressPercent {
        self.sample(SampleTrigger::Resize, geometry)
    }

    pub fn on_tick(&mut self, geometry: ScrollGeometry) -> ProgressPercent {
        self.sample(SampleTrigger::Timer, geometry)
    }

    /// Visibility change. Samples first; the first switch to hidden closes
    /// the session. Becoming visible again never opens a new one.
    pub fn on_visibility(
        &mut self,
        visibility: Visibility,
        geometry: ScrollGeometry,
    ) -> ProgressPercent {
        self.visibility = visibility;
        let progress = self.sample(SampleTrigger::Visibility, geometry);
        if visibility == Visibility::Hidden {
            self.close(CloseReason::Hidden);
        }
        progress
    }

    /// Tear down: flush the latest progress and close the session.
    pub fn unmount(&mut self) {
        self.close(CloseReason::Unmounted);
    }

    /// Unmount and wait until every queued write has been attempted.
    pub async fn shutdown(mut self) -> SyncReport {
        self.unmount();
        match self.sync.take() {
            Some(sync) => sync.join().await,
            None => SyncReport::default(),
        }
    }

    pub(crate) fn take_sync(&mut self) -> Option<SyncHandle> {
        self.sync.take()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn progress(&self) -> ProgressPercent {
        self.session.progress()
    }

    #[must_use]
    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Local session snapshot, with the latest sync results applied.
    pub fn session(&mut self) -> &ReadingSession {
        self.refresh();
        &self.session
    }

    #[must_use]
    pub fn gate(&self) -> &SyncGate {
        &self.gate
    }

    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Mutable access to the clock, to step a fixed clock in replays and tests.
    pub fn clock_mut(&mut self) -> &mut Clock {
        &mut self.clock
    }

    /// Pull results published by the sync worker into the local session.
    fn refresh(&mut self) {
        let Some(sync) = &self.sync else {
            return;
        };
        let report = sync.report();

        if let Some(id) = report.session_id {
            if self.session.session_id().is_none() {
                self.session.attach_session_id(id);
            }
            if self.state == SessionState::Opening {
                self.state = SessionState::Open;
                debug!(content_id = %self.session.content_id(), "reading session open");
            }
        }
        if let Some(at) = report.last_synced_at {
            self.session.mark_synced(at);
        }
    }

    fn finish(&mut self, now: DateTime<Utc>) {
        if !self.session.mark_finished(now) {
            return;
        }
        info!(
            content_id = %self.session.content_id(),
            progress = %self.session.progress(),
            "reading session finished"
        );
        self.submit(SyncCommand::Finish { at: now });
        self.close(CloseReason::Finished);
    }

    fn close(&mut self, reason: CloseReason) {
        if self.state.is_terminal() {
            return;
        }
        if self.state == SessionState::Unopened {
            self.state = SessionState::Closed;
            return;
        }

        self.state = SessionState::Closing;
        let now = self.clock.now();
        let percent = self.gate.flush(self.session.progress());
        self.submit(SyncCommand::Close { percent, at: now });
        self.state = SessionState::Closed;
        info!(
            content_id = %self.session.content_id(),
            ?reason,
            %percent,
            "reading session closing"
        );
    }

    fn submit(&self, command: SyncCommand) {
        if let Some(sync) = &self.sync {
            sync.submit(command);
        }
    }
}

impl Drop for ReadingTracker {
    fn drop(&mut self) {
        self.close(CloseReason::Dropped);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use readltr_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    fn tracker(store: &InMemoryRepository) -> ReadingTracker {
        ReadingTracker::new(
            ContentId::new("article-1").unwrap(),
            Arc::new(store.clone()),
            TrackerConfig::default(),
            fixed_clock(),
        )
    }

    fn geometry(top: f64) -> ScrollGeometry {
        ScrollGeometry::new(top, 10_000.0, 1000.0)
    }

    #[test]
    fn unopened_tracker_samples_locally() {
        let store = InMemoryRepository::new();
        let mut t = tracker(&store);
        assert_eq!(t.state(), SessionState::Unopened);
        assert_eq!(t.on_scroll(geometry(1000.0)).value(), 20);
        t.unmount();
        assert_eq!(t.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn mount_opens_once() {
        let store = InMemoryRepository::new();
        let mut t = tracker(&store);
        t.mount();
        assert_eq!(t.state(), SessionState::Opening);
        t.mount();
        t.shutdown().await;

        let sessions = store
            .list_sessions(&ContentId::new("article-1").unwrap(), 10)
            .await
            .unwrap();
        assert_eq!(sessions.len(), 1);
    }

    #[tokio::test]
    async fn opening_becomes_open_once_session_exists() {
        let store = InMemoryRepository::new();
        let mut t = tracker(&store);
        t.mount();
        tokio::task::yield_now().await;
        t.on_tick(geometry(0.0));
        assert_eq!(t.state(), SessionState::Open);
        assert!(t.session().session_id().is_some());
    }

    #[tokio::test]
    async fn scroll_back_up_does_not_regress() {
        let store = InMemoryRepository::new();
        let mut t = tracker(&store);
        t.mount();
        assert_eq!(t.on_scroll(geometry(4000.0)).value(), 50);
        t.clock_mut().advance(Duration::seconds(1));
        assert_eq!(t.on_scroll(geometry(0.0)).value(), 50);
        assert_eq!(
            t.session().last_computed_at(),
            Some(readltr_core::time::fixed_now() + Duration::seconds(1))
        );
    }

    #[tokio::test]
    async fn finish_threshold_closes_with_the_progress_reached_then() {
        let store = InMemoryRepository::new();
        let mut t = tracker(&store);
        t.mount();
        assert_eq!(t.on_scroll(geometry(8100.0)).value(), 91);
        assert_eq!(t.state(), SessionState::Closed);

        t.clock_mut().advance(Duration::seconds(30));
        assert_eq!(t.on_scroll(geometry(9000.0)).value(), 100);
        t.unmount();
        let report = t.shutdown().await;

        let id = report.session_id.expect("session created");
        let record = store.get_session(&id).await.unwrap();
        assert_eq!(record.progress.value(), 91);
        assert!(record.finished_at.is_some());
        assert!(record.is_closed());
    }

    #[tokio::test]
    async fn hidden_closes_and_visible_does_not_reopen() {
        let store = InMemoryRepository::new();
        let mut t = tracker(&store);
        t.mount();
        t.on_visibility(Visibility::Hidden, geometry(0.0));
        assert_eq!(t.state(), SessionState::Closed);

        t.on_visibility(Visibility::Visible, geometry(2000.0));
        assert_eq!(t.state(), SessionState::Closed);
        assert_eq!(t.progress().value(), 30);
    }
}
