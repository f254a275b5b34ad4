use std::sync::{Arc, Mutex, MutexGuard};

use readltr_core::model::{ProgressPercent, SessionState};
use tracing::warn;

use super::lifecycle::ReadingTracker;
use super::poller::{PollerHandle, ProgressPoller, ReaderEvent, Sample, SampleTrigger, Viewport};
use super::worker::SyncReport;

/// A mounted reader view: a `ReadingTracker` fed by a `ProgressPoller`.
pub struct ReaderView {
    tracker: Arc<Mutex<ReadingTracker>>,
    poller: PollerHandle,
}

impl ReaderView {
    /// Open the tracker's session and start sampling `viewport`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn mount(
        mut tracker: ReadingTracker,
        viewport: Arc<dyn Viewport>,
        poller: ProgressPoller,
    ) -> Self {
        tracker.mount();
        let tracker = Arc::new(Mutex::new(tracker));
        let sink = Arc::clone(&tracker);
        let poller = poller.start(viewport, move |sample: Sample| {
            let Some(mut guard) = lock(&sink) else {
                return;
            };
            match sample.trigger {
                SampleTrigger::Visibility => {
                    guard.on_visibility(sample.visibility, sample.geometry);
                }
                trigger => {
                    guard.sample(trigger, sample.geometry);
                }
            }
        });
        Self { tracker, poller }
    }

    /// Forward a scroll/resize/visibility notification from the renderer.
    pub fn notify(&self, event: ReaderEvent) {
        self.poller.notify(event);
    }

    #[must_use]
    pub fn state(&self) -> Option<SessionState> {
        lock(&self.tracker).map(|t| t.state())
    }

    #[must_use]
    pub fn progress(&self) -> Option<ProgressPercent> {
        lock(&self.tracker).map(|t| t.progress())
    }

    #[must_use]
    pub fn tracker(&self) -> Arc<Mutex<ReadingTracker>> {
        Arc::clone(&self.tracker)
    }

    /// Stop all listeners, then flush and close the session.
    pub fn unmount(&self) {
        self.poller.stop();
        if let Some(mut guard) = lock(&self.tracker) {
            guard.unmount();
        }
    }

    /// Unmount and wait for the poller and every queued write to finish.
    pub async fn shutdown(self) -> SyncReport {
        self.unmount();
        let Self { tracker, poller } = self;
        poller.join().await;
        let sync = lock(&tracker).and_then(|mut t| t.take_sync());
        match sync {
            Some(sync) => sync.join().await,
            None => SyncReport::default(),
        }
    }
}

fn lock(tracker: &Mutex<ReadingTracker>) -> Option<MutexGuard<'_, ReadingTracker>> {
    match tracker.lock() {
        Ok(guard) => Some(guard),
        Err(err) => {
            warn!(%err, "reading tracker lock poisoned; sample dropped");
            None
        }
    }
}
