use std::sync::Arc;
use std::time::Duration;

use readltr_core::DEFAULT_SAMPLE_INTERVAL_SECS;
use readltr_core::model::{ScrollGeometry, Visibility};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// The content renderer: supplies the current scroll geometry and visibility.
pub trait Viewport: Send + Sync {
    fn geometry(&self) -> ScrollGeometry;
    fn visibility(&self) -> Visibility;
}

/// Notifications from the reader view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderEvent {
    Scroll,
    Resize,
    VisibilityChanged,
}

/// Why a sample was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleTrigger {
    Scroll,
    Resize,
    Visibility,
    Timer,
}

impl SampleTrigger {
    /// Fold a queued event into this trigger. Visibility changes are never
    /// coalesced away.
    fn merge(self, event: ReaderEvent) -> Self {
        match (self, event) {
            (SampleTrigger::Visibility, _) | (_, ReaderEvent::VisibilityChanged) => {
                SampleTrigger::Visibility
            }
            (_, ReaderEvent::Resize) => SampleTrigger::Resize,
            (_, ReaderEvent::Scroll) => SampleTrigger::Scroll,
        }
    }
}

impl From<ReaderEvent> for SampleTrigger {
    fn from(event: ReaderEvent) -> Self {
        match event {
            ReaderEvent::Scroll => SampleTrigger::Scroll,
            ReaderEvent::Resize => SampleTrigger::Resize,
            ReaderEvent::VisibilityChanged => SampleTrigger::Visibility,
        }
    }
}

/// One observation of the reader view.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub trigger: SampleTrigger,
    pub geometry: ScrollGeometry,
    pub visibility: Visibility,
}

/// Drives sampling from reader events and a fixed-period timer.
///
/// Queued events are collapsed into a single sample, and every event-driven
/// sample restarts the timer period so a timer sample never lands within one
/// period of an event sample. The timer is silent while the view is hidden.
#[derive(Debug, Clone, Copy)]
pub struct ProgressPoller {
    interval: Duration,
}

impl ProgressPoller {
    /// A poller sampling every `interval`. A zero interval falls back to the
    /// default period.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        if interval.is_zero() {
            warn!(
                default_secs = DEFAULT_SAMPLE_INTERVAL_SECS,
                "zero sample interval; using the default period"
            );
            return Self {
                interval: Duration::from_secs(DEFAULT_SAMPLE_INTERVAL_SECS),
            };
        }
        Self { interval }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start sampling. `on_sample` runs on the poller task.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start<F>(&self, viewport: Arc<dyn Viewport>, on_sample: F) -> PollerHandle
    where
        F: FnMut(Sample) + Send + 'static,
    {
        let (events, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(
            self.interval,
            viewport,
            rx,
            cancel.clone(),
            on_sample,
        ));
        PollerHandle {
            events,
            cancel,
            task: Some(task),
        }
    }
}

/// Running poller. Dropping the handle stops it.
pub struct PollerHandle {
    events: mpsc::UnboundedSender<ReaderEvent>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Forward a reader event. Ignored once stopped.
    pub fn notify(&self, event: ReaderEvent) {
        if self.cancel.is_cancelled() {
            return;
        }
        if self.events.send(event).is_err() {
            debug!(?event, "poller already exited; event ignored");
        }
    }

    /// Deregister the timer and event listeners. No sample starts after this
    /// returns.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Stop and wait for the poller task to exit.
    pub async fn join(mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                warn!(%err, "progress poller terminated abnormally");
            }
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_loop<F>(
    period: Duration,
    viewport: Arc<dyn Viewport>,
    mut rx: mpsc::UnboundedReceiver<ReaderEvent>,
    cancel: CancellationToken,
    mut on_sample: F,
) where
    F: FnMut(Sample),
{
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            Some(event) = rx.recv() => {
                let mut trigger = SampleTrigger::from(event);
                while let Ok(next) = rx.try_recv() {
                    trigger = trigger.merge(next);
                }
                if cancel.is_cancelled() {
                    break;
                }
                on_sample(Sample {
                    trigger,
                    geometry: viewport.geometry(),
                    visibility: viewport.visibility(),
                });
                ticker.reset();
            }
            _ = ticker.tick() => {
                let visibility = viewport.visibility();
                if visibility.is_visible() {
                    on_sample(Sample {
                        trigger: SampleTrigger::Timer,
                        geometry: viewport.geometry(),
                        visibility,
                    });
                }
            }
        }
    }

    debug!("progress poller stopped");
}
