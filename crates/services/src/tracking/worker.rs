use std::sync::Arc;

use chrono::{DateTime, Utc};
use readltr_core::model::{ContentId, ProgressPercent, SessionId};
use storage::repository::ReadingSessionRepository;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A write scheduled against the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCommand {
    Update {
        percent: ProgressPercent,
        at: DateTime<Utc>,
    },
    Finish {
        at: DateTime<Utc>,
    },
    Close {
        percent: ProgressPercent,
        at: DateTime<Utc>,
    },
}

/// What the worker has achieved so far, published after every store call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub session_id: Option<SessionId>,
    pub creation_failed: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub last_synced_percent: Option<ProgressPercent>,
    pub closed: bool,
}

/// Handle to the per-session sync worker.
///
/// Commands are executed strictly in submission order. Commands submitted
/// before the session id is known wait in the queue until creation resolves.
/// Store failures are logged and dropped.
pub struct SyncHandle {
    commands: mpsc::UnboundedSender<SyncCommand>,
    report: watch::Receiver<SyncReport>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Spawn the worker and issue `create_session` for `content_id`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn spawn(
        store: Arc<dyn ReadingSessionRepository>,
        content_id: ContentId,
        started_at: DateTime<Utc>,
    ) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (report_tx, report) = watch::channel(SyncReport::default());
        let task = tokio::spawn(run(store, content_id, started_at, rx, report_tx));
        Self {
            commands,
            report,
            task,
        }
    }

    /// Queue a command. Never blocks; returns `false` if the worker is gone.
    pub fn submit(&self, command: SyncCommand) -> bool {
        if self.commands.send(command).is_err() {
            debug!(?command, "sync worker already stopped; command dropped");
            return false;
        }
        true
    }

    #[must_use]
    pub fn report(&self) -> SyncReport {
        self.report.borrow().clone()
    }

    /// Wait for the worker to drain its queue and exit, returning its final report.
    ///
    /// The worker exits after executing a `Close`, or once every sender is gone.
    pub async fn join(self) -> SyncReport {
        let Self {
            commands,
            report,
            task,
        } = self;
        drop(commands);
        if let Err(err) = task.await {
            warn!(%err, "sync worker terminated abnormally");
        }
        let last = report.borrow().clone();
        last
    }
}

async fn run(
    store: Arc<dyn ReadingSessionRepository>,
    content_id: ContentId,
    started_at: DateTime<Utc>,
    mut rx: mpsc::UnboundedReceiver<SyncCommand>,
    report: watch::Sender<SyncReport>,
) {
    let session_id = match store.create_session(&content_id, started_at).await {
        Ok(id) => {
            info!(%content_id, session_id = %id, "reading session opened");
            report.send_modify(|r| r.session_id = Some(id.clone()));
            id
        }
        Err(err) => {
            warn!(%content_id, %err, "reading session could not be created; progress stays local");
            report.send_modify(|r| r.creation_failed = true);
            discard(&mut rx).await;
            return;
        }
    };

    while let Some(command) = rx.recv().await {
        let result = match command {
            SyncCommand::Update { percent, at } => {
                store.update_progress(&session_id, percent, at).await
            }
            SyncCommand::Finish { at } => store.mark_finished(&session_id, at).await,
            SyncCommand::Close { percent, at } => {
                store.close_session(&session_id, percent, at).await
            }
        };

        match (command, result) {
            (_, Err(err)) => {
                warn!(session_id = %session_id, ?command, %err, "progress sync failed; dropped");
            }
            (SyncCommand::Update { percent, at } | SyncCommand::Close { percent, at }, Ok(())) => {
                report.send_modify(|r| {
                    r.last_synced_at = Some(at);
                    r.last_synced_percent = Some(percent);
                });
            }
            (SyncCommand::Finish { .. }, Ok(())) => {
                debug!(session_id = %session_id, "reading session marked as finished");
            }
        }

        if matches!(command, SyncCommand::Close { .. }) {
            report.send_modify(|r| r.closed = true);
            info!(session_id = %session_id, "reading session closed");
            break;
        }
    }
}

async fn discard(rx: &mut mpsc::UnboundedReceiver<SyncCommand>) {
    let mut dropped = 0_usize;
    while let Some(command) = rx.recv().await {
        dropped += 1;
        if matches!(command, SyncCommand::Close { .. }) {
            break;
        }
    }
    debug!(dropped, "discarded progress writes for a session that was never created");
}
