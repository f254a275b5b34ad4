use std::sync::Arc;

use readltr_core::model::ContentId;
use storage::repository::{ReadingSessionRepository, Storage};

use crate::Clock;
use crate::config::TrackerConfig;
use crate::error::TrackingServicesError;
use crate::remote::{HttpSessionStore, RemoteConfig};
use crate::tracking::{ProgressPoller, ReaderView, ReadingTracker, Viewport};

/// Assembles the session store, clock and config that every reader view shares.
#[derive(Clone)]
pub struct TrackingServices {
    clock: Clock,
    config: TrackerConfig,
    store: Arc<dyn ReadingSessionRepository>,
}

impl TrackingServices {
    #[must_use]
    pub fn new(
        clock: Clock,
        config: TrackerConfig,
        store: Arc<dyn ReadingSessionRepository>,
    ) -> Self {
        Self {
            clock,
            config,
            store,
        }
    }

    #[must_use]
    pub fn in_memory(clock: Clock, config: TrackerConfig) -> Self {
        Self::new(clock, config, Storage::in_memory().sessions)
    }

    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `TrackingServicesError` if storage initialization fails.
    pub async fn sqlite(
        db_url: &str,
        clock: Clock,
        config: TrackerConfig,
    ) -> Result<Self, TrackingServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::new(clock, config, storage.sessions))
    }

    /// Build services against the hosted backend configured in the environment.
    ///
    /// # Errors
    ///
    /// Returns `TrackingServicesError::RemoteNotConfigured` without
    /// `READLTR_API_URL`, or `TrackingServicesError::Config` for invalid
    /// tracker settings.
    pub fn http_from_env(clock: Clock) -> Result<Self, TrackingServicesError> {
        let remote = RemoteConfig::from_env().ok_or(TrackingServicesError::RemoteNotConfigured)?;
        let config = TrackerConfig::from_env()?;
        let store: Arc<dyn ReadingSessionRepository> = Arc::new(HttpSessionStore::new(remote));
        Ok(Self::new(clock, config, store))
    }

    /// An unopened tracker for `content_id`, for callers that drive samples themselves.
    #[must_use]
    pub fn tracker(&self, content_id: ContentId) -> ReadingTracker {
        ReadingTracker::new(content_id, Arc::clone(&self.store), self.config, self.clock)
    }

    /// Mount a reader view: opens the session and starts sampling.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn mount(&self, content_id: ContentId, viewport: Arc<dyn Viewport>) -> ReaderView {
        ReaderView::mount(
            self.tracker(content_id),
            viewport,
            ProgressPoller::new(self.config.sample_interval),
        )
    }

    #[must_use]
    pub fn store(&self) -> Arc<dyn ReadingSessionRepository> {
        Arc::clone(&self.store)
    }

    #[must_use]
    pub fn config(&self) -> TrackerConfig {
        self.config
    }

    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }
}
