use async_trait::async_trait;
use chrono::{DateTime, Utc};
use readltr_core::model::{ContentId, ProgressPercent, SessionId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Persisted shape of a reading session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingSessionRecord {
    pub id: SessionId,
    pub content_id: ContentId,
    pub progress: ProgressPercent,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ReadingSessionRecord {
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }

    /// Applies a progress write. Stored progress never decreases.
    fn apply_progress(&mut self, percent: ProgressPercent, at: DateTime<Utc>) {
        self.progress = self.progress.max(percent);
        self.updated_at = at;
    }
}

/// Remote persistence contract for reading sessions.
///
/// Implementations must never lower stored progress and must reject writes to
/// closed sessions with `StorageError::Conflict`.
#[async_trait]
pub trait ReadingSessionRepository: Send + Sync {
    /// Open a new session for the given content and return its id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the session cannot be created.
    async fn create_session(
        &self,
        content_id: &ContentId,
        started_at: DateTime<Utc>,
    ) -> Result<SessionId, StorageError>;

    /// Record the latest progress for an open session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for unknown ids, `StorageError::Conflict`
    /// for closed sessions, or other storage errors.
    async fn update_progress(
        &self,
        id: &SessionId,
        percent: ProgressPercent,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Write the final progress and close the session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for unknown ids, `StorageError::Conflict`
    /// if the session is already closed, or other storage errors.
    async fn close_session(
        &self,
        id: &SessionId,
        percent: ProgressPercent,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Stamp the session as fully read. Repeated calls keep the first stamp.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` for unknown ids, or other storage errors.
    async fn mark_finished(&self, id: &SessionId, at: DateTime<Utc>) -> Result<(), StorageError>;

    /// Fetch a session by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_session(&self, id: &SessionId) -> Result<ReadingSessionRecord, StorageError>;

    /// List sessions recorded for a content id, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the query fails.
    async fn list_sessions(
        &self,
        content_id: &ContentId,
        limit: u32,
    ) -> Result<Vec<ReadingSessionRecord>, StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sessions: Arc<Mutex<HashMap<SessionId, ReadingSessionRecord>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_open_session<T>(
        &self,
        id: &SessionId,
        f: impl FnOnce(&mut ReadingSessionRecord) -> T,
    ) -> Result<T, StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let record = guard.get_mut(id).ok_or(StorageError::NotFound)?;
        if record.is_closed() {
            return Err(StorageError::Conflict);
        }
        Ok(f(record))
    }
}

#[async_trait]
impl ReadingSessionRepository for InMemoryRepository {
    async fn create_session(
        &self,
        content_id: &ContentId,
        started_at: DateTime<Utc>,
    ) -> Result<SessionId, StorageError> {
        let id = SessionId::generate();
        let record = ReadingSessionRecord {
            id: id.clone(),
            content_id: content_id.clone(),
            progress: ProgressPercent::ZERO,
            started_at,
            updated_at: started_at,
            closed_at: None,
            finished_at: None,
        };
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(id.clone(), record);
        Ok(id)
    }

    async fn update_progress(
        &self,
        id: &SessionId,
        percent: ProgressPercent,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.with_open_session(id, |record| record.apply_progress(percent, at))
    }

    async fn close_session(
        &self,
        id: &SessionId,
        percent: ProgressPercent,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.with_open_session(id, |record| {
            record.apply_progress(percent, at);
            record.closed_at = Some(at);
        })
    }

    async fn mark_finished(&self, id: &SessionId, at: DateTime<Utc>) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let record = guard.get_mut(id).ok_or(StorageError::NotFound)?;
        record.finished_at.get_or_insert(at);
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<ReadingSessionRecord, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(id).cloned().ok_or(StorageError::NotFound)
    }

    async fn list_sessions(
        &self,
        content_id: &ContentId,
        limit: u32,
    ) -> Result<Vec<ReadingSessionRecord>, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let mut found: Vec<_> = guard
            .values()
            .filter(|r| &r.content_id == content_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        found.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(found)
    }
}

/// Aggregates the session repository behind a trait object for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn ReadingSessionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let sessions: Arc<dyn ReadingSessionRepository> = Arc::new(InMemoryRepository::new());
        Self { sessions }
    }
}
