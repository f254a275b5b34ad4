#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use readltr_core::model::{ContentId, ProgressPercent, ScrollGeometry, SessionId, Visibility};
use readltr_core::time::fixed_now;
use services::Viewport;
use storage::repository::{
    InMemoryRepository, ReadingSessionRecord, ReadingSessionRepository, StorageError,
};
use tokio::sync::Notify;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create,
    Update(u8, DateTime<Utc>),
    Finish,
    Close(u8),
}

/// In-memory store that records every call in arrival order.
#[derive(Default)]
pub struct RecordingStore {
    pub inner: InMemoryRepository,
    calls: Mutex<Vec<Call>>,
    pub fail_create: bool,
    pub hold_create: Option<Arc<Notify>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(u8, DateTime<Utc>)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Update(p, at) => Some((p, at)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matcher: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|c| matcher(c)).count()
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ReadingSessionRepository for RecordingStore {
    async fn create_session(
        &self,
        content_id: &ContentId,
        started_at: DateTime<Utc>,
    ) -> Result<SessionId, StorageError> {
        if let Some(release) = &self.hold_create {
            release.notified().await;
        }
        self.log(Call::Create);
        if self.fail_create {
            return Err(StorageError::Connection("backend unreachable".into()));
        }
        self.inner.create_session(content_id, started_at).await
    }

    async fn update_progress(
        &self,
        id: &SessionId,
        percent: ProgressPercent,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.log(Call::Update(percent.value(), at));
        self.inner.update_progress(id, percent, at).await
    }

    async fn close_session(
        &self,
        id: &SessionId,
        percent: ProgressPercent,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.log(Call::Close(percent.value()));
        self.inner.close_session(id, percent, at).await
    }

    async fn mark_finished(&self, id: &SessionId, at: DateTime<Utc>) -> Result<(), StorageError> {
        self.log(Call::Finish);
        self.inner.mark_finished(id, at).await
    }

    async fn get_session(&self, id: &SessionId) -> Result<ReadingSessionRecord, StorageError> {
        self.inner.get_session(id).await
    }

    async fn list_sessions(
        &self,
        content_id: &ContentId,
        limit: u32,
    ) -> Result<Vec<ReadingSessionRecord>, StorageError> {
        self.inner.list_sessions(content_id, limit).await
    }
}

/// Renderer stand-in whose geometry and visibility tests set directly.
pub struct FakeViewport {
    state: Mutex<(ScrollGeometry, Visibility)>,
}

impl FakeViewport {
    pub fn new(content_height: f64, viewport_height: f64) -> Self {
        Self {
            state: Mutex::new((
                ScrollGeometry::new(0.0, content_height, viewport_height),
                Visibility::Visible,
            )),
        }
    }

    pub fn scroll_to(&self, top: f64) {
        self.state.lock().unwrap().0.scroll_top = top;
    }

    pub fn set_visibility(&self, visibility: Visibility) {
        self.state.lock().unwrap().1 = visibility;
    }
}

impl Viewport for FakeViewport {
    fn geometry(&self) -> ScrollGeometry {
        self.state.lock().unwrap().0
    }

    fn visibility(&self) -> Visibility {
        self.state.lock().unwrap().1
    }
}

pub fn content() -> ContentId {
    ContentId::new("article-1").unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    fixed_now() + Duration::seconds(secs)
}

/// Geometry over a ten-screen article, where `percent = (top + 1000) / 100`.
pub fn long_article(top: f64) -> ScrollGeometry {
    ScrollGeometry::new(top, 10_000.0, 1000.0)
}

pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}
