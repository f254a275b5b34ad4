//! Session store backed by the hosted ReadLtr API.

use std::env;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use readltr_core::model::{ContentId, ProgressPercent, SessionId};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use storage::repository::{ReadingSessionRecord, ReadingSessionRepository, StorageError};

#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

impl RemoteConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("READLTR_API_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let api_key = env::var("READLTR_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        Some(Self { base_url, api_key })
    }
}

#[derive(Clone)]
pub struct HttpSessionStore {
    client: Client,
    config: RemoteConfig,
}

impl HttpSessionStore {
    #[must_use]
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// `{base_url}/reading-sessions/{segments..}` with each segment escaped.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, StorageError> {
        let mut url = Url::parse(self.config.base_url.trim())
            .map_err(|e| StorageError::Connection(format!("invalid base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| StorageError::Connection("base url cannot carry a path".into()))?
            .pop_if_empty()
            .push("reading-sessions")
            .extend(segments);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StorageError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        check_status(response.status())?;
        Ok(response)
    }
}

fn check_status(status: StatusCode) -> Result<(), StorageError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(StorageError::NotFound),
        StatusCode::CONFLICT => Err(StorageError::Conflict),
        s => Err(StorageError::Connection(format!("request failed with status {s}"))),
    }
}

#[derive(Debug, Serialize)]
struct CreateSessionRequest<'a> {
    content_id: &'a ContentId,
    started_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CreateSessionResponse {
    session_id: SessionId,
}

#[derive(Debug, Serialize)]
struct ProgressRequest {
    progress: ProgressPercent,
    at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
struct FinishRequest {
    finished_at: DateTime<Utc>,
}

#[async_trait]
impl ReadingSessionRepository for HttpSessionStore {
    async fn create_session(
        &self,
        content_id: &ContentId,
        started_at: DateTime<Utc>,
    ) -> Result<SessionId, StorageError> {
        let url = self.endpoint(&[])?;
        let response = self
            .send(self.client.post(url).json(&CreateSessionRequest {
                content_id,
                started_at,
            }))
            .await?;
        let body: CreateSessionResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(body.session_id)
    }

    async fn update_progress(
        &self,
        id: &SessionId,
        percent: ProgressPercent,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let url = self.endpoint(&[id.as_str()])?;
        self.send(self.client.patch(url).json(&ProgressRequest {
            progress: percent,
            at,
        }))
        .await?;
        Ok(())
    }

    async fn close_session(
        &self,
        id: &SessionId,
        percent: ProgressPercent,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let url = self.endpoint(&[id.as_str(), "close"])?;
        self.send(self.client.post(url).json(&ProgressRequest {
            progress: percent,
            at,
        }))
        .await?;
        Ok(())
    }

    async fn mark_finished(&self, id: &SessionId, at: DateTime<Utc>) -> Result<(), StorageError> {
        let url = self.endpoint(&[id.as_str(), "finish"])?;
        self.send(
            self.client
                .post(url)
                .json(&FinishRequest { finished_at: at }),
        )
        .await?;
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<ReadingSessionRecord, StorageError> {
        let url = self.endpoint(&[id.as_str()])?;
        self.send(self.client.get(url))
            .await?
            .json()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }

    async fn list_sessions(
        &self,
        content_id: &ContentId,
        limit: u32,
    ) -> Result<Vec<ReadingSessionRecord>, StorageError> {
        let mut url = self.endpoint(&[])?;
        url.query_pairs_mut()
            .append_pair("content_id", content_id.as_str())
            .append_pair("limit", &limit.to_string());
        self.send(self.client.get(url))
            .await?
            .json()
            .await
            .map_err(|e| StorageError::Serialization(e.to_string()))
    }
}
