use chrono::{DateTime, Utc};
use readltr_core::model::{ContentId, ProgressPercent, SessionId};

use super::SqliteRepository;
use super::mapping::{map_session_row, percent_to_i64};
use crate::repository::{ReadingSessionRecord, ReadingSessionRepository, StorageError};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl SqliteRepository {
    /// Resolve why a guarded write touched no rows.
    async fn missing_or_closed(&self, id: &SessionId) -> StorageError {
        let row = sqlx::query("SELECT closed_at FROM reading_sessions WHERE id = ?1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await;
        match row {
            Ok(Some(_)) => StorageError::Conflict,
            Ok(None) => StorageError::NotFound,
            Err(e) => conn(e),
        }
    }
}

#[async_trait::async_trait]
impl ReadingSessionRepository for SqliteRepository {
    async fn create_session(
        &self,
        content_id: &ContentId,
        started_at: DateTime<Utc>,
    ) -> Result<SessionId, StorageError> {
        let id = SessionId::generate();
        sqlx::query(
            r"
                INSERT INTO reading_sessions (id, content_id, progress, started_at, updated_at)
                VALUES (?1, ?2, 0, ?3, ?3)
            ",
        )
        .bind(id.as_str())
        .bind(content_id.as_str())
        .bind(started_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(id)
    }

    async fn update_progress(
        &self,
        id: &SessionId,
        percent: ProgressPercent,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                UPDATE reading_sessions
                SET progress = MAX(progress, ?2), updated_at = ?3
                WHERE id = ?1 AND closed_at IS NULL
            ",
        )
        .bind(id.as_str())
        .bind(percent_to_i64(percent))
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(self.missing_or_closed(id).await);
        }
        Ok(())
    }

    async fn close_session(
        &self,
        id: &SessionId,
        percent: ProgressPercent,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                UPDATE reading_sessions
                SET progress = MAX(progress, ?2), updated_at = ?3, closed_at = ?3
                WHERE id = ?1 AND closed_at IS NULL
            ",
        )
        .bind(id.as_str())
        .bind(percent_to_i64(percent))
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(self.missing_or_closed(id).await);
        }
        Ok(())
    }

    async fn mark_finished(&self, id: &SessionId, at: DateTime<Utc>) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                UPDATE reading_sessions
                SET finished_at = COALESCE(finished_at, ?2)
                WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_session(&self, id: &SessionId) -> Result<ReadingSessionRecord, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, content_id, progress, started_at, updated_at, closed_at, finished_at
                FROM reading_sessions
                WHERE id = ?1
            ",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_session_row(&row)
    }

    async fn list_sessions(
        &self,
        content_id: &ContentId,
        limit: u32,
    ) -> Result<Vec<ReadingSessionRecord>, StorageError> {
        let rows = sqlx::query(
            r"
                SELECT id, content_id, progress, started_at, updated_at, closed_at, finished_at
                FROM reading_sessions
                WHERE content_id = ?1
                ORDER BY started_at DESC, rowid DESC
                LIMIT ?2
            ",
        )
        .bind(content_id.as_str())
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_session_row).collect()
    }
}
