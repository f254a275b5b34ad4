use chrono::{DateTime, Utc};
use readltr_core::model::{ContentId, ProgressPercent, SessionId};
use sqlx::Row;

use crate::repository::{ReadingSessionRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn percent_to_i64(p: ProgressPercent) -> i64 {
    i64::from(p.value())
}

pub(crate) fn map_session_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ReadingSessionRecord, StorageError> {
    let id = SessionId::new(row.try_get::<String, _>("id").map_err(ser)?).map_err(ser)?;
    let content_id =
        ContentId::new(row.try_get::<String, _>("content_id").map_err(ser)?).map_err(ser)?;
    let progress = ProgressPercent::new(row.try_get::<i64, _>("progress").map_err(ser)?)
        .map_err(ser)?;
    let started_at: DateTime<Utc> = row.try_get("started_at").map_err(ser)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(ser)?;
    let closed_at: Option<DateTime<Utc>> = row.try_get("closed_at").map_err(ser)?;
    let finished_at: Option<DateTime<Utc>> = row.try_get("finished_at").map_err(ser)?;

    Ok(ReadingSessionRecord {
        id,
        content_id,
        progress,
        started_at,
        updated_at,
        closed_at,
        finished_at,
    })
}
