use chrono::{DateTime, Utc};
use sqlx::Row;
use tutor_core::model::{ConversationEntry, ConversationRole, SessionId, TutorMode, UserId};

use crate::repository::{SessionRecord, StorageError};

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn usize_to_i64(field: &'static str, v: usize) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_usize(field: &'static str, v: i64) -> Result<usize, StorageError> {
    usize::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn map_session_row(row: &sqlx::sqlite::SqliteRow) -> Result<SessionRecord, StorageError> {
    let id: String = row.try_get("id").map_err(ser)?;
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    let mode: String = row.try_get("mode").map_err(ser)?;
    Ok(SessionRecord {
        session_id: id.parse::<SessionId>().map_err(ser)?,
        user_id: UserId::new(user_id),
        exercise_title: row.try_get("exercise_title").map_err(ser)?,
        mode: mode.parse::<TutorMode>().map_err(ser)?,
        started_at: row.try_get::<DateTime<Utc>, _>("started_at").map_err(ser)?,
        finished_at: row
            .try_get::<Option<DateTime<Utc>>, _>("finished_at")
            .map_err(ser)?,
    })
}

pub(crate) fn map_entry_row(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<ConversationEntry, StorageError> {
    let role: String = row.try_get("role").map_err(ser)?;
    Ok(ConversationEntry {
        role: role.parse::<ConversationRole>().map_err(ser)?,
        content: row.try_get("content").map_err(ser)?,
        recorded_at: row.try_get("recorded_at").map_err(ser)?,
        checkpoint: i64_to_usize("checkpoint", row.try_get("checkpoint").map_err(ser)?)?,
        step: i64_to_usize("step", row.try_get("step").map_err(ser)?)?,
    })
}
