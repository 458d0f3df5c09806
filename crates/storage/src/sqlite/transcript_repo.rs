use chrono::{DateTime, Utc};
use tutor_core::model::{ConversationEntry, SessionId};

use super::SqliteRepository;
use super::mapping::{map_entry_row, map_session_row, usize_to_i64};
use crate::repository::{SessionRecord, StorageError, TranscriptRepository};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

impl SqliteRepository {
    async fn session_exists(&self, session_id: SessionId) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT 1 FROM tutoring_sessions WHERE id = ?1")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        Ok(row.is_some())
    }
}

#[async_trait::async_trait]
impl TranscriptRepository for SqliteRepository {
    async fn start_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO tutoring_sessions (
                    id, user_id, exercise_title, mode, started_at, finished_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(id) DO NOTHING
            ",
        )
        .bind(record.session_id.to_string())
        .bind(record.user_id.as_str())
        .bind(record.exercise_title.as_str())
        .bind(record.mode.as_str())
        .bind(record.started_at)
        .bind(record.finished_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        Ok(())
    }

    async fn append_entry(
        &self,
        session_id: SessionId,
        entry: &ConversationEntry,
    ) -> Result<(), StorageError> {
        if !self.session_exists(session_id).await? {
            return Err(StorageError::NotFound);
        }
        sqlx::query(
            r"
                INSERT INTO transcript_entries (
                    session_id, role, content, recorded_at, checkpoint, step
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(session_id.to_string())
        .bind(entry.role.as_str())
        .bind(entry.content.as_str())
        .bind(entry.recorded_at)
        .bind(usize_to_i64("checkpoint", entry.checkpoint)?)
        .bind(usize_to_i64("step", entry.step)?)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn list_entries(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<ConversationEntry>, StorageError> {
        if !self.session_exists(session_id).await? {
            return Err(StorageError::NotFound);
        }
        let rows = sqlx::query(
            r"
                SELECT role, content, recorded_at, checkpoint, step
                FROM transcript_entries
                WHERE session_id = ?1
                ORDER BY id ASC
            ",
        )
        .bind(session_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_entry_row).collect()
    }

    async fn mark_finished(
        &self,
        session_id: SessionId,
        finished_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE tutoring_sessions SET finished_at = ?1 WHERE id = ?2")
            .bind(finished_at)
            .bind(session_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn get_session(&self, session_id: SessionId) -> Result<SessionRecord, StorageError> {
        let row = sqlx::query(
            r"
                SELECT id, user_id, exercise_title, mode, started_at, finished_at
                FROM tutoring_sessions
                WHERE id = ?1
            ",
        )
        .bind(session_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?
        .ok_or(StorageError::NotFound)?;

        map_session_row(&row)
    }
}
