use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tutor_core::model::{ConversationEntry, SessionContext, SessionId, TutorMode, UserId};

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

//
// ─── SESSION STORE ─────────────────────────────────────────────────────────────
//

/// Holds the live context of every open session, keyed by session id.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Register a new session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the id is already taken.
    async fn insert(&self, context: SessionContext) -> Result<(), StorageError>;

    /// Fetch a copy of a session's context.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn get(&self, id: SessionId) -> Result<SessionContext, StorageError>;

    /// Replace the stored context of an existing session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn save(&self, context: SessionContext) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn remove(&self, id: SessionId) -> Result<(), StorageError>;
}

//
// ─── TRANSCRIPTS ───────────────────────────────────────────────────────────────
//

/// Persisted header of a tutoring session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub exercise_title: String,
    pub mode: TutorMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    #[must_use]
    pub fn from_context(context: &SessionContext) -> Self {
        Self {
            session_id: context.session_id(),
            user_id: context.user_id().clone(),
            exercise_title: context.exercise().title().to_owned(),
            mode: context.mode(),
            started_at: context.started_at(),
            finished_at: None,
        }
    }
}

/// Durable log of every conversation, one transcript per session.
#[async_trait]
pub trait TranscriptRepository: Send + Sync {
    /// Create the transcript header for a session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if a transcript already exists for the session.
    async fn start_session(&self, record: &SessionRecord) -> Result<(), StorageError>;

    /// Append one message to a session's transcript.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session was never started.
    async fn append_entry(
        &self,
        session_id: SessionId,
        entry: &ConversationEntry,
    ) -> Result<(), StorageError>;

    /// All entries of a session in the order they were appended.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session was never started.
    async fn list_entries(&self, session_id: SessionId)
    -> Result<Vec<ConversationEntry>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session was never started.
    async fn mark_finished(
        &self,
        session_id: SessionId,
        finished_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session was never started.
    async fn get_session(&self, session_id: SessionId) -> Result<SessionRecord, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sessions: Arc<Mutex<HashMap<SessionId, SessionContext>>>,
    transcripts: Arc<Mutex<HashMap<SessionId, (SessionRecord, Vec<ConversationEntry>)>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemoryRepository {
    async fn insert(&self, context: SessionContext) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let id = context.session_id();
        if guard.contains_key(&id) {
            return Err(StorageError::Conflict);
        }
        guard.insert(id, context);
        Ok(())
    }

    async fn get(&self, id: SessionId) -> Result<SessionContext, StorageError> {
        let guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.get(&id).cloned().ok_or(StorageError::NotFound)
    }

    async fn save(&self, context: SessionContext) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let slot = guard
            .get_mut(&context.session_id())
            .ok_or(StorageError::NotFound)?;
        *slot = context;
        Ok(())
    }

    async fn remove(&self, id: SessionId) -> Result<(), StorageError> {
        let mut guard = self
            .sessions
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&id).map(|_| ()).ok_or(StorageError::NotFound)
    }
}

#[async_trait]
impl TranscriptRepository for InMemoryRepository {
    async fn start_session(&self, record: &SessionRecord) -> Result<(), StorageError> {
        let mut guard = self
            .transcripts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        if guard.contains_key(&record.session_id) {
            return Err(StorageError::Conflict);
        }
        guard.insert(record.session_id, (record.clone(), Vec::new()));
        Ok(())
    }

    async fn append_entry(
        &self,
        session_id: SessionId,
        entry: &ConversationEntry,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .transcripts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let (_, entries) = guard.get_mut(&session_id).ok_or(StorageError::NotFound)?;
        entries.push(entry.clone());
        Ok(())
    }

    async fn list_entries(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<ConversationEntry>, StorageError> {
        let guard = self
            .transcripts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .get(&session_id)
            .map(|(_, entries)| entries.clone())
            .ok_or(StorageError::NotFound)
    }

    async fn mark_finished(
        &self,
        session_id: SessionId,
        finished_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut guard = self
            .transcripts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        let (record, _) = guard.get_mut(&session_id).ok_or(StorageError::NotFound)?;
        record.finished_at = Some(finished_at);
        Ok(())
    }

    async fn get_session(&self, session_id: SessionId) -> Result<SessionRecord, StorageError> {
        let guard = self
            .transcripts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard
            .get(&session_id)
            .map(|(record, _)| record.clone())
            .ok_or(StorageError::NotFound)
    }
}

/// Aggregates the session store and transcript repository behind trait
/// objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionStore>,
    pub transcripts: Arc<dyn TranscriptRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let sessions: Arc<dyn SessionStore> = Arc::new(repo.clone());
        let transcripts: Arc<dyn TranscriptRepository> = Arc::new(repo);
        Self {
            sessions,
            transcripts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutor_core::ProgressionLimits;
    use tutor_core::model::{
        Checkpoint, ConversationRole, Exercise, ExerciseMetadata, Step,
    };
    use tutor_core::time::fixed_now;

    fn build_context() -> SessionContext {
        let cp = Checkpoint::new(
            1,
            "Main?",
            "Answer",
            None,
            vec![Step::new(1, "Guide?", "Guide answer", None)],
        )
        .unwrap();
        let exercise = Exercise::new(
            ExerciseMetadata::new("Variance", "Statistics", "beginner", "en"),
            "Hi",
            "Bye",
            vec![cp],
        )
        .unwrap();
        SessionContext::new(
            SessionId::random(),
            UserId::new("ana"),
            TutorMode::Socratic,
            Arc::new(exercise),
            ProgressionLimits::default(),
            fixed_now(),
        )
    }

    #[tokio::test]
    async fn session_store_insert_get_save_remove() {
        let repo = InMemoryRepository::new();
        let mut ctx = build_context();
        let id = ctx.session_id();

        repo.insert(ctx.clone()).await.unwrap();
        assert!(matches!(
            repo.insert(ctx.clone()).await.unwrap_err(),
            StorageError::Conflict
        ));

        ctx.record_interaction();
        repo.save(ctx).await.unwrap();
        let stored = repo.get(id).await.unwrap();
        assert_eq!(stored.iterations().total_interactions(), 1);

        repo.remove(id).await.unwrap();
        assert!(matches!(repo.get(id).await.unwrap_err(), StorageError::NotFound));
    }

    #[tokio::test]
    async fn save_requires_existing_session() {
        let repo = InMemoryRepository::new();
        let err = repo.save(build_context()).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn transcript_keeps_append_order() {
        let storage = Storage::in_memory();
        let mut ctx = build_context();
        let record = SessionRecord::from_context(&ctx);
        storage.transcripts.start_session(&record).await.unwrap();

        ctx.record(ConversationRole::User, "mean is 4", fixed_now());
        ctx.record(ConversationRole::Assistant, "why?", fixed_now());
        for entry in ctx.history() {
            storage
                .transcripts
                .append_entry(ctx.session_id(), entry)
                .await
                .unwrap();
        }

        let entries = storage
            .transcripts
            .list_entries(ctx.session_id())
            .await
            .unwrap();
        assert_eq!(entries, ctx.history());

        storage
            .transcripts
            .mark_finished(ctx.session_id(), fixed_now())
            .await
            .unwrap();
        let header = storage
            .transcripts
            .get_session(ctx.session_id())
            .await
            .unwrap();
        assert_eq!(header.finished_at, Some(fixed_now()));
        assert_eq!(header.exercise_title, "Variance");
    }

    #[tokio::test]
    async fn appending_to_unknown_session_fails() {
        let repo = InMemoryRepository::new();
        let ctx = build_context();
        let entry = ConversationEntry {
            role: ConversationRole::User,
            content: "hello".into(),
            recorded_at: fixed_now(),
            checkpoint: 1,
            step: 1,
        };
        let err = repo.append_entry(ctx.session_id(), &entry).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }
}
