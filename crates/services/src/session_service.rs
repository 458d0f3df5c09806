use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use storage::repository::{SessionRecord, SessionStore, Storage, TranscriptRepository};
use tracing::{info, warn};
use tutor_core::model::{
    ConversationEntry, ConversationRole, Exercise, SessionContext, SessionId, TutorMode, UserId,
};
use tutor_core::{Action, Clock, ProgressionLimits};

use crate::coordinator::TutorCoordinator;
use crate::error::{SessionServiceError, TutorError};
use crate::response::{TutorResponse, checkpoint_intro};

const GOTO_USAGE: &str = "Usage: /goto <checkpoint_number>";
const GOTO_NOT_A_NUMBER: &str = "Usage: /goto <checkpoint_number> (number must be an integer)";

/// Snapshot of where a session stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub exercise_title: String,
    pub mode: TutorMode,
    pub started_at: DateTime<Utc>,
    pub checkpoint: usize,
    pub step: usize,
    pub total_interactions: u32,
    pub complete: bool,
    pub conversation_length: usize,
}

impl SessionSummary {
    #[must_use]
    pub fn from_context(ctx: &SessionContext) -> Self {
        Self {
            session_id: ctx.session_id(),
            user_id: ctx.user_id().clone(),
            exercise_title: ctx.exercise().title().to_owned(),
            mode: ctx.mode(),
            started_at: ctx.started_at(),
            checkpoint: ctx.current_checkpoint(),
            step: ctx.current_step(),
            total_interactions: ctx.iterations().total_interactions(),
            complete: ctx.is_complete(),
            conversation_length: ctx.history().len(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Goto(usize),
    BadGoto(&'static str),
    Message(&'a str),
}

fn classify(text: &str) -> Input<'_> {
    let text = text.trim();
    if text.is_empty() {
        return Input::Empty;
    }
    let Some(rest) = text.strip_prefix("/goto") else {
        return Input::Message(text);
    };
    match rest.split_whitespace().next() {
        None => Input::BadGoto(GOTO_USAGE),
        Some(arg) => arg
            .parse::<usize>()
            .map_or(Input::BadGoto(GOTO_NOT_A_NUMBER), Input::Goto),
    }
}

/// Owns the lifecycle of tutoring sessions: creation, message handling and transcripts.
#[derive(Clone)]
pub struct TutorSessionService {
    clock: Clock,
    limits: ProgressionLimits,
    coordinator: TutorCoordinator,
    sessions: Arc<dyn SessionStore>,
    transcripts: Arc<dyn TranscriptRepository>,
}

impl TutorSessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        limits: ProgressionLimits,
        coordinator: TutorCoordinator,
        storage: &Storage,
    ) -> Self {
        Self {
            clock,
            limits,
            coordinator,
            sessions: Arc::clone(&storage.sessions),
            transcripts: Arc::clone(&storage.transcripts),
        }
    }

    /// Start a session on the first step of the first checkpoint.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError::Storage` if the session or its transcript
    /// header cannot be stored.
    pub async fn create_session(
        &self,
        exercise: Arc<Exercise>,
        mode: TutorMode,
        user_id: UserId,
    ) -> Result<SessionId, SessionServiceError> {
        let ctx = SessionContext::new(
            SessionId::random(),
            user_id,
            mode,
            exercise,
            self.limits,
            self.clock.now(),
        );
        let id = ctx.session_id();
        self.transcripts
            .start_session(&SessionRecord::from_context(&ctx))
            .await?;
        info!(
            session = %id,
            user = %ctx.user_id(),
            exercise = ctx.exercise().title(),
            mode = %mode,
            "session created"
        );
        self.sessions.insert(ctx).await?;
        Ok(id)
    }

    /// Greeting with the first message of the exercise and the opening questions.
    ///
    /// The greeting is written to the conversation only for a session that has
    /// no messages yet.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError::Storage` if the session is unknown or cannot be saved.
    pub async fn welcome(&self, id: SessionId) -> Result<TutorResponse, SessionServiceError> {
        let ctx = self.sessions.get(id).await?;
        let text = format!(
            "Hello! I am your statistics tutor today.\n\n{}\n\nWe will work through a few \
             questions that help you understand the concept. I will give you feedback and \
             hints so you can solve the tasks on your own.\n\n{}",
            ctx.exercise().first_message(),
            checkpoint_intro(&ctx)
        );
        let mut response = TutorResponse::message(text, &ctx);
        response.next_question = ctx.current_question().map(str::to_owned);
        response.image = ctx.current_image().map(str::to_owned);

        if ctx.history().is_empty() {
            let mut updated = ctx.clone();
            updated.record(
                ConversationRole::Assistant,
                response.feedback_text.clone(),
                self.clock.now(),
            );
            self.commit(&ctx, updated).await?;
        }
        Ok(response)
    }

    /// Handle one line of student input.
    ///
    /// `/goto N` jumps to checkpoint N. Anything else goes through the tutor
    /// pipeline. A failed agent call produces an error response and leaves the
    /// session exactly as it was, so the student can retry.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError::Storage` if the session is unknown or the
    /// updated state cannot be persisted.
    pub async fn handle_message(
        &self,
        id: SessionId,
        text: &str,
    ) -> Result<TutorResponse, SessionServiceError> {
        let ctx = self.sessions.get(id).await?;
        match classify(text) {
            Input::Empty => Ok(TutorResponse::message(
                "Please type an answer or a question.",
                &ctx,
            )),
            Input::BadGoto(usage) => Ok(TutorResponse::message(usage, &ctx)),
            Input::Goto(number) => self.goto(ctx, text.trim(), number).await,
            Input::Message(message) => {
                match self.coordinator.process_message(message, &ctx).await {
                    Ok((response, updated)) => {
                        self.commit(&ctx, updated).await?;
                        Ok(response)
                    }
                    Err(TutorError::Completed) => {
                        let mut response = TutorResponse::message(
                            "This exercise is already complete. Use /goto <checkpoint_number> \
                             to revisit a checkpoint.",
                            &ctx,
                        );
                        response.action = Action::Finish;
                        Ok(response)
                    }
                    Err(err) => {
                        warn!(session = %id, error = %err, "message failed; state unchanged");
                        Ok(TutorResponse::error(err.to_string(), &ctx))
                    }
                }
            }
        }
    }

    /// # Errors
    ///
    /// Returns `SessionServiceError::Storage` if the session is unknown.
    pub async fn summary(&self, id: SessionId) -> Result<SessionSummary, SessionServiceError> {
        let ctx = self.sessions.get(id).await?;
        Ok(SessionSummary::from_context(&ctx))
    }

    /// The durable transcript, including messages of earlier runs of the same session.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError::Storage` if no transcript exists for the session.
    pub async fn transcript(
        &self,
        id: SessionId,
    ) -> Result<Vec<ConversationEntry>, SessionServiceError> {
        Ok(self.transcripts.list_entries(id).await?)
    }

    /// Drop the live context of a session. The transcript is kept.
    ///
    /// # Errors
    ///
    /// Returns `SessionServiceError::Storage` if the session is unknown.
    pub async fn end_session(&self, id: SessionId) -> Result<(), SessionServiceError> {
        self.sessions.remove(id).await?;
        info!(session = %id, "session ended");
        Ok(())
    }

    async fn goto(
        &self,
        ctx: SessionContext,
        command: &str,
        number: usize,
    ) -> Result<TutorResponse, SessionServiceError> {
        let mut updated = ctx.clone();
        if let Err(err) = updated.jump_to_checkpoint(number) {
            let mut response = TutorResponse::message(format!("Error: {err}"), &ctx);
            response.error_message = Some(err.to_string());
            return Ok(response);
        }

        let mut response = TutorResponse::message(
            format!("Jumped to checkpoint {number}\n\n{}", checkpoint_intro(&updated)),
            &updated,
        );
        response.next_question = updated.current_question().map(str::to_owned);
        response.image = updated.current_image().map(str::to_owned);

        let now = self.clock.now();
        updated.record(ConversationRole::User, command, now);
        updated.record(ConversationRole::Assistant, response.feedback_text.clone(), now);
        info!(session = %ctx.session_id(), checkpoint = number, "jumped to checkpoint");
        self.commit(&ctx, updated).await?;
        Ok(response)
    }

    /// Store `updated`, then append the messages it added on top of `previous`.
    ///
    /// A failed save leaves the transcript untouched.
    async fn commit(
        &self,
        previous: &SessionContext,
        updated: SessionContext,
    ) -> Result<(), SessionServiceError> {
        let id = updated.session_id();
        let finished_now = updated.is_complete() && !previous.is_complete();
        let new_entries = updated
            .history()
            .get(previous.history().len()..)
            .unwrap_or_default()
            .to_vec();
        self.sessions.save(updated).await?;

        for entry in &new_entries {
            self.transcripts.append_entry(id, entry).await?;
        }

        if finished_now {
            self.transcripts.mark_finished(id, self.clock.now()).await?;
            info!(session = %id, "exercise completed");
        }
        Ok(())
    }
}
