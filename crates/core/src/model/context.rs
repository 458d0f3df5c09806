use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{
    Checkpoint, ConversationEntry, ConversationRole, Exercise, IterationState, SessionId, Step,
    StepPosition, TutorMode, Understanding, UserId,
};
use crate::progression::{Action, Cursor, ProgressionLimits};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum NavigationError {
    #[error("checkpoint {requested} does not exist (available: 1-{available})")]
    CheckpointOutOfRange { requested: usize, available: usize },
}

//
// ─── SESSION CONTEXT ───────────────────────────────────────────────────────────
//

/// Everything one tutoring session knows about itself.
///
/// A context belongs to exactly one session. The tutor pipeline works on a
/// clone and hands the clone back only when every external call succeeded,
/// so a failed message never leaves a half-updated context behind.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: SessionId,
    user_id: UserId,
    mode: TutorMode,
    exercise: Arc<Exercise>,
    limits: ProgressionLimits,
    checkpoint: usize,
    position: StepPosition,
    iterations: IterationState,
    understanding: Option<Understanding>,
    history: Vec<ConversationEntry>,
    started_at: DateTime<Utc>,
}

impl SessionContext {
    /// Start at the first step of the first checkpoint.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        user_id: UserId,
        mode: TutorMode,
        exercise: Arc<Exercise>,
        limits: ProgressionLimits,
        started_at: DateTime<Utc>,
    ) -> Self {
        let position = StepPosition::first(exercise.checkpoint(1).map_or(0, Checkpoint::step_count));
        Self {
            session_id,
            user_id,
            mode,
            exercise,
            limits,
            checkpoint: 1,
            position,
            iterations: IterationState::new(),
            understanding: None,
            history: Vec::new(),
            started_at,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    #[must_use]
    pub fn mode(&self) -> TutorMode {
        self.mode
    }

    #[must_use]
    pub fn exercise(&self) -> &Exercise {
        &self.exercise
    }

    #[must_use]
    pub fn limits(&self) -> ProgressionLimits {
        self.limits
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// 1-based checkpoint number.
    #[must_use]
    pub fn current_checkpoint(&self) -> usize {
        self.checkpoint
    }

    /// 1-based step number; one past the last step while the main question is shown.
    #[must_use]
    pub fn current_step(&self) -> usize {
        self.position.index(self.step_count())
    }

    #[must_use]
    pub fn position(&self) -> StepPosition {
        self.position
    }

    #[must_use]
    pub fn iterations(&self) -> &IterationState {
        &self.iterations
    }

    #[must_use]
    pub fn understanding(&self) -> Option<&Understanding> {
        self.understanding.as_ref()
    }

    #[must_use]
    pub fn history(&self) -> &[ConversationEntry] {
        &self.history
    }

    /// The last `n` conversation entries, oldest first.
    #[must_use]
    pub fn recent_history(&self, n: usize) -> &[ConversationEntry] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    #[must_use]
    pub fn cursor(&self) -> Cursor {
        Cursor {
            checkpoint: self.checkpoint,
            checkpoint_count: self.exercise.checkpoint_count(),
            position: self.position,
            step_count: self.step_count(),
        }
    }

    #[must_use]
    pub fn has_next_step(&self) -> bool {
        self.cursor().has_next_step()
    }

    #[must_use]
    pub fn has_next_checkpoint(&self) -> bool {
        self.cursor().has_next_checkpoint()
    }

    /// The exercise is done once it was finished or the checkpoint index ran past the end.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.iterations.is_finished() || self.checkpoint > self.exercise.checkpoint_count()
    }

    // ─── Navigation ────────────────────────────────────────────────────────

    /// The current checkpoint, or `None` once the exercise is exhausted.
    #[must_use]
    pub fn checkpoint_content(&self) -> Option<&Checkpoint> {
        self.exercise.checkpoint(self.checkpoint)
    }

    /// The open guiding step; `None` while the main question is shown.
    #[must_use]
    pub fn step_content(&self) -> Option<&Step> {
        match self.position {
            StepPosition::Guiding(n) => self.checkpoint_content()?.step(n),
            StepPosition::MainQuestion => None,
        }
    }

    #[must_use]
    pub fn main_question(&self) -> Option<&str> {
        self.checkpoint_content().map(Checkpoint::main_question)
    }

    #[must_use]
    pub fn main_answer(&self) -> Option<&str> {
        self.checkpoint_content().map(Checkpoint::main_answer)
    }

    #[must_use]
    pub fn guiding_question(&self) -> Option<&str> {
        self.step_content().map(Step::guiding_question)
    }

    #[must_use]
    pub fn guiding_answer(&self) -> Option<&str> {
        self.step_content().map(Step::guiding_answer)
    }

    /// The question the student is working on: the guiding question, or the
    /// main question after the last step.
    #[must_use]
    pub fn current_question(&self) -> Option<&str> {
        match self.position {
            StepPosition::Guiding(_) => self.guiding_question(),
            StepPosition::MainQuestion => self.main_question(),
        }
    }

    /// Reference answer for [`Self::current_question`].
    #[must_use]
    pub fn current_answer(&self) -> Option<&str> {
        match self.position {
            StepPosition::Guiding(_) => self.guiding_answer(),
            StepPosition::MainQuestion => self.main_answer(),
        }
    }

    #[must_use]
    pub fn current_image(&self) -> Option<&str> {
        self.step_content().and_then(Step::image)
    }

    #[must_use]
    pub fn solution_image(&self) -> Option<&str> {
        self.checkpoint_content().and_then(Checkpoint::image_solution)
    }

    // ─── Mutation ──────────────────────────────────────────────────────────

    /// Count one student message.
    pub fn record_interaction(&mut self) {
        self.iterations.increment();
    }

    pub fn set_understanding(&mut self, understanding: Understanding) {
        self.understanding = Some(understanding);
    }

    /// Append a message tagged with the current position.
    pub fn record(&mut self, role: ConversationRole, content: impl Into<String>, at: DateTime<Utc>) {
        let entry = ConversationEntry {
            role,
            content: content.into(),
            recorded_at: at,
            checkpoint: self.checkpoint,
            step: self.current_step(),
        };
        self.history.push(entry);
    }

    /// Apply the side effects of a progression action.
    pub fn apply(&mut self, action: Action) {
        match action {
            Action::ContinueQuestion => {}
            Action::AdvanceStep => {
                if let StepPosition::Guiding(n) = self.position {
                    self.position = if n < self.step_count() {
                        StepPosition::Guiding(n + 1)
                    } else {
                        StepPosition::MainQuestion
                    };
                }
                self.iterations.reset_step();
            }
            Action::ShowMainQuestion => {
                self.position = StepPosition::MainQuestion;
                self.iterations.reset_step();
            }
            Action::AdvanceCheckpoint => {
                self.enter_checkpoint(self.checkpoint + 1);
            }
            Action::Finish => {
                self.iterations.mark_finished();
            }
        }
    }

    /// Jump straight to a checkpoint, resetting counters and understanding.
    ///
    /// # Errors
    ///
    /// Returns `NavigationError::CheckpointOutOfRange` if `number` is not a
    /// checkpoint of the exercise; the context is left untouched.
    pub fn jump_to_checkpoint(&mut self, number: usize) -> Result<(), NavigationError> {
        let available = self.exercise.checkpoint_count();
        if number == 0 || number > available {
            return Err(NavigationError::CheckpointOutOfRange {
                requested: number,
                available,
            });
        }
        self.enter_checkpoint(number);
        self.iterations.reopen();
        Ok(())
    }

    fn enter_checkpoint(&mut self, number: usize) {
        self.checkpoint = number;
        self.position = StepPosition::first(self.step_count());
        self.iterations.reset_checkpoint();
        self.understanding = None;
    }

    fn step_count(&self) -> usize {
        self.checkpoint_content().map_or(0, Checkpoint::step_count)
    }
}
