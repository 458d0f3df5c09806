use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{IterationState, StepPosition, UnderstandingVerdict};

//
// ─── LIMITS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LimitsError {
    #[error("max step iterations must be > 0")]
    InvalidStepLimit,

    #[error("max checkpoint iterations must be > 0")]
    InvalidCheckpointLimit,
}

/// How many student messages a step or checkpoint may take before the tutor
/// moves on regardless of the verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionLimits {
    max_step_iterations: u32,
    max_checkpoint_iterations: u32,
}

impl ProgressionLimits {
    pub const DEFAULT_MAX_STEP_ITERATIONS: u32 = 2;
    pub const DEFAULT_MAX_CHECKPOINT_ITERATIONS: u32 = 6;

    /// # Errors
    ///
    /// Returns `LimitsError` if either limit is zero.
    pub fn new(
        max_step_iterations: u32,
        max_checkpoint_iterations: u32,
    ) -> Result<Self, LimitsError> {
        if max_step_iterations == 0 {
            return Err(LimitsError::InvalidStepLimit);
        }
        if max_checkpoint_iterations == 0 {
            return Err(LimitsError::InvalidCheckpointLimit);
        }
        Ok(Self {
            max_step_iterations,
            max_checkpoint_iterations,
        })
    }

    #[must_use]
    pub fn max_step_iterations(&self) -> u32 {
        self.max_step_iterations
    }

    #[must_use]
    pub fn max_checkpoint_iterations(&self) -> u32 {
        self.max_checkpoint_iterations
    }
}

impl Default for ProgressionLimits {
    fn default() -> Self {
        Self {
            max_step_iterations: Self::DEFAULT_MAX_STEP_ITERATIONS,
            max_checkpoint_iterations: Self::DEFAULT_MAX_CHECKPOINT_ITERATIONS,
        }
    }
}

//
// ─── ACTION ────────────────────────────────────────────────────────────────────
//

/// Transition chosen after a student message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Stay on the current question.
    ContinueQuestion,
    /// Move to the next guiding step of the checkpoint.
    AdvanceStep,
    /// All guiding steps are done; present the checkpoint's main question.
    ShowMainQuestion,
    /// Move to the first step of the next checkpoint.
    AdvanceCheckpoint,
    /// The last checkpoint is done.
    Finish,
}

impl Action {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Action::ContinueQuestion => "continue_question",
            Action::AdvanceStep => "advance_step",
            Action::ShowMainQuestion => "show_main_question",
            Action::AdvanceCheckpoint => "advance_checkpoint",
            Action::Finish => "finish",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//
// ─── CURSOR ────────────────────────────────────────────────────────────────────
//

/// Position of a session inside the exercise, reduced to what the engine needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// 1-based checkpoint number.
    pub checkpoint: usize,
    pub checkpoint_count: usize,
    pub position: StepPosition,
    /// Number of guiding steps in the current checkpoint.
    pub step_count: usize,
}

impl Cursor {
    #[must_use]
    pub fn has_next_checkpoint(&self) -> bool {
        self.checkpoint < self.checkpoint_count
    }

    #[must_use]
    pub fn has_next_step(&self) -> bool {
        match self.position {
            StepPosition::Guiding(n) => n < self.step_count,
            StepPosition::MainQuestion => false,
        }
    }
}

//
// ─── ENGINE ────────────────────────────────────────────────────────────────────
//

/// Decides the next transition from a verdict and the interaction counters.
///
/// The engine is pure; applying the side effects of an action is the job of
/// `SessionContext::apply`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressionEngine {
    limits: ProgressionLimits,
}

impl ProgressionEngine {
    #[must_use]
    pub fn new(limits: ProgressionLimits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub fn limits(&self) -> ProgressionLimits {
        self.limits
    }

    /// Choose the next action.
    ///
    /// Precedence: a finished main question (or an exhausted checkpoint budget)
    /// wins over a finished guiding question (or an exhausted step budget).
    #[must_use]
    pub fn decide(
        &self,
        verdict: UnderstandingVerdict,
        iterations: &IterationState,
        cursor: &Cursor,
    ) -> Action {
        let checkpoint_exhausted =
            !iterations.has_checkpoint_iterations_left(self.limits.max_checkpoint_iterations);
        if verdict.main_answered || checkpoint_exhausted {
            return if cursor.has_next_checkpoint() {
                Action::AdvanceCheckpoint
            } else {
                Action::Finish
            };
        }

        let step_exhausted = !iterations.has_step_iterations_left(self.limits.max_step_iterations);
        if verdict.guiding_answered || step_exhausted {
            if cursor.has_next_step() {
                return Action::AdvanceStep;
            }
            if !cursor.position.is_main_question() {
                return Action::ShowMainQuestion;
            }
        }

        Action::ContinueQuestion
    }
}
