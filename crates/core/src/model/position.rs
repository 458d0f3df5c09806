use serde::{Deserialize, Serialize};

/// Where inside a checkpoint the student currently is.
///
/// `MainQuestion` is the state after the last guiding step: the checkpoint's
/// main question is presented again and no guiding question is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepPosition {
    /// 1-based guiding step.
    Guiding(usize),
    MainQuestion,
}

impl StepPosition {
    /// Opening position for a checkpoint with `step_count` guiding steps.
    #[must_use]
    pub fn first(step_count: usize) -> Self {
        if step_count == 0 {
            Self::MainQuestion
        } else {
            Self::Guiding(1)
        }
    }

    /// Numeric step index; `MainQuestion` reports one past the last step.
    #[must_use]
    pub fn index(self, step_count: usize) -> usize {
        match self {
            StepPosition::Guiding(n) => n,
            StepPosition::MainQuestion => step_count + 1,
        }
    }

    #[must_use]
    pub fn is_main_question(self) -> bool {
        matches!(self, StepPosition::MainQuestion)
    }
}
