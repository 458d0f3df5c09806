use chrono::NaiveDate;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Structural problems detected while assembling an exercise.
///
/// These are configuration errors: an exercise that fails validation never
/// reaches a session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExerciseError {
    #[error("exercise title cannot be empty")]
    EmptyTitle,

    #[error("exercise must contain at least one checkpoint")]
    NoCheckpoints,

    #[error("checkpoint {found} is out of sequence (expected {expected})")]
    CheckpointOutOfSequence { expected: u32, found: u32 },

    #[error("checkpoint {checkpoint}: main question cannot be empty")]
    EmptyMainQuestion { checkpoint: u32 },

    #[error("checkpoint {checkpoint}: step {found} is out of sequence (expected {expected})")]
    StepOutOfSequence {
        checkpoint: u32,
        expected: u32,
        found: u32,
    },

    #[error("checkpoint {checkpoint}, step {step}: guiding question cannot be empty")]
    EmptyGuidingQuestion { checkpoint: u32, step: u32 },
}

//
// ─── METADATA ──────────────────────────────────────────────────────────────────
//

/// Descriptive information about an exercise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseMetadata {
    pub title: String,
    pub topic: String,
    pub level: String,
    pub language: String,
    pub author: Option<String>,
    pub tags: Vec<String>,
    pub version: String,
    pub date_created: Option<NaiveDate>,
}

impl ExerciseMetadata {
    pub const DEFAULT_VERSION: &'static str = "1.0";

    #[must_use]
    pub fn new(
        title: impl Into<String>,
        topic: impl Into<String>,
        level: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            topic: topic.into(),
            level: level.into(),
            language: language.into(),
            author: None,
            tags: Vec::new(),
            version: Self::DEFAULT_VERSION.to_owned(),
            date_created: None,
        }
    }
}

//
// ─── STEP ──────────────────────────────────────────────────────────────────────
//

/// A guiding sub-question within a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    number: u32,
    guiding_question: String,
    guiding_answer: String,
    image: Option<String>,
}

impl Step {
    #[must_use]
    pub fn new(
        number: u32,
        guiding_question: impl Into<String>,
        guiding_answer: impl Into<String>,
        image: Option<String>,
    ) -> Self {
        Self {
            number,
            guiding_question: guiding_question.into(),
            guiding_answer: guiding_answer.into(),
            image,
        }
    }

    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    #[must_use]
    pub fn guiding_question(&self) -> &str {
        &self.guiding_question
    }

    #[must_use]
    pub fn guiding_answer(&self) -> &str {
        &self.guiding_answer
    }

    #[must_use]
    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }
}

//
// ─── CHECKPOINT ────────────────────────────────────────────────────────────────
//

/// A major milestone of an exercise: one main question and its guiding steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    number: u32,
    main_question: String,
    main_answer: String,
    image_solution: Option<String>,
    steps: Vec<Step>,
}

impl Checkpoint {
    /// Build a checkpoint, checking that steps are numbered 1, 2, 3, ...
    ///
    /// # Errors
    ///
    /// Returns `ExerciseError::EmptyMainQuestion`, `StepOutOfSequence` or
    /// `EmptyGuidingQuestion` when the content cannot drive a session.
    pub fn new(
        number: u32,
        main_question: impl Into<String>,
        main_answer: impl Into<String>,
        image_solution: Option<String>,
        steps: Vec<Step>,
    ) -> Result<Self, ExerciseError> {
        let main_question = main_question.into();
        if main_question.trim().is_empty() {
            return Err(ExerciseError::EmptyMainQuestion { checkpoint: number });
        }

        for (expected, step) in (1_u32..).zip(&steps) {
            if step.number != expected {
                return Err(ExerciseError::StepOutOfSequence {
                    checkpoint: number,
                    expected,
                    found: step.number,
                });
            }
            if step.guiding_question.trim().is_empty() {
                return Err(ExerciseError::EmptyGuidingQuestion {
                    checkpoint: number,
                    step: step.number,
                });
            }
        }

        Ok(Self {
            number,
            main_question,
            main_answer: main_answer.into(),
            image_solution,
            steps,
        })
    }

    #[must_use]
    pub fn number(&self) -> u32 {
        self.number
    }

    #[must_use]
    pub fn main_question(&self) -> &str {
        &self.main_question
    }

    #[must_use]
    pub fn main_answer(&self) -> &str {
        &self.main_answer
    }

    #[must_use]
    pub fn image_solution(&self) -> Option<&str> {
        self.image_solution.as_deref()
    }

    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Step by 1-based number.
    #[must_use]
    pub fn step(&self, number: usize) -> Option<&Step> {
        number.checked_sub(1).and_then(|idx| self.steps.get(idx))
    }
}

//
// ─── EXERCISE ──────────────────────────────────────────────────────────────────
//

/// A complete exercise. Immutable once built; sessions share it by `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exercise {
    metadata: ExerciseMetadata,
    first_message: String,
    end_message: String,
    checkpoints: Vec<Checkpoint>,
}

impl Exercise {
    /// Assemble and validate an exercise.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseError` if the title is blank, there are no checkpoints,
    /// or checkpoints are not numbered 1, 2, 3, ...
    pub fn new(
        metadata: ExerciseMetadata,
        first_message: impl Into<String>,
        end_message: impl Into<String>,
        checkpoints: Vec<Checkpoint>,
    ) -> Result<Self, ExerciseError> {
        if metadata.title.trim().is_empty() {
            return Err(ExerciseError::EmptyTitle);
        }
        if checkpoints.is_empty() {
            return Err(ExerciseError::NoCheckpoints);
        }
        for (expected, checkpoint) in (1_u32..).zip(&checkpoints) {
            if checkpoint.number != expected {
                return Err(ExerciseError::CheckpointOutOfSequence {
                    expected,
                    found: checkpoint.number,
                });
            }
        }

        Ok(Self {
            metadata,
            first_message: first_message.into(),
            end_message: end_message.into(),
            checkpoints,
        })
    }

    #[must_use]
    pub fn metadata(&self) -> &ExerciseMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    #[must_use]
    pub fn first_message(&self) -> &str {
        &self.first_message
    }

    #[must_use]
    pub fn end_message(&self) -> &str {
        &self.end_message
    }

    #[must_use]
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    #[must_use]
    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }

    /// Checkpoint by 1-based number.
    #[must_use]
    pub fn checkpoint(&self, number: usize) -> Option<&Checkpoint> {
        number.checked_sub(1).and_then(|idx| self.checkpoints.get(idx))
    }
}
