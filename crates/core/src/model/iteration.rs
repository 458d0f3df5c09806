use serde::{Deserialize, Serialize};

/// Interaction counters for one session.
///
/// `increment` runs once per student message. The step counter is owned by the
/// current guiding question and the checkpoint counter by the current
/// checkpoint; each is zeroed only by the transition that leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IterationState {
    total_interactions: u32,
    step_interactions: u32,
    checkpoint_interactions: u32,
    finished: bool,
}

impl IterationState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate counters, e.g. from a stored snapshot.
    #[must_use]
    pub fn from_persisted(
        total_interactions: u32,
        step_interactions: u32,
        checkpoint_interactions: u32,
        finished: bool,
    ) -> Self {
        Self {
            total_interactions,
            step_interactions,
            checkpoint_interactions,
            finished,
        }
    }

    /// Count one student message against all three counters.
    pub fn increment(&mut self) {
        self.total_interactions = self.total_interactions.saturating_add(1);
        self.step_interactions = self.step_interactions.saturating_add(1);
        self.checkpoint_interactions = self.checkpoint_interactions.saturating_add(1);
    }

    pub fn reset_step(&mut self) {
        self.step_interactions = 0;
    }

    /// Reset the checkpoint counter; the step counter goes with it.
    pub fn reset_checkpoint(&mut self) {
        self.checkpoint_interactions = 0;
        self.reset_step();
    }

    pub fn mark_finished(&mut self) {
        self.finished = true;
    }

    pub(crate) fn reopen(&mut self) {
        self.finished = false;
    }

    #[must_use]
    pub fn has_step_iterations_left(&self, max_step: u32) -> bool {
        self.step_interactions < max_step
    }

    #[must_use]
    pub fn has_checkpoint_iterations_left(&self, max_checkpoint: u32) -> bool {
        self.checkpoint_interactions < max_checkpoint
    }

    #[must_use]
    pub fn total_interactions(&self) -> u32 {
        self.total_interactions
    }

    #[must_use]
    pub fn step_interactions(&self) -> u32 {
        self.step_interactions
    }

    #[must_use]
    pub fn checkpoint_interactions(&self) -> u32 {
        self.checkpoint_interactions
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
