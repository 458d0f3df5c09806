use serde::{Deserialize, Serialize};

/// Judgment of whether the student's last message answered the open questions.
///
/// This is the only input the progression engine takes from the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnderstandingVerdict {
    pub main_answered: bool,
    pub guiding_answered: bool,
}

impl UnderstandingVerdict {
    #[must_use]
    pub fn new(main_answered: bool, guiding_answered: bool) -> Self {
        Self {
            main_answered,
            guiding_answered,
        }
    }

    #[must_use]
    pub fn unanswered() -> Self {
        Self::new(false, false)
    }
}

/// The evaluator's full output: the verdict plus notes that seed later prompts.
#[derive(Debug, Clone, PartialEq)]
pub struct Understanding {
    pub verdict: UnderstandingVerdict,
    pub confidence: Option<f32>,
    pub summary: Vec<String>,
    pub misconceptions: Vec<String>,
}

impl Understanding {
    #[must_use]
    pub fn new(verdict: UnderstandingVerdict) -> Self {
        Self {
            verdict,
            confidence: None,
            summary: Vec::new(),
            misconceptions: Vec::new(),
        }
    }

    /// Bullet list of the summary, one line per point.
    #[must_use]
    pub fn summary_text(&self) -> Option<String> {
        if self.summary.is_empty() {
            return None;
        }
        Some(
            self.summary
                .iter()
                .map(|item| format!("- {item}"))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}
