use serde::Serialize;
use tutor_core::Action;
use tutor_core::model::{SessionContext, StepPosition, UnderstandingVerdict};

/// Everything the front end needs to render one tutor turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TutorResponse {
    pub action: Action,
    /// Main text of the turn: feedback plus any solution and transition text.
    pub feedback_text: String,
    pub instruction_text: Option<String>,
    /// Reference answer revealed when the student moves on.
    pub solution_text: Option<String>,
    pub next_question: Option<String>,
    pub image: Option<String>,
    pub solution_image: Option<String>,
    pub completion_message: Option<String>,
    pub error_message: Option<String>,
    pub next_checkpoint: usize,
    pub next_step: usize,
}

impl TutorResponse {
    /// A plain message that keeps the student on the current question.
    #[must_use]
    pub fn message(text: impl Into<String>, ctx: &SessionContext) -> Self {
        Self {
            action: Action::ContinueQuestion,
            feedback_text: text.into(),
            instruction_text: None,
            solution_text: None,
            next_question: None,
            image: None,
            solution_image: None,
            completion_message: None,
            error_message: None,
            next_checkpoint: ctx.current_checkpoint(),
            next_step: ctx.current_step(),
        }
    }

    /// The turn failed; the context it reports is the unchanged one.
    #[must_use]
    pub fn error(error: impl Into<String>, ctx: &SessionContext) -> Self {
        let error = error.into();
        let mut response = Self::message(
            format!("I ran into a problem: {error}. Please try again."),
            ctx,
        );
        response.error_message = Some(error);
        response
    }

    /// Everything the student should read, in display order.
    #[must_use]
    pub fn display_text(&self) -> String {
        let mut parts = vec![self.feedback_text.as_str()];
        if let Some(instructions) = &self.instruction_text {
            parts.push(instructions);
        }
        if let Some(done) = &self.completion_message {
            parts.push(done);
        }
        parts
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

// ─── Transition text ──────────────────────────────────────────────────────────

/// Congratulation (if earned) followed by the reference answer being revealed.
pub(crate) fn solution_message(
    verdict: UnderstandingVerdict,
    closes_checkpoint: bool,
    answer: &str,
) -> String {
    let mut out = String::new();
    if verdict.main_answered {
        out.push_str("You answered the **main question** correctly!\n\n");
    } else if verdict.guiding_answered && !closes_checkpoint {
        out.push_str("You answered the question correctly!\n\n");
    }
    if closes_checkpoint {
        out.push_str("Here is the model answer to the main question:\n");
    } else {
        out.push_str("Here is the model answer to this question:\n");
    }
    out.push_str(answer);
    out
}

/// Introduces the question the context now points at after a step change.
pub(crate) fn step_transition(ctx: &SessionContext) -> String {
    match ctx.position() {
        StepPosition::Guiding(n) => {
            let word = if n == 1 { "first" } else { "now" };
            format!(
                "Let's {word} think about this question:\n{}",
                ctx.guiding_question().unwrap_or_default()
            )
        }
        StepPosition::MainQuestion => format!(
            "Now let's get back to the main question:\n{}",
            ctx.main_question().unwrap_or_default()
        ),
    }
}

/// Presents the current checkpoint: its main question and where to start.
pub(crate) fn checkpoint_intro(ctx: &SessionContext) -> String {
    let main = ctx.main_question().unwrap_or_default();
    match ctx.guiding_question() {
        Some(first) => format!(
            "The main question is:\n{main}\n\nLet's first think about this question:\n{first}"
        ),
        None => format!("The main question is:\n{main}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::context;
    use tutor_core::model::TutorMode;

    #[test]
    fn solution_message_names_the_closed_question() {
        let step =
            solution_message(UnderstandingVerdict::new(false, true), false, "H0: equal means");
        assert!(step.starts_with("You answered the question correctly!"));
        assert!(step.ends_with("model answer to this question:\nH0: equal means"));

        let forced = solution_message(UnderstandingVerdict::unanswered(), true, "F = 5.1");
        assert_eq!(forced, "Here is the model answer to the main question:\nF = 5.1");

        let main = solution_message(UnderstandingVerdict::new(true, false), true, "F = 5.1");
        assert!(main.starts_with("You answered the **main question** correctly!"));
    }

    #[test]
    fn transitions_follow_position() {
        let mut ctx = context(TutorMode::Socratic);
        assert!(checkpoint_intro(&ctx).ends_with("What is the null hypothesis?"));

        ctx.apply(Action::AdvanceStep);
        assert_eq!(
            step_transition(&ctx),
            "Let's now think about this question:\nWhich test fits?"
        );

        ctx.apply(Action::ShowMainQuestion);
        assert!(step_transition(&ctx).starts_with("Now let's get back to the main question:"));
    }

    #[test]
    fn display_text_joins_non_empty_parts() {
        let ctx = context(TutorMode::Socratic);
        let mut response = TutorResponse::message("Nice.", &ctx);
        response.instruction_text = Some("What does H0 claim?".into());
        assert_eq!(response.display_text(), "Nice.\n\nWhat does H0 claim?");

        let error = TutorResponse::error("timeout", &ctx);
        assert_eq!(error.error_message.as_deref(), Some("timeout"));
        assert_eq!(error.action, Action::ContinueQuestion);
        assert_eq!(error.image, None);
    }
}
