use std::sync::Arc;

use tracing::{debug, info};
use tutor_core::model::{ConversationRole, SessionContext};
use tutor_core::{Action, Clock, ProgressionEngine};

use crate::agents::{FeedbackGenerator, InstructionGenerator, LlmAgents, UnderstandingEvaluator};
use crate::error::TutorError;
use crate::response::{TutorResponse, checkpoint_intro, solution_message, step_transition};

/// Runs one student message through evaluation, feedback, progression and response building.
#[derive(Clone)]
pub struct TutorCoordinator {
    clock: Clock,
    evaluator: Arc<dyn UnderstandingEvaluator>,
    feedback: Arc<dyn FeedbackGenerator>,
    instructor: Arc<dyn InstructionGenerator>,
}

impl TutorCoordinator {
    #[must_use]
    pub fn new(
        clock: Clock,
        evaluator: Arc<dyn UnderstandingEvaluator>,
        feedback: Arc<dyn FeedbackGenerator>,
        instructor: Arc<dyn InstructionGenerator>,
    ) -> Self {
        Self {
            clock,
            evaluator,
            feedback,
            instructor,
        }
    }

    /// One `LlmAgents` value serving all three roles.
    #[must_use]
    pub fn with_agents(clock: Clock, agents: LlmAgents) -> Self {
        let agents = Arc::new(agents);
        Self::new(clock, agents.clone(), agents.clone(), agents)
    }

    /// Process a student message against `context`.
    ///
    /// The work happens on a copy. On success the copy is returned with the
    /// user and assistant messages appended, the counters advanced and the
    /// chosen action applied; `context` itself is never modified.
    ///
    /// # Errors
    ///
    /// Returns `TutorError::Completed` if the exercise is already finished,
    /// or `TutorError::Agent` if any agent call fails.
    pub async fn process_message(
        &self,
        text: &str,
        context: &SessionContext,
    ) -> Result<(TutorResponse, SessionContext), TutorError> {
        if context.is_complete() {
            return Err(TutorError::Completed);
        }

        let mut ctx = context.clone();
        let now = self.clock.now();
        ctx.record(ConversationRole::User, text, now);
        ctx.record_interaction();

        let understanding = self.evaluator.evaluate(text, &ctx).await?;
        let verdict = understanding.verdict;
        ctx.set_understanding(understanding);

        let feedback = self.feedback.feedback(text, &ctx).await?;

        let engine = ProgressionEngine::new(ctx.limits());
        let action = engine.decide(verdict, ctx.iterations(), &ctx.cursor());
        debug!(
            session = %ctx.session_id(),
            action = %action,
            main_answered = verdict.main_answered,
            guiding_answered = verdict.guiding_answered,
            step_interactions = ctx.iterations().step_interactions(),
            checkpoint_interactions = ctx.iterations().checkpoint_interactions(),
            "progression decided"
        );

        let mut response = TutorResponse::message(feedback.feedback, &ctx);
        response.action = action;

        match action {
            Action::ContinueQuestion => {
                let instructions = self.instructor.instruct(text, &ctx).await?;
                response.instruction_text = Some(instructions.instructions);
                response.image = ctx.current_image().map(str::to_owned);
            }
            Action::AdvanceStep | Action::ShowMainQuestion => {
                let answer = ctx.current_answer().unwrap_or_default().to_owned();
                let solution = solution_message(verdict, false, &answer);
                ctx.apply(action);
                response.feedback_text = join(&[
                    response.feedback_text.as_str(),
                    solution.as_str(),
                    step_transition(&ctx).as_str(),
                ]);
                response.solution_text = Some(answer);
                response.next_question = ctx.current_question().map(str::to_owned);
                response.image = ctx.current_image().map(str::to_owned);
            }
            Action::AdvanceCheckpoint => {
                let answer = ctx.main_answer().unwrap_or_default().to_owned();
                let solution = solution_message(verdict, true, &answer);
                response.solution_image = ctx.solution_image().map(str::to_owned);
                ctx.apply(action);
                response.feedback_text = join(&[
                    response.feedback_text.as_str(),
                    solution.as_str(),
                    "Let's move on to the next task.",
                    checkpoint_intro(&ctx).as_str(),
                ]);
                response.solution_text = Some(answer);
                response.next_question = ctx.current_question().map(str::to_owned);
                response.image = ctx.current_image().map(str::to_owned);
            }
            Action::Finish => {
                let answer = ctx.main_answer().unwrap_or_default().to_owned();
                let solution = solution_message(verdict, true, &answer);
                response.solution_image = ctx.solution_image().map(str::to_owned);
                ctx.apply(action);
                response.feedback_text = join(&[response.feedback_text.as_str(), solution.as_str()]);
                response.solution_text = Some(answer);
                response.completion_message = Some(ctx.exercise().end_message().to_owned());
            }
        }

        response.next_checkpoint = ctx.current_checkpoint();
        response.next_step = ctx.current_step();
        ctx.record(ConversationRole::Assistant, response.display_text(), now);

        info!(
            session = %ctx.session_id(),
            action = %action,
            checkpoint = ctx.current_checkpoint(),
            step = ctx.current_step(),
            "message processed"
        );
        Ok((response, ctx))
    }
}

fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
