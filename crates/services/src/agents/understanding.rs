use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;
use tutor_core::model::{SessionContext, Understanding, UnderstandingVerdict};

use super::prompts::{answers_block, position_block, understanding_block};
use super::{LlmAgents, UnderstandingEvaluator};
use crate::error::AgentError;
use crate::llm::ChatPrompt;

const AGENT: &str = "understanding";

const SYSTEM_PROMPT: &str = "\
You are a statistics tutor judging whether a student's message shows understanding.

Decide whether the message answers the current guiding question and whether it answers the \
main question of the checkpoint. Be generous: a relevant key concept, a partial explanation or \
a question that shows the student is reasoning about the right idea all count as answered. \
Judge the core concept, not the wording.";

const REPLY_FORMAT: &str = r#"Reply with a JSON object only:
{"main_question_answered": bool, "guiding_question_answered": bool, "confidence_score": number between 0 and 1, "summary": [string], "misconceptions": [string]}"#;

#[derive(Debug, Deserialize)]
struct UnderstandingReply {
    main_question_answered: bool,
    guiding_question_answered: bool,
    #[serde(default)]
    confidence_score: Option<f32>,
    #[serde(default)]
    summary: Vec<String>,
    #[serde(default)]
    misconceptions: Vec<String>,
}

impl From<UnderstandingReply> for Understanding {
    fn from(reply: UnderstandingReply) -> Self {
        let mut understanding = Understanding::new(UnderstandingVerdict::new(
            reply.main_question_answered,
            reply.guiding_question_answered,
        ));
        understanding.confidence = reply.confidence_score.map(|c| c.clamp(0.0, 1.0));
        understanding.summary = reply.summary;
        understanding.misconceptions = reply.misconceptions;
        understanding
    }
}

fn system_prompt(ctx: &SessionContext) -> String {
    format!(
        "{SYSTEM_PROMPT}\n\nCurrent context:\n{}\n\n{}\n\nPrevious understanding:\n{}\n\n{REPLY_FORMAT}",
        position_block(ctx),
        answers_block(ctx),
        understanding_block(ctx),
    )
}

#[async_trait]
impl UnderstandingEvaluator for LlmAgents {
    async fn evaluate(
        &self,
        message: &str,
        context: &SessionContext,
    ) -> Result<Understanding, AgentError> {
        let prompt = ChatPrompt::new(system_prompt(context), message);
        let reply: UnderstandingReply = self.ask(AGENT, prompt).await?;
        let understanding = Understanding::from(reply);
        debug!(
            session = %context.session_id(),
            main_answered = understanding.verdict.main_answered,
            guiding_answered = understanding.verdict.guiding_answered,
            confidence = ?understanding.confidence,
            "understanding evaluated"
        );
        Ok(understanding)
    }
}
