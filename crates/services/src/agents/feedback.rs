use async_trait::async_trait;
use serde::Deserialize;
use tutor_core::model::SessionContext;

use super::prompts::{
    Audience, answers_block, history_block, mode_guidance, position_block, understanding_block,
};
use super::{Feedback, FeedbackGenerator, LlmAgents};
use crate::error::AgentError;
use crate::llm::ChatPrompt;

const AGENT: &str = "feedback";

const SYSTEM_PROMPT: &str = "\
You are a supportive statistics tutor giving feedback on the student's last message.

Start by acknowledging what the student understood, summarised as short bullet points. \
Name where they improved, then point out mistakes, gaps or misunderstandings. \
Never reveal the reference answers, never use terms from them the student has not used yet, \
never introduce new technical terms and never ask questions; questions are posed separately. \
Focus on the guiding question unless it is already answered.";

const REPLY_FORMAT: &str = r#"Reply with a JSON object only:
{"feedback": string, "positive_aspects": [string], "areas_for_improvement": [string]}"#;

#[derive(Debug, Deserialize)]
struct FeedbackReply {
    feedback: String,
    #[serde(default)]
    positive_aspects: Vec<String>,
    #[serde(default)]
    areas_for_improvement: Vec<String>,
}

fn system_prompt(ctx: &SessionContext) -> String {
    format!(
        "{SYSTEM_PROMPT}\n\n{}\n\nCurrent context:\n{}\n\n{}\n\nCurrent understanding:\n{}\n\n\
         Recent conversation:\n{}\n\n{REPLY_FORMAT}",
        mode_guidance(ctx.mode(), Audience::Feedback),
        position_block(ctx),
        answers_block(ctx),
        understanding_block(ctx),
        history_block(ctx),
    )
}

#[async_trait]
impl FeedbackGenerator for LlmAgents {
    async fn feedback(
        &self,
        message: &str,
        context: &SessionContext,
    ) -> Result<Feedback, AgentError> {
        let prompt = ChatPrompt::new(system_prompt(context), message);
        let reply: FeedbackReply = self.ask(AGENT, prompt).await?;
        Ok(Feedback {
            feedback: reply.feedback.trim().to_owned(),
            positive_aspects: reply.positive_aspects,
            areas_for_improvement: reply.areas_for_improvement,
        })
    }
}
