use async_trait::async_trait;
use serde::Deserialize;
use tutor_core::model::SessionContext;

use super::prompts::{
    Audience, answers_block, history_block, mode_guidance, position_block, understanding_block,
};
use super::{InstructionGenerator, Instructions, LlmAgents};
use crate::error::AgentError;
use crate::llm::ChatPrompt;

const AGENT: &str = "instruction";

const SYSTEM_PROMPT: &str = "\
You are a statistics tutor helping a student discover the answer to the open question.

Write one brief instruction that helps the student think about the question step by step: \
direct attention to a specific aspect of it or ask them to reflect on what they already know. \
Never give the answer or any part of it, never ask for calculations, never go beyond the \
scope of the current question and never repeat what was already said.";

const REPLY_FORMAT: &str = r#"Reply with a JSON object only:
{"instructions": string, "follow_up_questions": [string]}"#;

#[derive(Debug, Deserialize)]
struct InstructionsReply {
    instructions: String,
    #[serde(default)]
    follow_up_questions: Vec<String>,
}

fn system_prompt(ctx: &SessionContext) -> String {
    format!(
        "{SYSTEM_PROMPT}\n\n{}\n\nCurrent context:\n{}\n\n{}\n\nCurrent understanding:\n{}\n\n\
         Recent conversation:\n{}\n\n{REPLY_FORMAT}",
        mode_guidance(ctx.mode(), Audience::Instruction),
        position_block(ctx),
        answers_block(ctx),
        understanding_block(ctx),
        history_block(ctx),
    )
}

#[async_trait]
impl InstructionGenerator for LlmAgents {
    async fn instruct(
        &self,
        message: &str,
        context: &SessionContext,
    ) -> Result<Instructions, AgentError> {
        let prompt = ChatPrompt::new(system_prompt(context), message);
        let reply: InstructionsReply = self.ask(AGENT, prompt).await?;
        Ok(Instructions {
            instructions: reply.instructions.trim().to_owned(),
            follow_up_questions: reply.follow_up_questions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{CannedModel, context};
    use tutor_core::model::TutorMode;

    #[tokio::test]
    async fn parses_instructions_with_follow_ups() {
        let model = CannedModel::replying(
            r#"```json
{"instructions": "What would equal means imply?", "follow_up_questions": ["Why?"]}
```"#,
        );
        let agents = LlmAgents::new(model.clone());
        let ins = agents
            .instruct("no idea", &context(TutorMode::Socratic))
            .await
            .unwrap();
        assert_eq!(ins.instructions, "What would equal means imply?");
        assert_eq!(ins.follow_up_questions, vec!["Why?"]);
        assert!(model.last_prompt().system.contains("only ask questions"));
    }
}
