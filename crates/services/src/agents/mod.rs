//! The three LLM-backed roles of a tutoring turn.
//!
//! Each role is a trait so the coordinator can run against scripted fakes.
//! `LlmAgents` implements all of them on top of a single `ChatModel`.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::warn;
use tutor_core::model::{SessionContext, Understanding};

use crate::error::AgentError;
use crate::llm::{ChatModel, ChatPrompt};

mod feedback;
mod instruction;
mod prompts;
mod understanding;

/// Feedback on the student's last message. Never poses a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub feedback: String,
    pub positive_aspects: Vec<String>,
    pub areas_for_improvement: Vec<String>,
}

impl Feedback {
    #[must_use]
    pub fn new(feedback: impl Into<String>) -> Self {
        Self {
            feedback: feedback.into(),
            positive_aspects: Vec::new(),
            areas_for_improvement: Vec::new(),
        }
    }
}

/// Next prompt that nudges the student toward the open question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instructions {
    pub instructions: String,
    pub follow_up_questions: Vec<String>,
}

impl Instructions {
    #[must_use]
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            follow_up_questions: Vec::new(),
        }
    }
}

#[async_trait]
pub trait UnderstandingEvaluator: Send + Sync {
    /// Judge whether `message` answers the open guiding and main questions.
    ///
    /// # Errors
    ///
    /// Returns `AgentError` if the evaluation could not be obtained.
    async fn evaluate(
        &self,
        message: &str,
        context: &SessionContext,
    ) -> Result<Understanding, AgentError>;
}

#[async_trait]
pub trait FeedbackGenerator: Send + Sync {
    /// # Errors
    ///
    /// Returns `AgentError` if no feedback could be generated.
    async fn feedback(&self, message: &str, context: &SessionContext)
    -> Result<Feedback, AgentError>;
}

#[async_trait]
pub trait InstructionGenerator: Send + Sync {
    /// # Errors
    ///
    /// Returns `AgentError` if no instructions could be generated.
    async fn instruct(
        &self,
        message: &str,
        context: &SessionContext,
    ) -> Result<Instructions, AgentError>;
}

/// All three agents driven by one chat model.
#[derive(Clone)]
pub struct LlmAgents {
    model: Arc<dyn ChatModel>,
}

impl LlmAgents {
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    async fn ask<T: DeserializeOwned>(
        &self,
        agent: &'static str,
        prompt: ChatPrompt,
    ) -> Result<T, AgentError> {
        let raw = self.model.complete(&prompt).await.map_err(|source| {
            warn!(agent, error = %source, "agent call failed");
            AgentError::Llm { agent, source }
        })?;
        parse_reply(agent, &raw)
    }
}

/// Parse a JSON reply, tolerating a surrounding Markdown code fence.
fn parse_reply<T: DeserializeOwned>(agent: &'static str, raw: &str) -> Result<T, AgentError> {
    let trimmed = raw.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed);
    serde_json::from_str(body.trim()).map_err(|source| {
        warn!(agent, error = %source, "agent reply is not valid JSON");
        AgentError::Malformed { agent, source }
    })
}
