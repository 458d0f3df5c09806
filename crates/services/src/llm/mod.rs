//! Chat completion access for the tutoring agents.

use async_trait::async_trait;

use crate::error::LlmError;

mod client;
mod config;

pub use client::OpenAiChatClient;
pub use config::LlmConfig;

/// One system + user exchange sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPrompt {
    pub system: String,
    pub user: String,
}

impl ChatPrompt {
    #[must_use]
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// A model that answers a prompt with a JSON object rendered as text.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// # Errors
    ///
    /// Returns `LlmError` when the model is unavailable or answers with nothing.
    async fn complete(&self, prompt: &ChatPrompt) -> Result<String, LlmError>;
}
