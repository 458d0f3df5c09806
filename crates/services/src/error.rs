//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;

/// Errors emitted by the chat completion client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LlmError {
    #[error("language model is not configured (set TUTOR_API_KEY)")]
    Disabled,
    #[error("language model returned an empty response")]
    EmptyResponse,
    #[error("language model request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors raised while reading `LlmConfig` from the environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LlmConfigError {
    #[error("invalid base url {value:?}: {source}")]
    InvalidBaseUrl {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid value {value:?} for {var}")]
    InvalidNumber { var: &'static str, value: String },
}

/// Errors emitted by one of the tutoring agents.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AgentError {
    #[error("{agent} agent call failed: {source}")]
    Llm {
        agent: &'static str,
        #[source]
        source: LlmError,
    },
    #[error("{agent} agent returned malformed output: {source}")]
    Malformed {
        agent: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors emitted by `TutorCoordinator`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TutorError {
    #[error("the exercise is already complete")]
    Completed,
    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// Errors emitted by `TutorSessionService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}
