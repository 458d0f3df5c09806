#![forbid(unsafe_code)]

pub mod agents;
pub mod coordinator;
pub mod error;
pub mod llm;
pub mod response;
pub mod session_service;

pub use tutor_core::Clock;

pub use agents::{
    Feedback, FeedbackGenerator, InstructionGenerator, Instructions, LlmAgents,
    UnderstandingEvaluator,
};
pub use coordinator::TutorCoordinator;
pub use error::{AgentError, LlmConfigError, LlmError, SessionServiceError, TutorError};
pub use llm::{ChatModel, ChatPrompt, LlmConfig, OpenAiChatClient};
pub use response::TutorResponse;
pub use session_service::{SessionSummary, TutorSessionService};
