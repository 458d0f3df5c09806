mod context;
mod conversation;
mod exercise;
mod ids;
mod iteration;
mod mode;
mod position;
mod understanding;

pub use context::{NavigationError, SessionContext};
pub use conversation::{ConversationEntry, ConversationRole, ConversationRoleError};
pub use exercise::{Checkpoint, Exercise, ExerciseError, ExerciseMetadata, Step};
pub use ids::{SessionId, SessionIdError, UserId};
pub use iteration::IterationState;
pub use mode::{TutorMode, TutorModeError};
pub use position::StepPosition;
pub use understanding::{Understanding, UnderstandingVerdict};
