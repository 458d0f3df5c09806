use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use services::{
    AgentError, Feedback, FeedbackGenerator, InstructionGenerator, Instructions, LlmError,
    SessionServiceError, TutorCoordinator, TutorSessionService, UnderstandingEvaluator,
};
use storage::{ExerciseLoader, InMemoryRepository, SessionStore, Storage, StorageError};
use tutor_core::model::{
    Exercise, SessionContext, SessionId, TutorMode, Understanding, UnderstandingVerdict, UserId,
};
use tutor_core::time::{fixed_clock, fixed_now};
use tutor_core::{Action, ProgressionLimits};

const EXERCISE: &str = r#"
metadata:
  title: "Comparing groups"
  topic: "ANOVA"
  level: "beginner"
  language: "en"
first_message: "Three teaching methods were compared."
end_message: "You completed the exercise."
checkpoints:
  - checkpoint_number: 1
    main_question: "Do the methods differ?"
    main_answer: "Yes, F = 6.2, p = 0.004."
    image_solution: "static/anova_table.png"
    steps:
      - step_number: 1
        guiding_question: "What is the null hypothesis?"
        guiding_answer: "All group means are equal."
        image: "static/boxplot.png"
      - step_number: 2
        guiding_question: "Which test compares three means?"
        guiding_answer: "A one-way ANOVA."
  - checkpoint_number: 2
    main_question: "Which methods differ?"
    main_answer: "Method C differs from A and B."
    steps:
      - step_number: 1
        guiding_question: "What does a post-hoc test do?"
        guiding_answer: "It compares pairs of groups."
"#;

fn exercise(checkpoints: usize) -> Arc<Exercise> {
    let yaml = if checkpoints == 1 {
        EXERCISE
            .split("  - checkpoint_number: 2")
            .next()
            .unwrap()
            .to_owned()
    } else {
        EXERCISE.to_owned()
    };
    Arc::new(ExerciseLoader::from_yaml_str(&yaml).unwrap())
}

/// Agents that replay queued verdicts and count how often each role is called.
#[derive(Default)]
struct ScriptedAgents {
    verdicts: Mutex<VecDeque<UnderstandingVerdict>>,
    fail: AtomicBool,
    fail_feedback: AtomicBool,
    fail_instruct: AtomicBool,
    evaluations: AtomicUsize,
    instructions: AtomicUsize,
}

impl ScriptedAgents {
    fn new(verdicts: &[UnderstandingVerdict]) -> Arc<Self> {
        let agents = Self::default();
        agents.verdicts.lock().unwrap().extend(verdicts.iter().copied());
        Arc::new(agents)
    }
}

#[async_trait]
impl UnderstandingEvaluator for ScriptedAgents {
    async fn evaluate(
        &self,
        _message: &str,
        _context: &SessionContext,
    ) -> Result<Understanding, AgentError> {
        self.evaluations.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AgentError::Llm {
                agent: "understanding",
                source: LlmError::EmptyResponse,
            });
        }
        let verdict = self
            .verdicts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(UnderstandingVerdict::unanswered);
        Ok(Understanding::new(verdict))
    }
}

#[async_trait]
impl FeedbackGenerator for ScriptedAgents {
    async fn feedback(
        &self,
        message: &str,
        _context: &SessionContext,
    ) -> Result<Feedback, AgentError> {
        if self.fail_feedback.load(Ordering::SeqCst) {
            return Err(AgentError::Llm {
                agent: "feedback",
                source: LlmError::EmptyResponse,
            });
        }
        Ok(Feedback::new(format!("Feedback on '{message}'.")))
    }
}

#[async_trait]
impl InstructionGenerator for ScriptedAgents {
    async fn instruct(
        &self,
        _message: &str,
        context: &SessionContext,
    ) -> Result<Instructions, AgentError> {
        self.instructions.fetch_add(1, Ordering::SeqCst);
        if self.fail_instruct.load(Ordering::SeqCst) {
            return Err(AgentError::Llm {
                agent: "instruction",
                source: LlmError::EmptyResponse,
            });
        }
        Ok(Instructions::new(format!(
            "Think again about: {}",
            context.current_question().unwrap_or_default()
        )))
    }
}

fn coordinator(agents: &Arc<ScriptedAgents>) -> TutorCoordinator {
    TutorCoordinator::new(fixed_clock(), agents.clone(), agents.clone(), agents.clone())
}

async fn service(
    agents: &Arc<ScriptedAgents>,
    exercise: Arc<Exercise>,
) -> (TutorSessionService, Storage, SessionId) {
    let storage = Storage::in_memory();
    let svc = TutorSessionService::new(
        fixed_clock(),
        ProgressionLimits::default(),
        coordinator(agents),
        &storage,
    );
    let id = svc
        .create_session(exercise, TutorMode::Socratic, UserId::new("student"))
        .await
        .unwrap();
    (svc, storage, id)
}

#[tokio::test]
async fn coordinator_returns_updated_copy_and_leaves_input_untouched() {
    let agents = ScriptedAgents::new(&[]);
    let ctx = SessionContext::new(
        SessionId::random(),
        UserId::anonymous(),
        TutorMode::Socratic,
        exercise(1),
        ProgressionLimits::default(),
        fixed_now(),
    );

    let (response, updated) = coordinator(&agents)
        .process_message("no idea", &ctx)
        .await
        .unwrap();

    assert_eq!(response.action, Action::ContinueQuestion);
    assert_eq!(
        response.instruction_text.as_deref(),
        Some("Think again about: What is the null hypothesis?")
    );
    assert_eq!(response.image.as_deref(), Some("static/boxplot.png"));
    assert_eq!(updated.iterations().total_interactions(), 1);
    assert_eq!(updated.history().len(), 2);
    assert!(ctx.history().is_empty());
    assert_eq!(ctx.iterations().total_interactions(), 0);
}

#[tokio::test]
async fn two_unanswered_messages_force_the_next_step() {
    let agents = ScriptedAgents::new(&[]);
    let (svc, _storage, id) = service(&agents, exercise(1)).await;

    let first = svc.handle_message(id, "no idea").await.unwrap();
    assert_eq!(first.action, Action::ContinueQuestion);
    assert!(first.instruction_text.is_some());

    let second = svc.handle_message(id, "still no idea").await.unwrap();
    assert_eq!(second.action, Action::AdvanceStep);
    assert_eq!(second.instruction_text, None);
    assert_eq!(second.solution_text.as_deref(), Some("All group means are equal."));
    assert_eq!(
        second.next_question.as_deref(),
        Some("Which test compares three means?")
    );
    assert_eq!(second.next_step, 2);
    assert!(second.feedback_text.contains("Let's now think about this question:"));
    assert_eq!(agents.instructions.load(Ordering::SeqCst), 1);

    let summary = svc.summary(id).await.unwrap();
    assert_eq!(summary.step, 2);
    assert_eq!(summary.total_interactions, 2);
}

#[tokio::test]
async fn last_step_leads_to_main_question() {
    let guiding = UnderstandingVerdict::new(false, true);
    let agents = ScriptedAgents::new(&[guiding, guiding]);
    let (svc, _storage, id) = service(&agents, exercise(1)).await;

    assert_eq!(
        svc.handle_message(id, "equal means").await.unwrap().action,
        Action::AdvanceStep
    );
    let parked = svc.handle_message(id, "anova").await.unwrap();
    assert_eq!(parked.action, Action::ShowMainQuestion);
    assert_eq!(parked.next_question.as_deref(), Some("Do the methods differ?"));
    assert_eq!(parked.next_step, 3);
    assert!(
        parked
            .feedback_text
            .contains("Now let's get back to the main question:")
    );
}

#[tokio::test]
async fn main_answer_reveals_solution_and_opens_next_checkpoint() {
    let agents = ScriptedAgents::new(&[UnderstandingVerdict::new(true, false)]);
    let (svc, _storage, id) = service(&agents, exercise(2)).await;

    let response = svc.handle_message(id, "F is large, so yes").await.unwrap();
    assert_eq!(response.action, Action::AdvanceCheckpoint);
    assert_eq!(response.solution_text.as_deref(), Some("Yes, F = 6.2, p = 0.004."));
    assert_eq!(
        response.solution_image.as_deref(),
        Some("static/anova_table.png")
    );
    assert_eq!(
        response.next_question.as_deref(),
        Some("What does a post-hoc test do?")
    );
    assert_eq!((response.next_checkpoint, response.next_step), (2, 1));
    assert!(response.feedback_text.contains("The main question is:\nWhich methods differ?"));
}

#[tokio::test]
async fn finishing_marks_transcript_and_blocks_further_messages() {
    let agents = ScriptedAgents::new(&[UnderstandingVerdict::new(true, false)]);
    let (svc, storage, id) = service(&agents, exercise(1)).await;

    let done = svc.handle_message(id, "yes they differ").await.unwrap();
    assert_eq!(done.action, Action::Finish);
    assert_eq!(
        done.completion_message.as_deref(),
        Some("You completed the exercise.")
    );
    assert!(svc.summary(id).await.unwrap().complete);

    let header = storage.transcripts.get_session(id).await.unwrap();
    assert_eq!(header.finished_at, Some(fixed_now()));

    let after = svc.handle_message(id, "hello?").await.unwrap();
    assert_eq!(after.action, Action::Finish);
    assert_eq!(agents.evaluations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_agent_call_leaves_session_unchanged() {
    let agents = ScriptedAgents::new(&[]);
    let (svc, storage, id) = service(&agents, exercise(1)).await;
    svc.handle_message(id, "first try").await.unwrap();
    let before = svc.summary(id).await.unwrap();

    agents.fail.store(true, Ordering::SeqCst);
    let response = svc.handle_message(id, "second try").await.unwrap();
    assert!(response.error_message.is_some());
    assert_eq!(response.action, Action::ContinueQuestion);
    assert_eq!(svc.summary(id).await.unwrap(), before);
    assert_eq!(storage.transcripts.list_entries(id).await.unwrap().len(), 2);

    agents.fail.store(false, Ordering::SeqCst);
    let retry = svc.handle_message(id, "second try").await.unwrap();
    assert_eq!(retry.action, Action::AdvanceStep);
}

async fn assert_late_failure_leaves_session_unchanged(fail: impl Fn(&ScriptedAgents, bool)) {
    let agents = ScriptedAgents::new(&[]);
    let (svc, storage, id) = service(&agents, exercise(1)).await;
    let before = storage.sessions.get(id).await.unwrap();
    let entries_before = storage.transcripts.list_entries(id).await.unwrap();

    fail(agents.as_ref(), true);
    let response = svc.handle_message(id, "is it the median?").await.unwrap();
    assert!(response.error_message.is_some());
    assert_eq!(agents.evaluations.load(Ordering::SeqCst), 1);

    let after = storage.sessions.get(id).await.unwrap();
    assert_eq!(after.iterations(), before.iterations());
    assert_eq!(after.history(), before.history());
    assert_eq!(after.understanding(), before.understanding());
    assert_eq!(
        storage.transcripts.list_entries(id).await.unwrap(),
        entries_before
    );

    fail(agents.as_ref(), false);
    let retry = svc.handle_message(id, "is it the median?").await.unwrap();
    assert_eq!(retry.action, Action::ContinueQuestion);
    assert_eq!(svc.summary(id).await.unwrap().total_interactions, 1);
}

#[tokio::test]
async fn failed_feedback_leaves_session_unchanged() {
    assert_late_failure_leaves_session_unchanged(|agents, on| {
        agents.fail_feedback.store(on, Ordering::SeqCst);
    })
    .await;
}

#[tokio::test]
async fn failed_instructions_leave_session_unchanged() {
    assert_late_failure_leaves_session_unchanged(|agents, on| {
        agents.fail_instruct.store(on, Ordering::SeqCst);
    })
    .await;
}

/// Session store whose first `save` fails.
struct FlakyStore {
    inner: InMemoryRepository,
    failed_once: AtomicBool,
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn insert(&self, context: SessionContext) -> Result<(), StorageError> {
        self.inner.insert(context).await
    }

    async fn get(&self, id: SessionId) -> Result<SessionContext, StorageError> {
        self.inner.get(id).await
    }

    async fn save(&self, context: SessionContext) -> Result<(), StorageError> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(StorageError::Connection("down".into()));
        }
        self.inner.save(context).await
    }

    async fn remove(&self, id: SessionId) -> Result<(), StorageError> {
        self.inner.remove(id).await
    }
}

#[tokio::test]
async fn failed_save_keeps_transcript_in_step_with_context() {
    let agents = ScriptedAgents::new(&[]);
    let repo = InMemoryRepository::new();
    let storage = Storage {
        sessions: Arc::new(FlakyStore {
            inner: repo.clone(),
            failed_once: AtomicBool::new(false),
        }),
        transcripts: Arc::new(repo),
    };
    let svc = TutorSessionService::new(
        fixed_clock(),
        ProgressionLimits::default(),
        coordinator(&agents),
        &storage,
    );
    let id = svc
        .create_session(exercise(1), TutorMode::Socratic, UserId::new("student"))
        .await
        .unwrap();

    let err = svc.handle_message(id, "hello").await.unwrap_err();
    assert!(matches!(
        err,
        SessionServiceError::Storage(StorageError::Connection(_))
    ));
    assert!(storage.sessions.get(id).await.unwrap().history().is_empty());
    assert!(storage.transcripts.list_entries(id).await.unwrap().is_empty());

    svc.handle_message(id, "hello").await.unwrap();
    let history = storage.sessions.get(id).await.unwrap().history().to_vec();
    let transcript = storage.transcripts.list_entries(id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(transcript, history);
}

#[tokio::test]
async fn goto_jumps_and_validates_range() {
    let agents = ScriptedAgents::new(&[]);
    let (svc, _storage, id) = service(&agents, exercise(2)).await;

    let jumped = svc.handle_message(id, "/goto 2").await.unwrap();
    assert!(jumped.feedback_text.starts_with("Jumped to checkpoint 2"));
    assert_eq!((jumped.next_checkpoint, jumped.next_step), (2, 1));
    assert_eq!(svc.summary(id).await.unwrap().checkpoint, 2);

    let out_of_range = svc.handle_message(id, "/goto 9").await.unwrap();
    assert!(out_of_range.error_message.is_some());
    assert_eq!(svc.summary(id).await.unwrap().checkpoint, 2);

    let usage = svc.handle_message(id, "/goto").await.unwrap();
    assert_eq!(usage.feedback_text, "Usage: /goto <checkpoint_number>");
    assert_eq!(agents.evaluations.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn welcome_presents_opening_questions_once() {
    let agents = ScriptedAgents::new(&[]);
    let (svc, storage, id) = service(&agents, exercise(1)).await;

    let welcome = svc.welcome(id).await.unwrap();
    assert!(welcome.feedback_text.contains("Three teaching methods were compared."));
    assert!(welcome.feedback_text.contains("The main question is:\nDo the methods differ?"));
    assert!(welcome.feedback_text.ends_with("What is the null hypothesis?"));
    assert_eq!(welcome.image.as_deref(), Some("static/boxplot.png"));

    svc.welcome(id).await.unwrap();
    assert_eq!(storage.transcripts.list_entries(id).await.unwrap().len(), 1);
    assert_eq!(svc.summary(id).await.unwrap().total_interactions, 0);
}

#[tokio::test]
async fn transcript_matches_conversation() {
    let agents = ScriptedAgents::new(&[]);
    let (svc, _storage, id) = service(&agents, exercise(1)).await;
    svc.welcome(id).await.unwrap();
    svc.handle_message(id, "is it about means?").await.unwrap();

    let transcript = svc.transcript(id).await.unwrap();
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[1].content, "is it about means?");
    assert_eq!(svc.summary(id).await.unwrap().conversation_length, 3);

    svc.end_session(id).await.unwrap();
    assert!(svc.summary(id).await.is_err());
    assert_eq!(svc.transcript(id).await.unwrap().len(), 3);
}
