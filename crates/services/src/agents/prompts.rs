use std::fmt::Write;

use tutor_core::model::{SessionContext, StepPosition, TutorMode};

pub(super) const HISTORY_WINDOW: usize = 3;

/// Which agent a mode guideline is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Audience {
    Feedback,
    Instruction,
}

pub(super) fn mode_guidance(mode: TutorMode, audience: Audience) -> &'static str {
    match (mode, audience) {
        (TutorMode::Socratic, Audience::Feedback) => {
            "Socratic mode: let the student discover their own misconceptions. \
             Point at what to reconsider instead of explaining it."
        }
        (TutorMode::Socratic, Audience::Instruction) => {
            "Socratic mode: only ask questions, one at a time. Never explain, never give \
             examples or analogies, never reveal any part of the answer. If the student is \
             confused, ask which part is unclear or ask them to explain the concept in their \
             own words."
        }
        (TutorMode::Instructional, Audience::Feedback) => {
            "Instructional mode: explain the relevant concept clearly and use a short example \
             when a statement is abstract."
        }
        (TutorMode::Instructional, Audience::Instruction) => {
            "Instructional mode: explain the concept behind the question using the proper \
             technical terms, break it into steps, and say how to correct a wrong attempt."
        }
    }
}

/// Where the student stands, as a bullet list.
pub(super) fn position_block(ctx: &SessionContext) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "- Exercise: {}", ctx.exercise().title());
    let _ = writeln!(
        out,
        "- Checkpoint {} of {}: {}",
        ctx.current_checkpoint(),
        ctx.exercise().checkpoint_count(),
        ctx.main_question().unwrap_or("-")
    );
    match ctx.position() {
        StepPosition::Guiding(_) => {
            let _ = writeln!(
                out,
                "- Step {}: {}",
                ctx.current_step(),
                ctx.guiding_question().unwrap_or("-")
            );
        }
        StepPosition::MainQuestion => {
            let _ = writeln!(out, "- All guiding steps are done; the main question is open.");
        }
    }
    let iterations = ctx.iterations();
    let limits = ctx.limits();
    let _ = writeln!(
        out,
        "- Messages on this step: {}/{}; on this checkpoint: {}/{}",
        iterations.step_interactions(),
        limits.max_step_iterations(),
        iterations.checkpoint_interactions(),
        limits.max_checkpoint_iterations()
    );
    let _ = write!(out, "- Tutor mode: {}", ctx.mode());
    out
}

/// Open questions together with their reference answers.
pub(super) fn answers_block(ctx: &SessionContext) -> String {
    let mut out = String::new();
    let _ = write!(
        out,
        "Main question: {}\nReference answer: {}",
        ctx.main_question().unwrap_or("-"),
        ctx.main_answer().unwrap_or("-")
    );
    if let (Some(q), Some(a)) = (ctx.guiding_question(), ctx.guiding_answer()) {
        let _ = write!(out, "\n\nGuiding question: {q}\nReference answer: {a}");
    }
    out
}

pub(super) fn understanding_block(ctx: &SessionContext) -> String {
    match ctx.understanding() {
        None => "No understanding recorded yet.".to_owned(),
        Some(u) => {
            let mut out = format!(
                "- Main question answered: {}\n- Guiding question answered: {}",
                u.verdict.main_answered, u.verdict.guiding_answered
            );
            if let Some(summary) = u.summary_text() {
                let _ = write!(out, "\n{summary}");
            }
            if !u.misconceptions.is_empty() {
                let _ = write!(out, "\n- Misconceptions: {}", u.misconceptions.join("; "));
            }
            out
        }
    }
}

/// The last few messages, oldest first, one `role: content` line each.
pub(super) fn history_block(ctx: &SessionContext) -> String {
    let recent = ctx.recent_history(HISTORY_WINDOW);
    if recent.is_empty() {
        return "(no messages yet)".to_owned();
    }
    recent
        .iter()
        .map(|entry| format!("{}: {}", entry.role.as_str(), entry.content))
        .collect::<Vec<_>>()
        .join("\n")
}
