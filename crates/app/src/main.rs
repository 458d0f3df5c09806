//! Terminal front end: one tutoring session over stdin/stdout.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use services::{
    Clock, LlmAgents, OpenAiChatClient, TutorCoordinator, TutorResponse, TutorSessionService,
};
use storage::{ExerciseLoader, Storage};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tutor_core::model::{TutorMode, UserId};
use tutor_core::{Action, ProgressionLimits};

#[derive(Debug, Parser)]
#[command(
    name = "stats-tutor",
    version,
    about = "A statistics tutor that guides you through exercises"
)]
struct Args {
    /// Exercise file (.yaml, .yml or .json)
    #[arg(long, env = "EXERCISE_PATH", default_value = "exercises/t-test.yaml")]
    exercise: PathBuf,

    /// Teaching style: socratic or instructional
    #[arg(long, env = "TUTOR_MODE", default_value = "socratic")]
    mode: TutorMode,

    /// Student identifier recorded in the transcript
    #[arg(long, default_value = "anonymous")]
    user: String,

    /// `SQLite` URL for durable transcripts; kept in memory when absent
    #[arg(long, env = "TUTOR_DB_URL")]
    db: Option<String>,

    /// Messages allowed on one guiding step before moving on
    #[arg(long, default_value_t = ProgressionLimits::DEFAULT_MAX_STEP_ITERATIONS)]
    max_step_iterations: u32,

    /// Messages allowed on one checkpoint before moving on
    #[arg(long, default_value_t = ProgressionLimits::DEFAULT_MAX_CHECKPOINT_ITERATIONS)]
    max_checkpoint_iterations: u32,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Text shown for one tutor turn, media paths included.
fn render(response: &TutorResponse) -> String {
    let mut out = response.display_text();
    if let Some(image) = &response.solution_image {
        let _ = write!(out, "\n[solution image: {image}]");
    }
    if let Some(image) = &response.image {
        let _ = write!(out, "\n[image: {image}]");
    }
    if response.action == Action::Finish {
        out.push_str("\n\n(Type /goto <n> to revisit a checkpoint or /quit to leave.)");
    }
    out
}

async fn print(out: &mut tokio::io::Stdout, text: &str) -> Result<()> {
    out.write_all(text.as_bytes()).await?;
    out.write_all(b"\n\n").await?;
    out.flush().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let exercise = ExerciseLoader::load(&args.exercise)
        .with_context(|| format!("loading exercise {}", args.exercise.display()))?;
    let limits = ProgressionLimits::new(args.max_step_iterations, args.max_checkpoint_iterations)?;

    let storage = match &args.db {
        Some(url) => Storage::sqlite(url)
            .await
            .with_context(|| format!("opening transcript database {url}"))?,
        None => Storage::in_memory(),
    };

    let client = OpenAiChatClient::from_env().context("reading TUTOR_* settings")?;
    if !client.enabled() {
        warn!("TUTOR_API_KEY is not set; messages will fail until it is configured");
    }
    let coordinator = TutorCoordinator::with_agents(Clock::System, LlmAgents::new(Arc::new(client)));
    let service = TutorSessionService::new(Clock::System, limits, coordinator, &storage);

    let id = service
        .create_session(Arc::new(exercise), args.mode, UserId::new(args.user))
        .await?;
    info!(session = %id, "type /quit to leave, /summary for progress, /goto <n> to jump");

    let mut out = tokio::io::stdout();
    print(&mut out, &render(&service.welcome(id).await?)).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        out.write_all(b"> ").await?;
        out.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "/quit" | "/exit" => break,
            "/summary" => {
                let summary = service.summary(id).await?;
                print(&mut out, &serde_json::to_string_pretty(&summary)?).await?;
            }
            _ => {
                let response = service.handle_message(id, &line).await?;
                print(&mut out, &render(&response)).await?;
            }
        }
    }

    let summary = service.summary(id).await?;
    info!(
        session = %id,
        checkpoint = summary.checkpoint,
        interactions = summary.total_interactions,
        complete = summary.complete,
        "session closed"
    );
    service.end_session(id).await?;
    Ok(())
}
