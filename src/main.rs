use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use jobpilot::config::{load_config, load_config_from};
use jobpilot::executor::chrome::ChromeSurface;
use jobpilot::{EventPayload, Orchestrator, TaskGoal};

#[derive(Parser, Debug)]
#[command(name = "jobpilot", about = "Vision-driven browsing agent for job boards")]
struct Args {
    /// Search keywords, e.g. "Rust engineer".
    #[arg(long)]
    keywords: String,

    #[arg(long, default_value = "")]
    city: String,

    /// Opening message sent to each recruiter.
    #[arg(long, default_value = "您好，我对这个职位很感兴趣，期待进一步沟通。")]
    greeting: String,

    /// Short candidate summary.
    #[arg(long, default_value = "")]
    profile: String,

    /// Stop after contacting this many listings (0 = until the step budget runs out).
    #[arg(long, default_value_t = 1)]
    applications: usize,

    /// Path to config.toml (defaults to next to the binary, then the working dir).
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> jobpilot::PilotResult<()> {
    let _ = dotenvy::dotenv();
    jobpilot::init_tracing();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            let mut config = load_config_from(path)?;
            config.apply_env();
            config.validate()?;
            config
        }
        None => load_config()?,
    };

    let surface = Arc::new(ChromeSurface::launch(&config.agent, &config.surface).await?);
    let mut orchestrator = Orchestrator::from_config(&config, surface)?;

    if !orchestrator.inference().is_simulated() {
        let valid = orchestrator.inference().validate_credential().await;
        tracing::info!(valid, "inference credential checked");
    }

    let mut events = orchestrator.subscribe();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match &event.payload {
                EventPayload::Screenshot { step, bytes, .. } => {
                    tracing::debug!(step, bytes, "screenshot")
                }
                EventPayload::Thought { step, text, action, .. } => {
                    tracing::info!(step, ?action, "thought: {text}")
                }
                EventPayload::Action { step, description, .. } => {
                    tracing::info!(step, "action: {description}")
                }
                EventPayload::Status { step, from, to } => {
                    tracing::info!(step, "status: {from} -> {to}")
                }
                EventPayload::Error { step, message, fatal, .. } => {
                    tracing::warn!(step, fatal, "error: {message}")
                }
                EventPayload::Complete { steps, applied, reason } => {
                    tracing::info!(steps, applied = applied.len(), ?reason, "complete")
                }
            }
        }
    });

    let handle = orchestrator.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, stopping after the current step");
            handle.stop();
        }
    });

    let goal = TaskGoal {
        profile_summary: args.profile,
        keywords: args.keywords,
        city: args.city,
        greeting: args.greeting,
        max_applications: args.applications,
    };
    let outcome = orchestrator.start(goal).await;

    match &outcome.error {
        Some(e) => tracing::error!(steps = outcome.steps, "run failed: {e}"),
        None => tracing::info!(
            steps = outcome.steps,
            applied = ?outcome.applied,
            target = ?outcome.target.as_ref().map(|t| t.title.as_str()),
            dialogue_turns = outcome.dialogue.len(),
            started_at = %outcome.started_at,
            elapsed_ms = outcome.elapsed_ms,
            "run finished"
        ),
    }
    Ok(())
}
