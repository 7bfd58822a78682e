pub mod agent_engine;
pub mod clock;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;

#[cfg(test)]
pub(crate) mod test_support;

pub use agent_engine::engine::{Orchestrator, RunOutcome};
pub use agent_engine::event_bus::{AgentEvent, CompletionReason, EventPayload};
pub use agent_engine::loop_control::ControlHandle;
pub use agent_engine::state::{TaskGoal, TaskState};
pub use errors::{PilotError, PilotResult};

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the
/// default `info` level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();
}
