use std::panic::{catch_unwind, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::agent_engine::state::TaskState;
use crate::executor::dispatcher::ExecutedAction;
use crate::llm::types::ActionKind;
use crate::perception::types::FrameFormat;

/// Why a run ended with a `complete` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    Finished,
    GoalReached,
    StepBudgetExhausted,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    Screenshot {
        step: u32,
        width: u32,
        height: u32,
        format: FrameFormat,
        bytes: usize,
        /// Base64 of the frame; empty for placeholder frames.
        image: String,
    },
    Thought {
        step: u32,
        text: String,
        action: ActionKind,
        simulated: bool,
    },
    Action {
        step: u32,
        kind: ActionKind,
        description: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        x: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        y: Option<i32>,
    },
    Status {
        step: u32,
        from: TaskState,
        to: TaskState,
    },
    Error {
        step: u32,
        message: String,
        /// Fatal errors are terminal for the run.
        fatal: bool,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        applied: Vec<String>,
    },
    Complete {
        steps: u32,
        applied: Vec<String>,
        reason: CompletionReason,
    },
}

impl EventPayload {
    pub fn action(step: u32, done: &ExecutedAction) -> Self {
        EventPayload::Action {
            step,
            kind: done.kind,
            description: done.description.clone(),
            x: done.target.map(|p| p.x),
            y: done.target.map(|p| p.y),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EventPayload::Screenshot { .. } => "screenshot",
            EventPayload::Thought { .. } => "thought",
            EventPayload::Action { .. } => "action",
            EventPayload::Status { .. } => "status",
            EventPayload::Error { .. } => "error",
            EventPayload::Complete { .. } => "complete",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventPayload::Complete { .. } | EventPayload::Error { fatal: true, .. }
        )
    }
}

/// `{type, data, timestamp}` record of the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    #[serde(flatten)]
    pub payload: EventPayload,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

type Listener = Box<dyn Fn(&AgentEvent) + Send + Sync>;

/// In-process fan-out of run events.
///
/// Listeners run synchronously in registration order; a panicking listener
/// is logged and skipped. Channel subscribers receive a copy of every event
/// and are dropped once their receiver goes away.
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Listener>,
    subscribers: Vec<mpsc::UnboundedSender<AgentEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_event(&mut self, listener: impl Fn(&AgentEvent) + Send + Sync + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<AgentEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn emit(&mut self, payload: EventPayload) {
        let event = AgentEvent {
            payload,
            timestamp: chrono::Utc::now(),
        };
        tracing::trace!(kind = event.payload.kind(), "event");

        for (idx, listener) in self.listeners.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                tracing::error!(listener = idx, kind = event.payload.kind(), "event listener panicked");
            }
        }
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
