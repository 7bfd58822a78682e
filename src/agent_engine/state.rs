use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::llm::types::HistoryItem;

/// Lifecycle states of one task run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Idle,
    Initializing,
    Navigating,
    Searching,
    Filtering,
    ViewingDetail,
    InitiatingDialogue,
    Conversing,
    AwaitingResponse,
    Completed,
    Failed,
    Paused,
}

impl TaskState {
    pub fn label(&self) -> &'static str {
        match self {
            TaskState::Idle => "idle",
            TaskState::Initializing => "initializing",
            TaskState::Navigating => "navigating",
            TaskState::Searching => "searching",
            TaskState::Filtering => "filtering",
            TaskState::ViewingDetail => "viewing_detail",
            TaskState::InitiatingDialogue => "initiating_dialogue",
            TaskState::Conversing => "conversing",
            TaskState::AwaitingResponse => "awaiting_response",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Paused => "paused",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What the caller wants out of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskGoal {
    /// One-paragraph summary of the candidate, used in greetings.
    pub profile_summary: String,
    pub keywords: String,
    pub city: String,
    /// Opening message sent to recruiters.
    pub greeting: String,
    /// Stop once this many listings have been contacted. 0 = no limit.
    pub max_applications: usize,
}

/// Listing currently in focus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: String,
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Agent,
    Recruiter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTurn {
    pub speaker: Speaker,
    pub text: String,
    pub step: u32,
}

pub const MAX_DIALOGUE_TURNS: usize = 20;

/// Mutable record of one run, owned by the orchestrator.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub goal: TaskGoal,
    pub target: Option<Target>,
    pub dialogue: VecDeque<DialogueTurn>,
    /// Ids of listings already contacted.
    pub applied: Vec<String>,
    pub history: Vec<HistoryItem>,
    pub step: u32,
    pub started_ms: u64,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub max_run_time_ms: u64,
}

impl TaskContext {
    pub fn new(goal: TaskGoal, started_ms: u64, max_run_time_ms: u64) -> Self {
        Self {
            goal,
            target: None,
            dialogue: VecDeque::new(),
            applied: Vec::new(),
            history: Vec::new(),
            step: 0,
            started_ms,
            started_at: chrono::Utc::now(),
            max_run_time_ms,
        }
    }

    /// The last `n` history items, oldest first.
    pub fn recent_history(&self, n: usize) -> &[HistoryItem] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    pub fn push_dialogue(&mut self, speaker: Speaker, text: impl Into<String>) {
        if self.dialogue.len() >= MAX_DIALOGUE_TURNS {
            self.dialogue.pop_front();
        }
        self.dialogue.push_back(DialogueTurn {
            speaker,
            text: text.into(),
            step: self.step,
        });
    }

    /// Record the focused listing as contacted (once).
    pub fn mark_applied(&mut self) -> Option<String> {
        let id = self.target.as_ref()?.id.clone();
        if self.applied.contains(&id) {
            return None;
        }
        self.applied.push(id.clone());
        Some(id)
    }

    pub fn goal_reached(&self) -> bool {
        self.goal.max_applications > 0 && self.applied.len() >= self.goal.max_applications
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::ActionKind;

    fn item(step: u32) -> HistoryItem {
        HistoryItem {
            step,
            action: ActionKind::Scroll,
            parameters: serde_json::json!({}),
            thought: format!("step {step}"),
            error: None,
        }
    }

    #[test]
    fn recent_history_keeps_the_tail() {
        let mut ctx = TaskContext::new(TaskGoal::default(), 0, 1000);
        for s in 1..=15 {
            ctx.history.push(item(s));
        }
        let window = ctx.recent_history(10);
        assert_eq!(window.len(), 10);
        assert_eq!(window[0].step, 6);
        assert_eq!(window[9].step, 15);
        assert_eq!(ctx.recent_history(100).len(), 15);
    }

    #[test]
    fn dialogue_is_bounded() {
        let mut ctx = TaskContext::new(TaskGoal::default(), 0, 1000);
        for i in 0..(MAX_DIALOGUE_TURNS + 5) {
            ctx.push_dialogue(Speaker::Agent, format!("msg {i}"));
        }
        assert_eq!(ctx.dialogue.len(), MAX_DIALOGUE_TURNS);
        assert_eq!(ctx.dialogue.front().map(|t| t.text.as_str()), Some("msg 5"));
    }

    #[test]
    fn applying_twice_counts_once() {
        let mut ctx = TaskContext::new(
            TaskGoal {
                max_applications: 1,
                ..TaskGoal::default()
            },
            0,
            1000,
        );
        assert_eq!(ctx.mark_applied(), None);
        ctx.target = Some(Target {
            id: "listing-3".into(),
            title: "Rust Engineer".into(),
        });
        assert_eq!(ctx.mark_applied().as_deref(), Some("listing-3"));
        assert_eq!(ctx.mark_applied(), None);
        assert!(ctx.goal_reached());
    }
}
