// Run budgets and the pause/resume/stop control channel.
use std::sync::Arc;

use tokio::sync::watch;

use crate::config::AgentConfig;

/// Requested run mode, written by callers and read by the loop at step
/// boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSignal {
    Running,
    Paused,
    Stopping,
}

/// Cloneable handle for controlling a run from another task.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: Arc<watch::Sender<RunSignal>>,
}

impl ControlHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(RunSignal::Running);
        Self { tx: Arc::new(tx) }
    }

    /// No-op unless the run is currently running.
    pub fn pause(&self) -> bool {
        self.tx.send_if_modified(|s| {
            if *s == RunSignal::Running {
                *s = RunSignal::Paused;
                true
            } else {
                false
            }
        })
    }

    /// No-op unless the run is currently paused.
    pub fn resume(&self) -> bool {
        self.tx.send_if_modified(|s| {
            if *s == RunSignal::Paused {
                *s = RunSignal::Running;
                true
            } else {
                false
            }
        })
    }

    /// Takes effect at the next step boundary, including while paused.
    pub fn stop(&self) {
        self.tx.send_replace(RunSignal::Stopping);
    }

    pub fn signal(&self) -> RunSignal {
        *self.tx.borrow()
    }

    pub(crate) fn reset(&self) {
        self.tx.send_replace(RunSignal::Running);
    }

    pub(crate) fn watch(&self) -> watch::Receiver<RunSignal> {
        self.tx.subscribe()
    }
}

impl Default for ControlHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Budget check outcome for the next step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    Continue,
    StepsExhausted,
    TimeExhausted { elapsed_ms: u64 },
}

pub struct LoopController {
    max_steps: u32,
    max_run_time_ms: u64,
    max_failures: u32,
    failure_count: u32,
}

impl LoopController {
    pub fn new(max_steps: u32, max_run_time_ms: u64, max_failures: u32) -> Self {
        Self {
            max_steps,
            max_run_time_ms,
            max_failures: max_failures.max(1),
            failure_count: 0,
        }
    }

    pub fn from_config(cfg: &AgentConfig) -> Self {
        Self::new(
            cfg.max_steps,
            cfg.max_run_time_secs.saturating_mul(1000),
            cfg.max_consecutive_failures,
        )
    }

    pub fn max_run_time_ms(&self) -> u64 {
        self.max_run_time_ms
    }

    /// Time is checked first: a zero budget fails before any step runs.
    pub fn check(&self, steps_done: u32, elapsed_ms: u64) -> Budget {
        if elapsed_ms >= self.max_run_time_ms {
            Budget::TimeExhausted { elapsed_ms }
        } else if steps_done >= self.max_steps {
            Budget::StepsExhausted
        } else {
            Budget::Continue
        }
    }

    /// Count one recoverable failure; true once the streak hits the limit.
    pub fn record_failure(&mut self) -> bool {
        self.failure_count += 1;
        self.failure_count >= self.max_failures
    }

    pub fn record_success(&mut self) {
        self.failure_count = 0;
    }

    pub fn failure_count(&self) -> u32 {
        self.failure_count
    }
}
