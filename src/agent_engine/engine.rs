use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

use crate::agent_engine::event_bus::{AgentEvent, CompletionReason, EventBus, EventPayload};
use crate::agent_engine::history::SessionTranscript;
use crate::agent_engine::instructions::instruction_for;
use crate::agent_engine::loop_control::{Budget, ControlHandle, LoopController, RunSignal};
use crate::agent_engine::state::{DialogueTurn, Speaker, Target, TaskContext, TaskGoal, TaskState};
use crate::agent_engine::transitions::infer_transition;
use crate::clock::{Clock, TokioClock};
use crate::config::{AgentConfig, AppConfig};
use crate::errors::{PilotError, PilotResult};
use crate::executor::dispatcher::ActionDispatcher;
use crate::executor::input::Surface;
use crate::llm::client::InferenceClient;
use crate::llm::simulate::first_quoted;
use crate::llm::types::{Action, ActionKind, DeviceType, HistoryItem, InferenceRequest};
use crate::perception::screenshot::{estimate_size, is_oversized, ScreenshotProvider};
use crate::perception::types::ScreenshotResult;

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub state: TaskState,
    pub steps: u32,
    pub applied: Vec<String>,
    pub history: Vec<HistoryItem>,
    /// Listing in focus when the run ended.
    pub target: Option<Target>,
    /// Recent dialogue with the focused listing, oldest first.
    pub dialogue: Vec<DialogueTurn>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    /// Set when the run ended with `complete`.
    pub completion: Option<CompletionReason>,
    /// Set when the run ended with a fatal error.
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

enum StepOutcome {
    Continue,
    Finished,
    GoalReached,
}

enum RunEnd {
    Complete(CompletionReason),
    Fatal(PilotError),
}

/// Drives one surface through the screenshot → inference → action loop.
pub struct Orchestrator {
    config: AgentConfig,
    device_type: DeviceType,
    cache_ttl: Duration,
    surface: Arc<dyn Surface>,
    screenshots: ScreenshotProvider,
    inference: InferenceClient,
    dispatcher: ActionDispatcher,
    events: EventBus,
    clock: Arc<dyn Clock>,
    control: ControlHandle,
    state: TaskState,
    transcript: Option<SessionTranscript>,
}

impl Orchestrator {
    pub fn new(
        config: &AppConfig,
        surface: Arc<dyn Surface>,
        inference: InferenceClient,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config: config.agent.clone(),
            device_type: DeviceType::parse(&config.agent.device_type),
            cache_ttl: Duration::from_secs(config.screenshot.cache_ttl_secs),
            surface,
            screenshots: ScreenshotProvider::from_config(&config.screenshot),
            inference,
            dispatcher: ActionDispatcher::from_config(&config.surface),
            events: EventBus::new(),
            clock,
            control: ControlHandle::new(),
            state: TaskState::Idle,
            transcript: SessionTranscript::from_setting(config.agent.transcript_dir.as_deref()),
        }
    }

    /// Real clock, inference client built from `config.inference`.
    pub fn from_config(config: &AppConfig, surface: Arc<dyn Surface>) -> PilotResult<Self> {
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new());
        let inference = InferenceClient::from_config(&config.inference, clock.clone())?;
        Ok(Self::new(config, surface, inference, clock))
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn inference(&self) -> &InferenceClient {
        &self.inference
    }

    /// Handle for pause/resume/stop from other tasks.
    /// Last frame captured while in `state`, if still cached.
    pub fn cached_frame(&self, state: TaskState) -> Option<&ScreenshotResult> {
        self.screenshots.get(state.label())
    }

    pub fn handle(&self) -> ControlHandle {
        self.control.clone()
    }

    pub fn pause(&self) -> bool {
        self.control.pause()
    }

    pub fn resume(&self) -> bool {
        self.control.resume()
    }

    pub fn stop(&self) {
        self.control.stop()
    }

    pub fn on_event(&mut self, listener: impl Fn(&AgentEvent) + Send + Sync + 'static) {
        self.events.on_event(listener);
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<AgentEvent> {
        self.events.subscribe()
    }

    /// Run until completion, failure or stop. Control requests made before
    /// the call are discarded.
    pub async fn start(&mut self, goal: TaskGoal) -> RunOutcome {
        self.control.reset();
        self.state = TaskState::Idle;
        self.screenshots.clear_cache();
        let mut budget = LoopController::from_config(&self.config);
        let mut ctx = TaskContext::new(goal, self.clock.now_ms(), budget.max_run_time_ms());
        let mut signals = self.control.watch();
        let step_delay = Duration::from_millis(self.config.step_delay_ms);

        tracing::info!(
            keywords = %ctx.goal.keywords,
            city = %ctx.goal.city,
            max_steps = self.config.max_steps,
            simulated = self.inference.is_simulated(),
            "run started"
        );
        self.set_state(TaskState::Initializing, 0);

        let end = loop {
            let mut signal = *signals.borrow_and_update();
            if signal == RunSignal::Paused {
                signal = self.wait_while_paused(&mut signals, ctx.step).await;
            }
            if signal == RunSignal::Stopping {
                tracing::info!(step = ctx.step, "stop requested");
                break RunEnd::Complete(CompletionReason::Stopped);
            }

            let elapsed_ms = self.clock.now_ms().saturating_sub(ctx.started_ms);
            match budget.check(ctx.step, elapsed_ms) {
                Budget::Continue => {}
                Budget::StepsExhausted => {
                    tracing::info!(steps = ctx.step, "step budget exhausted");
                    break RunEnd::Complete(CompletionReason::StepBudgetExhausted);
                }
                Budget::TimeExhausted { elapsed_ms } => {
                    break RunEnd::Fatal(PilotError::Timeout {
                        elapsed_ms,
                        budget_ms: ctx.max_run_time_ms,
                    });
                }
            }

            match self.step(&mut ctx).await {
                Ok(StepOutcome::Continue) => budget.record_success(),
                Ok(StepOutcome::Finished) => break RunEnd::Complete(CompletionReason::Finished),
                Ok(StepOutcome::GoalReached) => {
                    break RunEnd::Complete(CompletionReason::GoalReached)
                }
                Err(e) if e.is_fatal() => break RunEnd::Fatal(e),
                Err(e) => {
                    tracing::warn!(step = ctx.step, error = %e, "step failed");
                    self.events.emit(EventPayload::Error {
                        step: ctx.step,
                        message: e.to_string(),
                        fatal: false,
                        applied: Vec::new(),
                    });
                    if budget.record_failure() {
                        break RunEnd::Fatal(PilotError::TooManyFailures(budget.failure_count()));
                    }
                }
            }

            self.clock.sleep(step_delay).await;
        };

        self.finish(ctx, end)
    }

    async fn wait_while_paused(
        &mut self,
        signals: &mut watch::Receiver<RunSignal>,
        step: u32,
    ) -> RunSignal {
        let prior = self.state;
        self.set_state(TaskState::Paused, step);
        tracing::info!(step, "run paused");
        let signal = match signals.wait_for(|s| *s != RunSignal::Paused).await {
            Ok(s) => *s,
            Err(_) => RunSignal::Stopping,
        };
        if signal == RunSignal::Running {
            tracing::info!(step, "run resumed");
            self.set_state(prior, step);
        }
        signal
    }

    async fn step(&mut self, ctx: &mut TaskContext) -> PilotResult<StepOutcome> {
        let step = ctx.step + 1;

        let frame = self.screenshots.capture(self.surface.as_ref()).await;
        self.events.emit(EventPayload::Screenshot {
            step,
            width: frame.width,
            height: frame.height,
            format: frame.format,
            bytes: frame.data.len(),
            image: frame.to_base64(),
        });
        self.screenshots.cache(self.state.label(), frame.clone());
        self.screenshots.evict_expired(self.cache_ttl);

        let image = if frame.is_empty() {
            String::new()
        } else if is_oversized(&frame, self.config.max_frame_bytes) {
            tracing::warn!(
                step,
                size = estimate_size(&frame),
                limit = self.config.max_frame_bytes,
                "frame too large, sending without image"
            );
            String::new()
        } else {
            frame.data_url()
        };

        let request = InferenceRequest {
            image,
            instruction: instruction_for(self.state, &ctx.goal, &self.config.base_url),
            history: ctx.recent_history(self.config.history_window).to_vec(),
            device_type: self.device_type,
        };
        tracing::debug!(step, state = %self.state, instruction = %request.instruction, "requesting action");
        let response = self.inference.send(&request).await;
        let kind = response.action.kind();
        self.events.emit(EventPayload::Thought {
            step,
            text: response.thought.clone(),
            action: kind,
            simulated: response.simulated,
        });

        let result = self
            .dispatcher
            .execute(
                self.surface.as_ref(),
                &response.action,
                frame.viewport(),
                self.clock.as_ref(),
            )
            .await;

        ctx.step = step;
        let item = HistoryItem {
            step,
            action: kind,
            parameters: response.action.parameters(),
            thought: response.thought.clone(),
            error: result.as_ref().err().map(|e| e.to_string()),
        };
        if let Some(t) = &self.transcript {
            t.record(&item);
        }
        ctx.history.push(item);

        let executed = result?;
        self.events.emit(EventPayload::action(step, &executed));

        if kind == ActionKind::Finish {
            return Ok(StepOutcome::Finished);
        }
        if let Action::Type { text, .. } = &response.action {
            if matches!(self.state, TaskState::InitiatingDialogue | TaskState::Conversing) {
                ctx.push_dialogue(Speaker::Agent, text.clone());
            }
        }
        if let Some(next) = infer_transition(self.state, &response.thought, kind) {
            self.enter(next, ctx, &response.thought);
        }
        if ctx.goal_reached() {
            tracing::info!(applied = ctx.applied.len(), "application target reached");
            return Ok(StepOutcome::GoalReached);
        }
        Ok(StepOutcome::Continue)
    }

    /// Sub-goal bookkeeping for a heuristic transition, then the state change.
    fn enter(&mut self, next: TaskState, ctx: &mut TaskContext, thought: &str) {
        match (self.state, next) {
            (_, TaskState::ViewingDetail) => {
                let title = first_quoted(thought)
                    .unwrap_or(ctx.goal.keywords.as_str())
                    .to_string();
                let target = Target {
                    id: format!("listing-{}", ctx.step),
                    title,
                };
                tracing::info!(id = %target.id, title = %target.title, "focused listing");
                ctx.target = Some(target);
                ctx.dialogue.clear();
            }
            (TaskState::Conversing, TaskState::AwaitingResponse) => {
                if let Some(id) = ctx.mark_applied() {
                    tracing::info!(id = %id, applied = ctx.applied.len(), "greeting sent");
                }
            }
            (TaskState::AwaitingResponse, TaskState::Conversing) => {
                ctx.push_dialogue(Speaker::Recruiter, thought);
            }
            _ => {}
        }
        self.set_state(next, ctx.step);
    }

    fn set_state(&mut self, next: TaskState, step: u32) {
        if next == self.state {
            return;
        }
        let from = self.state;
        self.state = next;
        tracing::info!(step, from = %from, to = %next, "state changed");
        self.events.emit(EventPayload::Status { step, from, to: next });
    }

    /// Emit the single terminal event and build the outcome.
    fn finish(&mut self, ctx: TaskContext, end: RunEnd) -> RunOutcome {
        let elapsed_ms = self.clock.now_ms().saturating_sub(ctx.started_ms);
        let (completion, error) = match end {
            RunEnd::Complete(reason) => {
                self.set_state(TaskState::Completed, ctx.step);
                tracing::info!(steps = ctx.step, applied = ctx.applied.len(), ?reason, "run completed");
                self.events.emit(EventPayload::Complete {
                    steps: ctx.step,
                    applied: ctx.applied.clone(),
                    reason,
                });
                (Some(reason), None)
            }
            RunEnd::Fatal(e) => {
                self.set_state(TaskState::Failed, ctx.step);
                tracing::error!(steps = ctx.step, error = %e, "run failed");
                self.events.emit(EventPayload::Error {
                    step: ctx.step,
                    message: e.to_string(),
                    fatal: true,
                    applied: ctx.applied.clone(),
                });
                (None, Some(e.to_string()))
            }
        };
        RunOutcome {
            state: self.state,
            steps: ctx.step,
            applied: ctx.applied,
            history: ctx.history,
            target: ctx.target,
            dialogue: ctx.dialogue.into(),
            started_at: ctx.started_at,
            completion,
            error,
            elapsed_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::clock::ManualClock;
    use crate::llm::provider::InferenceTransport;
    use crate::llm::retry::RetryPolicy;
    use crate::llm::types::{ActionResponse, ScrollDirection};
    use crate::perception::types::{RelativePoint, Viewport};
    use crate::test_support::{MockSurface, ScriptedTransport};

    fn config(max_steps: u32) -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.agent.max_steps = max_steps;
        cfg.agent.step_delay_ms = 1000;
        cfg.screenshot.width = 320;
        cfg.screenshot.height = 200;
        cfg.surface.rng_seed = Some(7);
        cfg.surface.path_steps = 3;
        cfg
    }

    fn goal() -> TaskGoal {
        TaskGoal {
            profile_summary: "Backend engineer, 5 years of Rust".into(),
            keywords: "Rust".into(),
            city: "Shanghai".into(),
            greeting: "Hello, I am interested in this role".into(),
            max_applications: 1,
        }
    }

    fn scroll() -> ActionResponse {
        ActionResponse {
            thought: "keep browsing".into(),
            action: Action::Scroll {
                direction: ScrollDirection::Down,
                amount: 1,
            },
            simulated: false,
        }
    }

    fn click() -> ActionResponse {
        ActionResponse {
            thought: "press the button".into(),
            action: Action::Click {
                point: Some(RelativePoint::new(500, 500)),
            },
            simulated: false,
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        surface: Arc<MockSurface>,
        clock: Arc<ManualClock>,
        events: Arc<Mutex<Vec<AgentEvent>>>,
    }

    fn harness(cfg: &AppConfig, transport: Option<Arc<ScriptedTransport>>) -> Harness {
        let surface = Arc::new(MockSurface::new(Viewport::new(1280, 800)));
        let clock = Arc::new(ManualClock::new());
        let inference = InferenceClient::new(
            transport.map(|t| t as Arc<dyn InferenceTransport>),
            RetryPolicy::default(),
            clock.clone(),
        );
        let mut orchestrator = Orchestrator::new(cfg, surface.clone(), inference, clock.clone());
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        orchestrator.on_event(move |e| sink.lock().unwrap().push(e.clone()));
        Harness {
            orchestrator,
            surface,
            clock,
            events,
        }
    }

    fn terminal_events(events: &[AgentEvent]) -> Vec<&EventPayload> {
        events
            .iter()
            .map(|e| &e.payload)
            .filter(|p| p.is_terminal())
            .collect()
    }

    fn statuses(events: &[AgentEvent]) -> Vec<(TaskState, TaskState)> {
        events
            .iter()
            .filter_map(|e| match e.payload {
                EventPayload::Status { from, to, .. } => Some((from, to)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn step_budget_exhaustion_completes() {
        let transport = Arc::new(ScriptedTransport::repeating(scroll()));
        let mut h = harness(&config(3), Some(transport.clone()));

        let outcome = h.orchestrator.start(goal()).await;

        assert_eq!(outcome.state, TaskState::Completed);
        assert_eq!(outcome.completion, Some(CompletionReason::StepBudgetExhausted));
        assert_eq!(outcome.steps, 3);
        assert_eq!(outcome.history.len(), 3);
        assert_eq!(transport.calls(), 3);
        let steps: Vec<u32> = outcome.history.iter().map(|i| i.step).collect();
        assert_eq!(steps, vec![1, 2, 3]);

        let events = h.events.lock().unwrap();
        let terminal = terminal_events(&events);
        assert_eq!(terminal.len(), 1);
        assert!(matches!(terminal[0], EventPayload::Complete { steps: 3, .. }));
        assert_eq!(events.last().map(|e| e.payload.kind()), Some("complete"));
    }

    #[tokio::test]
    async fn zero_run_time_fails_before_the_first_step() {
        let mut cfg = config(10);
        cfg.agent.max_run_time_secs = 0;
        let transport = Arc::new(ScriptedTransport::repeating(scroll()));
        let mut h = harness(&cfg, Some(transport.clone()));

        let outcome = h.orchestrator.start(goal()).await;

        assert_eq!(outcome.state, TaskState::Failed);
        assert_eq!(outcome.steps, 0);
        assert_eq!(transport.calls(), 0);
        assert_eq!(h.surface.screenshots(), 0);
        let events = h.events.lock().unwrap();
        let terminal = terminal_events(&events);
        assert_eq!(terminal.len(), 1);
        assert!(matches!(terminal[0], EventPayload::Error { fatal: true, .. }));
    }

    #[tokio::test]
    async fn run_time_is_checked_between_steps() {
        let mut cfg = config(50);
        cfg.agent.max_run_time_secs = 10;
        cfg.agent.step_delay_ms = 4000;
        let mut h = harness(&cfg, Some(Arc::new(ScriptedTransport::repeating(scroll()))));

        let outcome = h.orchestrator.start(goal()).await;

        assert_eq!(outcome.state, TaskState::Failed);
        assert_eq!(outcome.steps, 3);
        assert!(outcome.error.unwrap_or_default().contains("time budget"));
        assert_eq!(h.clock.total_slept(), Duration::from_secs(12));
    }

    #[tokio::test]
    async fn pause_and_resume_keep_every_step() {
        let cfg = config(5);
        let control = Arc::new(Mutex::new(None::<ControlHandle>));
        let hook_control = control.clone();
        let transport = Arc::new(ScriptedTransport::repeating(scroll()).with_hook(move |n, _| {
            if n == 2 {
                if let Some(c) = hook_control.lock().unwrap().as_ref() {
                    c.pause();
                }
            }
        }));
        let mut h = harness(&cfg, Some(transport.clone()));
        let handle = h.orchestrator.handle();
        *control.lock().unwrap() = Some(handle.clone());

        let paused_at = Arc::new(Mutex::new(None));
        let seen = paused_at.clone();
        h.orchestrator.on_event(move |e| {
            if let EventPayload::Status { step, to: TaskState::Paused, .. } = e.payload {
                *seen.lock().unwrap() = Some(step);
                handle.resume();
            }
        });

        let outcome = h.orchestrator.start(goal()).await;

        assert_eq!(*paused_at.lock().unwrap(), Some(2));
        assert_eq!(outcome.state, TaskState::Completed);
        assert_eq!(outcome.history.len(), 5);
        assert_eq!(transport.calls(), 5);
        let steps: Vec<u32> = outcome.history.iter().map(|i| i.step).collect();
        assert_eq!(steps, vec![1, 2, 3, 4, 5]);

        let events = h.events.lock().unwrap();
        let transitions = statuses(&events);
        let paused = transitions
            .iter()
            .position(|(_, to)| *to == TaskState::Paused)
            .unwrap();
        assert_eq!(transitions[paused + 1].0, TaskState::Paused);
        assert_eq!(transitions[paused + 1].1, transitions[paused].0);
    }

    #[tokio::test]
    async fn stop_completes_at_the_next_boundary() {
        let control = Arc::new(Mutex::new(None::<ControlHandle>));
        let hook_control = control.clone();
        let transport = Arc::new(ScriptedTransport::repeating(scroll()).with_hook(move |n, _| {
            if n == 2 {
                if let Some(c) = hook_control.lock().unwrap().as_ref() {
                    c.stop();
                }
            }
        }));
        let mut h = harness(&config(10), Some(transport));
        *control.lock().unwrap() = Some(h.orchestrator.handle());

        let outcome = h.orchestrator.start(goal()).await;

        assert_eq!(outcome.state, TaskState::Completed);
        assert_eq!(outcome.completion, Some(CompletionReason::Stopped));
        assert_eq!(outcome.steps, 2);
    }

    #[tokio::test]
    async fn finish_action_completes() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            Ok(scroll()),
            Ok(ActionResponse {
                thought: "all done".into(),
                action: Action::Finish { summary: None },
                simulated: false,
            }),
        ]));
        let mut h = harness(&config(10), Some(transport));

        let outcome = h.orchestrator.start(goal()).await;

        assert_eq!(outcome.completion, Some(CompletionReason::Finished));
        assert_eq!(outcome.steps, 2);
        assert_eq!(h.orchestrator.state(), TaskState::Completed);
    }

    #[tokio::test]
    async fn disconnected_surface_fails_the_run() {
        let mut h = harness(&config(10), Some(Arc::new(ScriptedTransport::repeating(click()))));
        h.surface.disconnect();

        let outcome = h.orchestrator.start(goal()).await;

        assert_eq!(outcome.state, TaskState::Failed);
        assert_eq!(outcome.steps, 1);
        assert!(outcome.history[0].error.is_some());
        let events = h.events.lock().unwrap();
        assert_eq!(terminal_events(&events).len(), 1);
    }

    #[tokio::test]
    async fn recoverable_failures_do_not_stop_the_run() {
        let mut cfg = config(3);
        cfg.agent.max_consecutive_failures = 10;
        let mut h = harness(&cfg, Some(Arc::new(ScriptedTransport::repeating(click()))));
        h.surface.fail_clicks(true);

        let outcome = h.orchestrator.start(goal()).await;

        assert_eq!(outcome.state, TaskState::Completed);
        assert_eq!(outcome.steps, 3);
        assert!(outcome.history.iter().all(|i| i.error.is_some()));
        let events = h.events.lock().unwrap();
        let soft = events
            .iter()
            .filter(|e| matches!(e.payload, EventPayload::Error { fatal: false, .. }))
            .count();
        assert_eq!(soft, 3);
    }

    #[tokio::test]
    async fn consecutive_failures_escalate() {
        let mut cfg = config(10);
        cfg.agent.max_consecutive_failures = 2;
        let mut h = harness(&cfg, Some(Arc::new(ScriptedTransport::repeating(click()))));
        h.surface.fail_clicks(true);

        let outcome = h.orchestrator.start(goal()).await;

        assert_eq!(outcome.state, TaskState::Failed);
        assert_eq!(outcome.steps, 2);
        assert!(outcome.error.unwrap_or_default().contains("2"));
    }

    #[tokio::test]
    async fn simulated_run_reaches_the_application_target() {
        let mut h = harness(&config(30), None);

        let outcome = h.orchestrator.start(goal()).await;

        assert_eq!(outcome.completion, Some(CompletionReason::GoalReached));
        assert_eq!(outcome.applied, vec!["listing-4".to_string()]);
        assert_eq!(outcome.steps, 7);
        assert!(outcome.history.iter().all(|i| i.error.is_none()));
        assert_eq!(
            outcome.target,
            Some(Target {
                id: "listing-4".into(),
                title: "Rust".into(),
            })
        );
        assert_eq!(outcome.dialogue.len(), 1);
        assert_eq!(outcome.dialogue[0].speaker, Speaker::Agent);
        assert_eq!(outcome.dialogue[0].text, goal().greeting);
        assert_eq!(outcome.dialogue[0].step, 7);
        assert!(outcome.started_at <= chrono::Utc::now());
        assert!(h.orchestrator.cached_frame(TaskState::Conversing).is_some());
        assert!(h.orchestrator.cached_frame(TaskState::Paused).is_none());

        let events = h.events.lock().unwrap();
        let visited: Vec<TaskState> = statuses(&events).into_iter().map(|(_, to)| to).collect();
        assert_eq!(
            visited,
            vec![
                TaskState::Initializing,
                TaskState::Navigating,
                TaskState::Searching,
                TaskState::Filtering,
                TaskState::ViewingDetail,
                TaskState::InitiatingDialogue,
                TaskState::Conversing,
                TaskState::AwaitingResponse,
                TaskState::Completed,
            ]
        );
        assert!(h.surface.calls().iter().any(|c| matches!(
            c,
            crate::test_support::SurfaceCall::Key(k) if k == "Enter"
        )));
    }

    #[tokio::test]
    async fn history_window_is_bounded() {
        let mut cfg = config(15);
        cfg.agent.history_window = 10;
        let transport = Arc::new(ScriptedTransport::repeating(scroll()));
        let mut h = harness(&cfg, Some(transport.clone()));

        h.orchestrator.start(goal()).await;

        let requests = transport.requests();
        assert_eq!(requests.len(), 15);
        assert!(requests[0].history.is_empty());
        assert_eq!(requests[4].history.len(), 4);
        assert!(requests.iter().all(|r| r.history.len() <= 10));
        let last = &requests[14].history;
        assert_eq!(last.len(), 10);
        assert_eq!(last.first().map(|i| i.step), Some(5));
        assert_eq!(last.last().map(|i| i.step), Some(14));
    }

    #[tokio::test]
    async fn oversized_frames_are_sent_without_image() {
        let mut cfg = config(1);
        cfg.agent.max_frame_bytes = 16;
        let transport = Arc::new(ScriptedTransport::repeating(scroll()));
        let mut h = harness(&cfg, Some(transport.clone()));

        h.orchestrator.start(goal()).await;

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].image.is_empty());
        let events = h.events.lock().unwrap();
        assert!(events.iter().any(|e| matches!(
            &e.payload,
            EventPayload::Screenshot { bytes, .. } if *bytes > 16
        )));
    }

    #[tokio::test]
    async fn panicking_listener_does_not_halt_the_run() {
        let mut h = harness(&config(2), Some(Arc::new(ScriptedTransport::repeating(scroll()))));
        h.orchestrator.on_event(|_| panic!("listener bug"));
        let mut rx = h.orchestrator.subscribe();

        let outcome = h.orchestrator.start(goal()).await;

        assert_eq!(outcome.state, TaskState::Completed);
        let mut kinds = Vec::new();
        while let Ok(e) = rx.try_recv() {
            kinds.push(e.payload.kind());
        }
        assert_eq!(kinds.first(), Some(&"status"));
        assert_eq!(kinds.last(), Some(&"complete"));
        assert_eq!(kinds.iter().filter(|k| **k == "screenshot").count(), 2);
    }
}
