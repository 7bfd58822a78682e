// Executes a normalized action against a controlled surface.
use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use crate::clock::Clock;
use crate::config::SurfaceConfig;
use crate::errors::{PilotError, PilotResult};
use crate::executor::coordinator::{smooth_path, CoordinateMapper};
use crate::executor::input::Surface;
use crate::executor::text_input::keystroke_plan;
use crate::llm::types::{Action, ActionKind, ScrollDirection};
use crate::perception::types::{DevicePoint, Viewport};

/// What was actually done on the surface, for the `action` event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutedAction {
    pub kind: ActionKind,
    pub description: String,
    /// Device-pixel target for pointer actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<DevicePoint>,
}

pub struct ActionDispatcher {
    margin: i32,
    path_steps: usize,
    move_interval: Duration,
    typing_min_delay_ms: u64,
    typing_max_delay_ms: u64,
    scroll_step_px: i32,
    rng: Mutex<StdRng>,
    /// Last pointer position, start of the next movement path.
    cursor: Mutex<Option<DevicePoint>>,
}

impl ActionDispatcher {
    pub fn from_config(cfg: &SurfaceConfig) -> Self {
        let rng = match cfg.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            margin: cfg.clamp_margin,
            path_steps: cfg.path_steps,
            move_interval: Duration::from_millis(cfg.move_interval_ms),
            typing_min_delay_ms: cfg.typing_min_delay_ms,
            typing_max_delay_ms: cfg.typing_max_delay_ms,
            scroll_step_px: cfg.scroll_step_px,
            rng: Mutex::new(rng),
            cursor: Mutex::new(None),
        }
    }

    /// Run `action` on `surface`. `frame` is the size of the screenshot the
    /// service answered about; coordinates are mapped from it onto the
    /// surface's live viewport.
    pub async fn execute(
        &self,
        surface: &dyn Surface,
        action: &Action,
        frame: Viewport,
        clock: &dyn Clock,
    ) -> PilotResult<ExecutedAction> {
        match action {
            Action::Click { point: Some(rel) } => {
                let live = surface.viewport();
                let target = CoordinateMapper::new(frame, live, self.margin).to_live(*rel);
                let path = self.plan_path(live, target);
                for p in &path {
                    surface.pointer_move(*p).await?;
                    clock.sleep(self.move_interval).await;
                }
                surface.pointer_click(target).await?;
                self.set_cursor(target);
                tracing::info!(rel_x = rel.x, rel_y = rel.y, x = target.x, y = target.y, "clicked");
                Ok(ExecutedAction {
                    kind: ActionKind::Click,
                    description: format!("click ({},{}) → ({},{})", rel.x, rel.y, target.x, target.y),
                    target: Some(target),
                })
            }
            Action::Click { point: None } => {
                Err(PilotError::Action("click without usable coordinates".into()))
            }
            Action::Type { text, needs_enter } => {
                if text.is_empty() {
                    return Err(PilotError::Action("type without text".into()));
                }
                let plan = {
                    let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
                    keystroke_plan(text, self.typing_min_delay_ms, self.typing_max_delay_ms, &mut *rng)
                };
                for (c, delay_ms) in plan {
                    surface.type_char(c).await?;
                    clock.sleep(Duration::from_millis(delay_ms)).await;
                }
                if *needs_enter {
                    surface.key_press("Enter").await?;
                }
                tracing::info!(chars = text.chars().count(), needs_enter, "typed text");
                Ok(ExecutedAction {
                    kind: ActionKind::Type,
                    description: if *needs_enter {
                        format!("type \"{text}\" + Enter")
                    } else {
                        format!("type \"{text}\"")
                    },
                    target: None,
                })
            }
            Action::Scroll { direction, amount } => {
                let notches = i32::try_from((*amount).max(1)).unwrap_or(i32::MAX);
                let delta = self.scroll_step_px.saturating_mul(notches);
                let (dx, dy) = match direction {
                    ScrollDirection::Up => (0, delta.saturating_neg()),
                    ScrollDirection::Down => (0, delta),
                    ScrollDirection::Left => (delta.saturating_neg(), 0),
                    ScrollDirection::Right => (delta, 0),
                };
                surface.scroll_wheel(dx, dy).await?;
                tracing::info!(dx, dy, "scrolled");
                Ok(ExecutedAction {
                    kind: ActionKind::Scroll,
                    description: format!("scroll {direction:?} x{notches} ({dx},{dy})").to_lowercase(),
                    target: None,
                })
            }
            Action::KeyPress { key } => {
                if key.trim().is_empty() {
                    return Err(PilotError::Action("key press without key name".into()));
                }
                surface.key_press(key).await?;
                tracing::info!(key = %key, "key pressed");
                Ok(ExecutedAction {
                    kind: ActionKind::KeyPress,
                    description: format!("key {key}"),
                    target: None,
                })
            }
            Action::Finish { summary } => Ok(ExecutedAction {
                kind: ActionKind::Finish,
                description: match summary {
                    Some(s) => format!("finish: {s}"),
                    None => "finish".into(),
                },
                target: None,
            }),
            Action::Fail { reason } => Err(PilotError::Action(format!("service reported failure: {reason}"))),
        }
    }

    fn plan_path(&self, live: Viewport, target: DevicePoint) -> Vec<DevicePoint> {
        let last = *self.cursor.lock().unwrap_or_else(|p| p.into_inner());
        let from =
            last.unwrap_or(DevicePoint::new(live.width as i32 / 2, live.height as i32 / 2));
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        let mut path = smooth_path(from, target, self.path_steps, &mut *rng);
        // The click itself lands on `target`; keep moves inside the viewport.
        path.retain(|p| live.contains(*p));
        path
    }

    fn set_cursor(&self, at: DevicePoint) {
        *self.cursor.lock().unwrap_or_else(|p| p.into_inner()) = Some(at);
    }
}
