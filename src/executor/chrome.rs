// Chrome tab driven over CDP. headless_chrome is blocking, so every call
// hops onto the blocking pool.
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use headless_chrome::browser::tab::point::Point;
use headless_chrome::protocol::cdp::Input;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};

use crate::config::{AgentConfig, SurfaceConfig};
use crate::errors::{PilotError, PilotResult};
use crate::executor::input::Surface;
use crate::perception::types::{DevicePoint, Viewport};

pub struct ChromeSurface {
    _browser: Browser,
    tab: Arc<Tab>,
    viewport: Viewport,
    /// Last pointer position; wheel events are dispatched there.
    pointer: Mutex<Option<DevicePoint>>,
}

impl ChromeSurface {
    /// Launch Chrome and open `agent.base_url` in a fresh tab.
    pub async fn launch(agent: &AgentConfig, surface: &SurfaceConfig) -> PilotResult<Self> {
        let viewport = Viewport::new(surface.viewport_width, surface.viewport_height);
        let headless = surface.headless;
        let url = agent.base_url.clone();

        tokio::task::spawn_blocking(move || {
            let options = LaunchOptions {
                headless,
                window_size: Some((viewport.width, viewport.height)),
                idle_browser_timeout: std::time::Duration::from_secs(600),
                ..Default::default()
            };
            let browser = Browser::new(options)
                .map_err(|e| PilotError::Surface(format!("browser launch failed: {e}")))?;
            let tab = browser.new_tab().map_err(classify)?;
            tab.navigate_to(&url).map_err(classify)?;
            tab.wait_until_navigated().map_err(classify)?;
            tracing::info!(url = %url, width = viewport.width, height = viewport.height, "chrome ready");
            Ok(Self {
                _browser: browser,
                tab,
                viewport,
                pointer: Mutex::new(None),
            })
        })
        .await
        .map_err(|e| PilotError::Surface(format!("browser launch task failed: {e}")))?
    }

    fn remember_pointer(&self, at: DevicePoint) {
        *self.pointer.lock().unwrap_or_else(|p| p.into_inner()) = Some(at);
    }

    fn last_pointer(&self) -> Option<DevicePoint> {
        *self.pointer.lock().unwrap_or_else(|p| p.into_inner())
    }

    async fn with_tab<T, E, F>(&self, op: F) -> PilotResult<T>
    where
        T: Send + 'static,
        E: std::fmt::Display,
        F: FnOnce(&Tab) -> Result<T, E> + Send + 'static,
    {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || op(&tab).map_err(classify))
            .await
            .map_err(|e| PilotError::Surface(format!("surface task failed: {e}")))?
    }
}

/// Closed pages and dead connections are fatal; the rest is per-step.
fn classify(e: impl std::fmt::Display) -> PilotError {
    let msg = e.to_string();
    let lower = msg.to_lowercase();
    if lower.contains("closed") || lower.contains("disconnect") || lower.contains("connection") {
        PilotError::SurfaceDisconnected(msg)
    } else {
        PilotError::Surface(msg)
    }
}

/// Wheel events land on the last pointer position, or the viewport centre
/// before the pointer has moved.
fn wheel_event(last: Option<DevicePoint>, viewport: Viewport, dx: i32, dy: i32) -> Input::DispatchMouseEvent {
    let at = last.unwrap_or(DevicePoint::new(
        viewport.width as i32 / 2,
        viewport.height as i32 / 2,
    ));
    Input::DispatchMouseEvent {
        Type: Input::DispatchMouseEventTypeOption::MouseWheel,
        x: at.x as f64,
        y: at.y as f64,
        modifiers: None,
        timestamp: None,
        button: None,
        buttons: None,
        click_count: None,
        force: None,
        tangential_pressure: None,
        tilt_x: None,
        tilt_y: None,
        twist: None,
        delta_x: Some(dx as f64),
        delta_y: Some(dy as f64),
        pointer_Type: None,
    }
}

fn point(at: DevicePoint) -> Point {
    Point {
        x: at.x as f64,
        y: at.y as f64,
    }
}

#[async_trait]
impl Surface for ChromeSurface {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    async fn screenshot(&self) -> PilotResult<Vec<u8>> {
        self.with_tab(|tab| {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
        })
        .await
    }

    async fn pointer_move(&self, at: DevicePoint) -> PilotResult<()> {
        self.with_tab(move |tab| tab.move_mouse_to_point(point(at)).map(|_| ()))
            .await?;
        self.remember_pointer(at);
        Ok(())
    }

    async fn pointer_click(&self, at: DevicePoint) -> PilotResult<()> {
        self.with_tab(move |tab| tab.click_point(point(at)).map(|_| ()))
            .await?;
        self.remember_pointer(at);
        Ok(())
    }

    async fn type_char(&self, c: char) -> PilotResult<()> {
        self.with_tab(move |tab| tab.send_character(&c.to_string()).map(|_| ()))
            .await
    }

    async fn key_press(&self, key: &str) -> PilotResult<()> {
        let key = key.to_string();
        self.with_tab(move |tab| tab.press_key(&key).map(|_| ()))
            .await
    }

    /// A real wheel event, so inner scroll panes under the pointer move too.
    async fn scroll_wheel(&self, dx: i32, dy: i32) -> PilotResult<()> {
        let event = wheel_event(self.last_pointer(), self.viewport, dx, dy);
        self.with_tab(move |tab| tab.call_method(event).map(|_| ()))
            .await
    }
}
