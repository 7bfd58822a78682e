//! Doubles shared by the unit tests.
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::{PilotError, PilotResult};
use crate::executor::input::Surface;
use crate::llm::provider::InferenceTransport;
use crate::llm::types::{ActionResponse, InferenceRequest};
use crate::perception::types::{DevicePoint, Viewport};

/// Small solid-colour PNG of the given size.
pub fn png_frame(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([30, 144, 255]));
    let mut out = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
        .unwrap();
    out
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    Screenshot,
    Move(DevicePoint),
    Click(DevicePoint),
    Char(char),
    Key(String),
    Scroll(i32, i32),
}

#[derive(Default)]
struct SurfaceState {
    calls: Vec<SurfaceCall>,
    frame: Vec<u8>,
    fail_screenshots: bool,
    fail_clicks: bool,
    disconnected: bool,
}

/// Surface that records every call instead of driving a page.
pub struct MockSurface {
    viewport: Viewport,
    state: Mutex<SurfaceState>,
}

impl MockSurface {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            state: Mutex::new(SurfaceState {
                frame: png_frame(viewport.width.min(64), viewport.height.min(64)),
                ..SurfaceState::default()
            }),
        }
    }

    pub fn set_frame(&self, frame: Vec<u8>) {
        self.state.lock().unwrap().frame = frame;
    }

    pub fn fail_screenshots(&self, fail: bool) {
        self.state.lock().unwrap().fail_screenshots = fail;
    }

    pub fn fail_clicks(&self, fail: bool) {
        self.state.lock().unwrap().fail_clicks = fail;
    }

    pub fn disconnect(&self) {
        self.state.lock().unwrap().disconnected = true;
    }

    /// Input calls so far (screenshots excluded).
    pub fn calls(&self) -> Vec<SurfaceCall> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| **c != SurfaceCall::Screenshot)
            .cloned()
            .collect()
    }

    pub fn screenshots(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| **c == SurfaceCall::Screenshot)
            .count()
    }

    fn record(&self, call: SurfaceCall) -> PilotResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.disconnected {
            return Err(PilotError::SurfaceDisconnected("mock page closed".into()));
        }
        if state.fail_clicks && matches!(call, SurfaceCall::Click(_)) {
            return Err(PilotError::Surface("click was swallowed".into()));
        }
        state.calls.push(call);
        Ok(())
    }
}

#[async_trait]
impl Surface for MockSurface {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    async fn screenshot(&self) -> PilotResult<Vec<u8>> {
        self.record(SurfaceCall::Screenshot)?;
        let state = self.state.lock().unwrap();
        if state.fail_screenshots {
            return Err(PilotError::Surface("screenshot timed out".into()));
        }
        Ok(state.frame.clone())
    }

    async fn pointer_move(&self, at: DevicePoint) -> PilotResult<()> {
        self.record(SurfaceCall::Move(at))
    }

    async fn pointer_click(&self, at: DevicePoint) -> PilotResult<()> {
        self.record(SurfaceCall::Click(at))
    }

    async fn type_char(&self, c: char) -> PilotResult<()> {
        self.record(SurfaceCall::Char(c))
    }

    async fn key_press(&self, key: &str) -> PilotResult<()> {
        self.record(SurfaceCall::Key(key.to_string()))
    }

    async fn scroll_wheel(&self, dx: i32, dy: i32) -> PilotResult<()> {
        self.record(SurfaceCall::Scroll(dx, dy))
    }
}

enum Fallback {
    Respond(ActionResponse),
    Fail(fn() -> PilotError),
}

type Hook = Box<dyn Fn(u32, &InferenceRequest) + Send + Sync>;

/// Transport replaying a fixed script, then a fallback forever.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<PilotResult<ActionResponse>>>,
    fallback: Fallback,
    calls: AtomicU32,
    requests: Mutex<Vec<InferenceRequest>>,
    hook: Option<Hook>,
}

impl ScriptedTransport {
    /// Replays `script`; once it runs out, keeps failing with a timeout.
    pub fn new(script: Vec<PilotResult<ActionResponse>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Fallback::Fail(|| PilotError::Inference("script exhausted".into())),
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
            hook: None,
        }
    }

    pub fn failing(error: fn() -> PilotError) -> Self {
        Self {
            fallback: Fallback::Fail(error),
            ..Self::new(Vec::new())
        }
    }

    pub fn repeating(response: ActionResponse) -> Self {
        Self {
            fallback: Fallback::Respond(response),
            ..Self::new(Vec::new())
        }
    }

    /// Run `hook` with the 1-based call number before answering.
    pub fn with_hook(mut self, hook: impl Fn(u32, &InferenceRequest) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceTransport for ScriptedTransport {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn infer(&self, request: &InferenceRequest) -> PilotResult<ActionResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());
        if let Some(hook) = &self.hook {
            hook(n, request);
        }
        if let Some(next) = self.script.lock().unwrap().pop_front() {
            return next;
        }
        match &self.fallback {
            Fallback::Respond(r) => Ok(r.clone()),
            Fallback::Fail(make) => Err(make()),
        }
    }
}
