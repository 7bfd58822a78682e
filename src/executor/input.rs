// Input capability set of a controlled surface.
use async_trait::async_trait;

use crate::errors::PilotResult;
use crate::perception::types::{DevicePoint, Viewport};

/// Minimal driver the orchestrator needs: look at the page and send input.
///
/// All coordinates are device pixels of [`Surface::viewport`].
#[async_trait]
pub trait Surface: Send + Sync {
    /// Current live size of the drawable area.
    fn viewport(&self) -> Viewport;

    /// Raw encoded frame (PNG or JPEG) of the current page.
    async fn screenshot(&self) -> PilotResult<Vec<u8>>;

    async fn pointer_move(&self, at: DevicePoint) -> PilotResult<()>;

    async fn pointer_click(&self, at: DevicePoint) -> PilotResult<()>;

    /// Type one character through the keyboard path (IME-aware where the
    /// driver supports it).
    async fn type_char(&self, c: char) -> PilotResult<()>;

    async fn key_press(&self, key: &str) -> PilotResult<()>;

    async fn scroll_wheel(&self, dx: i32, dy: i32) -> PilotResult<()>;
}
