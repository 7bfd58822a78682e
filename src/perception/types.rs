use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Upper bound of the logical grid the inference service answers in.
pub const RELATIVE_MAX: i32 = 1000;

/// Pixel size of a drawable area (live viewport or captured frame).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn contains(&self, p: DevicePoint) -> bool {
        p.x >= 0 && p.y >= 0 && p.x <= self.width as i32 && p.y <= self.height as i32
    }
}

/// Point on the service's 0..=1000 grid, independent of resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelativePoint {
    pub x: i32,
    pub y: i32,
}

impl RelativePoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Point in device pixels of some [`Viewport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePoint {
    pub x: i32,
    pub y: i32,
}

impl DevicePoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameFormat {
    Png,
    Jpeg,
}

impl FrameFormat {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => FrameFormat::Png,
            _ => FrameFormat::Jpeg,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            FrameFormat::Png => "image/png",
            FrameFormat::Jpeg => "image/jpeg",
        }
    }
}

/// One captured frame, encoded and ready for transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotResult {
    #[serde(skip)]
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ScreenshotResult {
    /// Placeholder returned when capture fails: no data, declared size kept.
    pub fn placeholder(viewport: Viewport, format: FrameFormat) -> Self {
        Self {
            data: Vec::new(),
            width: viewport.width,
            height: viewport.height,
            format,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width, self.height)
    }

    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.format.mime(), self.to_base64())
    }
}
