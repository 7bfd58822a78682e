// Frame capture, normalisation and transport sizing.
use std::io::Cursor;

use crate::config::ScreenshotConfig;
use crate::errors::{PilotError, PilotResult};
use crate::executor::input::Surface;
use crate::perception::cache::FrameCache;
use crate::perception::types::{FrameFormat, ScreenshotResult, Viewport};

pub struct ScreenshotProvider {
    target: Viewport,
    format: FrameFormat,
    jpeg_quality: u8,
    cache: FrameCache,
}

impl ScreenshotProvider {
    pub fn new(target: Viewport, format: FrameFormat, jpeg_quality: u8, cache_capacity: usize) -> Self {
        Self {
            target,
            format,
            jpeg_quality: jpeg_quality.clamp(1, 100),
            cache: FrameCache::new(cache_capacity),
        }
    }

    pub fn from_config(cfg: &ScreenshotConfig) -> Self {
        Self::new(
            Viewport::new(cfg.width, cfg.height),
            FrameFormat::parse(&cfg.format),
            cfg.jpeg_quality,
            cfg.cache_capacity,
        )
    }

    /// Grab the current frame of `surface`.
    ///
    /// Never fails: any capture or encode problem yields an empty frame with
    /// the declared dimensions.
    pub async fn capture(&self, surface: &dyn Surface) -> ScreenshotResult {
        match self.try_capture(surface).await {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "screenshot capture failed, using placeholder");
                ScreenshotResult::placeholder(self.target, self.format)
            }
        }
    }

    async fn try_capture(&self, surface: &dyn Surface) -> PilotResult<ScreenshotResult> {
        let raw = surface.screenshot().await?;
        if raw.is_empty() {
            return Err(PilotError::Perception("surface returned an empty frame".into()));
        }
        let target = self.target;
        let format = self.format;
        let quality = self.jpeg_quality;
        let data = tokio::task::spawn_blocking(move || normalise_frame(&raw, target, format, quality))
            .await
            .map_err(|e| PilotError::Perception(format!("join: {e}")))??;

        tracing::debug!(
            bytes = data.len(),
            width = target.width,
            height = target.height,
            "frame captured"
        );
        Ok(ScreenshotResult {
            data,
            width: target.width,
            height: target.height,
            format,
            timestamp: chrono::Utc::now(),
        })
    }

    pub fn cache(&mut self, key: impl Into<String>, frame: ScreenshotResult) {
        self.cache.cache(key, frame);
    }

    pub fn get(&self, key: &str) -> Option<&ScreenshotResult> {
        self.cache.get(key)
    }

    pub fn evict_expired(&mut self, max_age: std::time::Duration) -> usize {
        self.cache.evict_expired(max_age)
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

/// Decode, resize to `target` if needed, and re-encode as `format`.
fn normalise_frame(raw: &[u8], target: Viewport, format: FrameFormat, quality: u8) -> PilotResult<Vec<u8>> {
    let img = image::load_from_memory(raw)?;
    let img = if img.width() != target.width || img.height() != target.height {
        img.resize_exact(target.width, target.height, image::imageops::FilterType::Triangle)
    } else {
        img
    };

    let mut out = Vec::new();
    match format {
        FrameFormat::Png => {
            img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)?;
        }
        FrameFormat::Jpeg => {
            let rgb = img.to_rgb8();
            let mut encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
            encoder.encode_image(&rgb)?;
        }
    }
    Ok(out)
}

/// Bytes the frame occupies once base64-encoded for the request body.
pub fn estimate_size(frame: &ScreenshotResult) -> usize {
    frame.data.len().div_ceil(3) * 4
}

pub fn is_oversized(frame: &ScreenshotResult, max_bytes: usize) -> bool {
    estimate_size(frame) > max_bytes
}
