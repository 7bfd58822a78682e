use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{PilotError, PilotResult};

/// Environment variable overriding `inference.api_key`.
pub const API_KEY_ENV: &str = "JOBPILOT_API_KEY";
/// Environment variable overriding `inference.api_base`.
pub const API_BASE_ENV: &str = "JOBPILOT_API_BASE";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub screenshot: ScreenshotConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
}

/// Run-level limits and pacing. Fixed for the lifetime of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Address the controlled surface is pointed at before the first step.
    pub base_url: String,
    pub max_steps: u32,
    pub max_run_time_secs: u64,
    pub step_delay_ms: u64,
    /// Number of past steps sent with every inference request.
    pub history_window: usize,
    /// "pc" or "mobile".
    pub device_type: String,
    /// Frames whose transport size exceeds this are not sent to the service.
    pub max_frame_bytes: usize,
    pub max_consecutive_failures: u32,
    /// JSONL transcript directory. `"default"` uses the platform data dir.
    pub transcript_dir: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.zhipin.com".into(),
            max_steps: 50,
            max_run_time_secs: 600,
            step_delay_ms: 1500,
            history_window: 10,
            device_type: "pc".into(),
            max_frame_bytes: 4_000_000,
            max_consecutive_failures: 5,
            transcript_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    pub width: u32,
    pub height: u32,
    /// "png" or "jpeg".
    pub format: String,
    pub jpeg_quality: u8,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
            format: "jpeg".into(),
            jpeg_quality: 80,
            cache_capacity: 5,
            cache_ttl_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Pixels kept clear of every viewport edge when clicking.
    pub clamp_margin: i32,
    /// Intermediate pointer positions between the cursor and a click target.
    pub path_steps: usize,
    pub move_interval_ms: u64,
    pub typing_min_delay_ms: u64,
    pub typing_max_delay_ms: u64,
    /// Wheel delta for one scroll "notch".
    pub scroll_step_px: i32,
    pub headless: bool,
    /// Seed for pointer jitter and typing delays; random when absent.
    pub rng_seed: Option<u64>,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            viewport_width: 1280,
            viewport_height: 800,
            clamp_margin: 5,
            path_steps: 12,
            move_interval_ms: 8,
            typing_min_delay_ms: 40,
            typing_max_delay_ms: 120,
            scroll_step_px: 120,
            headless: false,
            rng_seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Endpoint of the vision-to-action service. Empty means simulation mode.
    pub api_base: String,
    pub model: String,
    /// Bearer credential (falls back to env var `JOBPILOT_API_KEY`).
    pub api_key: Option<String>,
    pub request_timeout_secs: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            model: "autoglm-phone".into(),
            api_key: None,
            request_timeout_secs: 30,
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}

impl InferenceConfig {
    /// Both an endpoint and a credential are needed for live calls.
    pub fn is_live(&self) -> bool {
        !self.api_base.trim().is_empty()
            && self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

impl AppConfig {
    /// Apply `JOBPILOT_*` environment overrides on top of the file values.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                self.inference.api_key = Some(key);
            }
        }
        if let Ok(base) = std::env::var(API_BASE_ENV) {
            if !base.trim().is_empty() {
                self.inference.api_base = base;
            }
        }
    }

    pub fn validate(&self) -> PilotResult<()> {
        if self.screenshot.width == 0 || self.screenshot.height == 0 {
            return Err(PilotError::Config("screenshot dimensions must be non-zero".into()));
        }
        if self.surface.viewport_width == 0 || self.surface.viewport_height == 0 {
            return Err(PilotError::Config("viewport dimensions must be non-zero".into()));
        }
        if self.surface.typing_min_delay_ms > self.surface.typing_max_delay_ms {
            return Err(PilotError::Config(
                "typing_min_delay_ms must not exceed typing_max_delay_ms".into(),
            ));
        }
        if !matches!(self.agent.device_type.as_str(), "pc" | "mobile") {
            return Err(PilotError::Config(format!(
                "unknown device_type '{}'",
                self.agent.device_type
            )));
        }
        Ok(())
    }
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Some(candidate);
            }
        }
    }

    let candidate = std::env::current_dir().ok()?.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Some(candidate);
    }
    None
}

/// Load `config.toml` from the usual places, falling back to defaults when
/// no file exists. Environment overrides are applied either way.
pub fn load_config() -> PilotResult<AppConfig> {
    let mut config = match resolve_config_path() {
        Some(path) => load_config_from(&path)?,
        None => {
            tracing::info!("no config.toml found, using defaults");
            AppConfig::default()
        }
    };
    config.apply_env();
    config.validate()?;
    Ok(config)
}

pub fn load_config_from(path: &Path) -> PilotResult<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    tracing::info!(
        path = %path.display(),
        live = config.inference.is_live(),
        "config loaded"
    );
    Ok(config)
}

pub fn save_config(config: &AppConfig, path: &Path) -> PilotResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
