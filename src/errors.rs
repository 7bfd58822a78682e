use thiserror::Error;

#[derive(Debug, Error)]
pub enum PilotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Inference service error: {0}")]
    Inference(String),

    #[error("Inference service returned {status}: {body}")]
    InferenceStatus {
        status: u16,
        body: String,
        /// Server-suggested wait before the next attempt, if any.
        retry_after_ms: Option<u64>,
    },

    #[error("Response parsing error: {0}")]
    Parse(String),

    #[error("Perception error: {0}")]
    Perception(String),

    #[error("Surface error: {0}")]
    Surface(String),

    #[error("Surface disconnected: {0}")]
    SurfaceDisconnected(String),

    #[error("Action error: {0}")]
    Action(String),

    #[error("Run exceeded its time budget ({elapsed_ms}ms of {budget_ms}ms)")]
    Timeout { elapsed_ms: u64, budget_ms: u64 },

    #[error("Too many consecutive failed steps ({0})")]
    TooManyFailures(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl PilotError {
    /// Fatal errors end the run in the `failed` state; everything else is
    /// reported and the loop moves on to the next step.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PilotError::SurfaceDisconnected(_)
                | PilotError::Timeout { .. }
                | PilotError::TooManyFailures(_)
        )
    }

    /// Whether another attempt against the inference service may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            PilotError::InferenceStatus { status, .. } => {
                !matches!(status, 400 | 401 | 403 | 404 | 422)
            }
            PilotError::Http(e) => !e.is_builder(),
            PilotError::Config(_) => false,
            _ => true,
        }
    }
}

impl serde::Serialize for PilotError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

pub type PilotResult<T> = Result<T, PilotError>;
