use async_trait::async_trait;

use crate::errors::PilotResult;
use crate::llm::types::{ActionResponse, InferenceRequest};

/// One round trip to a vision-to-action service.
///
/// Implementations report transport and protocol failures as errors; the
/// client decides whether to retry or fall back to simulation.
#[async_trait]
pub trait InferenceTransport: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    async fn infer(&self, request: &InferenceRequest) -> PilotResult<ActionResponse>;

    /// Cheap credential check. Defaults to "configured means valid".
    async fn probe(&self) -> PilotResult<bool> {
        Ok(true)
    }
}
