use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::config::InferenceConfig;
use crate::errors::PilotResult;
use crate::llm::provider::InferenceTransport;
use crate::llm::providers::http::HttpTransport;
use crate::llm::retry::RetryPolicy;
use crate::llm::simulate::simulate;
use crate::llm::types::{ActionResponse, InferenceRequest};

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Front door to the inference service. `send` never fails: exhausted or
/// missing service degrades to the simulated response.
pub struct InferenceClient {
    transport: Option<Arc<dyn InferenceTransport>>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl InferenceClient {
    pub fn new(
        transport: Option<Arc<dyn InferenceTransport>>,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        if transport.is_none() {
            tracing::info!("no inference endpoint configured, running in simulation mode");
        }
        Self {
            transport,
            retry,
            clock,
        }
    }

    /// Client in permanent simulation mode.
    pub fn simulated(clock: Arc<dyn Clock>) -> Self {
        Self::new(None, RetryPolicy::default(), clock)
    }

    pub fn from_config(cfg: &InferenceConfig, clock: Arc<dyn Clock>) -> PilotResult<Self> {
        let transport = HttpTransport::from_config(cfg)?
            .map(|t| Arc::new(t) as Arc<dyn InferenceTransport>);
        Ok(Self::new(transport, RetryPolicy::from_config(cfg), clock))
    }

    pub fn is_simulated(&self) -> bool {
        self.transport.is_none()
    }

    pub async fn send(&self, request: &InferenceRequest) -> ActionResponse {
        let Some(transport) = &self.transport else {
            return simulate(&request.instruction);
        };

        let max_attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            match transport.infer(request).await {
                Ok(response) => {
                    if attempt > 1 {
                        tracing::info!(attempt, transport = transport.name(), "inference succeeded after retry");
                    }
                    return response;
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        transport = transport.name(),
                        error = %e,
                        "inference attempt failed"
                    );
                    if !e.is_retryable() {
                        tracing::warn!(error = %e, "error is not retryable, giving up early");
                        break;
                    }
                    if attempt < max_attempts {
                        let hint = match &e {
                            crate::errors::PilotError::InferenceStatus {
                                retry_after_ms: Some(ms),
                                ..
                            } => Some(Duration::from_millis(*ms)),
                            _ => None,
                        };
                        let delay = self.retry.delay_with_hint(attempt, hint);
                        tracing::debug!(delay_ms = delay.as_millis() as u64, "backing off");
                        self.clock.sleep(delay).await;
                    }
                }
            }
        }

        tracing::warn!("inference service unavailable, falling back to simulation");
        simulate(&request.instruction)
    }

    /// Best-effort startup check of the configured credential.
    pub async fn validate_credential(&self) -> bool {
        let Some(transport) = &self.transport else {
            return false;
        };
        match tokio::time::timeout(PROBE_TIMEOUT, transport.probe()).await {
            Ok(Ok(valid)) => valid,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "credential probe failed");
                false
            }
            Err(_) => {
                tracing::warn!("credential probe timed out");
                false
            }
        }
    }
}
