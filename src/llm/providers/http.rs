use std::time::Duration;

use async_trait::async_trait;

use crate::config::InferenceConfig;
use crate::errors::{PilotError, PilotResult};
use crate::llm::parse;
use crate::llm::provider::InferenceTransport;
use crate::llm::types::{ActionResponse, InferenceRequest};

/// JSON-over-HTTPS transport with bearer authentication.
pub struct HttpTransport {
    api_base: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(api_base: String, api_key: String, model: String, timeout: Duration) -> PilotResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_base,
            api_key,
            model,
            client,
        })
    }

    /// Build a transport when the config has both endpoint and credential.
    pub fn from_config(cfg: &InferenceConfig) -> PilotResult<Option<Self>> {
        if !cfg.is_live() {
            return Ok(None);
        }
        let transport = Self::new(
            cfg.api_base.clone(),
            cfg.api_key.clone().unwrap_or_default(),
            cfg.model.clone(),
            Duration::from_secs(cfg.request_timeout_secs.max(1)),
        )?;
        Ok(Some(transport))
    }
}

/// Milliseconds from a `Retry-After` header, if it is a plain integer of
/// seconds.
fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|secs| secs.saturating_mul(1000))
}

fn status_error(
    status: reqwest::StatusCode,
    headers: &reqwest::header::HeaderMap,
    body: &str,
) -> PilotError {
    PilotError::InferenceStatus {
        status: status.as_u16(),
        body: body.chars().take(500).collect(),
        retry_after_ms: retry_after(headers),
    }
}

#[async_trait]
impl InferenceTransport for HttpTransport {
    fn name(&self) -> &str {
        &self.api_base
    }

    async fn infer(&self, request: &InferenceRequest) -> PilotResult<ActionResponse> {
        let mut body = serde_json::to_value(request)?;
        if !self.model.is_empty() {
            body["model"] = serde_json::json!(self.model);
        }

        tracing::debug!(
            endpoint = %self.api_base,
            model = %self.model,
            history = request.history.len(),
            image_bytes = request.image.len(),
            "sending inference request"
        );
        tracing::trace!(
            body = %{
                // The real request keeps the frame; only the log copy drops it.
                let mut log_body = body.clone();
                if log_body["image"].as_str().is_some_and(|s| !s.is_empty()) {
                    log_body["image"] = serde_json::json!("<omitted_base64_image>");
                }
                log_body
            },
            "request body (image omitted)"
        );

        let response = self
            .client
            .post(&self.api_base)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let err_body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &headers, &err_body));
        }

        let text = response.text().await?;
        let parsed = parse::parse_body(&text)?;
        tracing::info!(
            action = ?parsed.action.kind(),
            thought_len = parsed.thought.len(),
            "inference response received"
        );
        Ok(parsed)
    }

    async fn probe(&self) -> PilotResult<bool> {
        let response = self
            .client
            .get(&self.api_base)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let status = response.status().as_u16();
        tracing::debug!(status, "credential probe answered");
        Ok(!matches!(status, 401 | 403))
    }
}
