//! Model gateway: the single point of entry for all generative-model calls.
//!
//! ARCHITECTURAL RULE: No other module may call the Generative Language API directly.
//! Everything goes through `CompletionGateway`, so handlers and tests can swap the backend.
//!
//! Every call uses the same convention: `complete(prompt, payload, context)`, sent to the
//! model as parts in the order context, document, prompt.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::document::{EncodedPayload, PayloadMime};

const BASE_BACKOFF: Duration = Duration::from_millis(1000);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Model service unavailable: {0}")]
    Unavailable(String),

    #[error("Model service timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    #[error("Model returned no text")]
    EmptyResponse,
}

/// Plain prose returned by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ModelResponse(String);

impl ModelResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    #[cfg(test)]
    pub fn text(&self) -> &str {
        &self.0
    }

    pub fn into_text(self) -> String {
        self.0
    }
}

/// The completion capability. Carried in `AppState` as `Arc<dyn CompletionGateway>`.
#[async_trait]
pub trait CompletionGateway: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        payload: Option<&EncodedPayload>,
        context: &str,
    ) -> Result<ModelResponse, GatewayError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if it has any non-blank text.
    fn text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let text: String = candidate
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }
}

fn build_parts<'a>(
    prompt: &'a str,
    payload: Option<&'a EncodedPayload>,
    context: &'a str,
) -> Vec<RequestPart<'a>> {
    let mut parts = Vec::with_capacity(3);
    // Empty text parts are rejected by the API.
    if !context.trim().is_empty() {
        parts.push(RequestPart::Text { text: context });
    }
    if let Some(payload) = payload {
        parts.push(match payload.mime_type() {
            PayloadMime::ImageJpeg => RequestPart::InlineData {
                inline_data: InlineData {
                    mime_type: payload.mime_type().as_str(),
                    data: payload.data(),
                },
            },
            PayloadMime::TextPlain => RequestPart::Text {
                text: payload.data(),
            },
        });
    }
    parts.push(RequestPart::Text { text: prompt });
    parts
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// Gemini `generateContent` client with per-attempt timeout and exponential backoff.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    timeout: Duration,
    max_attempts: u32,
    backoff: Duration,
}

impl GeminiClient {
    pub fn new(config: &Config, client: Client) -> Self {
        Self {
            client,
            api_key: config.google_api_key.clone(),
            endpoint: config.gemini_endpoint.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            timeout: config.llm_timeout,
            max_attempts: config.llm_max_retries,
            backoff: BASE_BACKOFF,
        }
    }

    /// Overrides the first backoff delay (doubles per retry).
    #[cfg(test)]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    /// One HTTP round trip. Failures are tagged retryable or fatal for the loop in `complete`.
    async fn attempt(
        &self,
        body: &GenerateContentRequest<'_>,
    ) -> Result<GenerateContentResponse, Attempt> {
        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Attempt::Retry(GatewayError::Unavailable(e.to_string())))?;

        let status = response.status();

        if status.as_u16() == 429 || status.is_server_error() {
            let body = response.text().await.unwrap_or_default();
            warn!("Model API returned {}: {}", status, body);
            return Err(Attempt::Retry(GatewayError::Unavailable(format!(
                "status {status}"
            ))));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(Attempt::Fatal(GatewayError::Unavailable(format!(
                "status {}: {message}",
                status.as_u16()
            ))));
        }

        response
            .json::<GenerateContentResponse>()
            .await
            .map_err(|e| Attempt::Fatal(GatewayError::Unavailable(format!("invalid response: {e}"))))
    }
}

/// Delay before retry number `retry` (1-based): `base * 2^(retry-1)`, capped at 30s.
fn backoff_delay(base: Duration, retry: u32) -> Duration {
    let factor = 1u32.checked_shl(retry.saturating_sub(1)).unwrap_or(u32::MAX);
    base.saturating_mul(factor).min(MAX_BACKOFF)
}

enum Attempt {
    Retry(GatewayError),
    Fatal(GatewayError),
}

#[async_trait]
impl CompletionGateway for GeminiClient {
    /// Retries on transport errors, timeouts, 429 and 5xx with backoff 1s, 2s, 4s, ...
    async fn complete(
        &self,
        prompt: &str,
        payload: Option<&EncodedPayload>,
        context: &str,
    ) -> Result<ModelResponse, GatewayError> {
        let body = GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: build_parts(prompt, payload, context),
            }],
        };

        let mut last_error: Option<GatewayError> = None;

        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = backoff_delay(self.backoff, attempt);
                warn!(
                    "Model call attempt {} failed, retrying after {}ms...",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let started = std::time::Instant::now();
            let parsed = match tokio::time::timeout(self.timeout, self.attempt(&body)).await {
                Err(_) => {
                    warn!("Model call timed out after {}ms", self.timeout.as_millis());
                    last_error = Some(GatewayError::Timeout {
                        attempts: attempt + 1,
                    });
                    continue;
                }
                Ok(Err(Attempt::Retry(e))) => {
                    last_error = Some(e);
                    continue;
                }
                Ok(Err(Attempt::Fatal(e))) => return Err(e),
                Ok(Ok(parsed)) => parsed,
            };

            if let Some(usage) = &parsed.usage_metadata {
                debug!(
                    "Model call succeeded in {}ms: prompt_tokens={:?}, output_tokens={:?}",
                    started.elapsed().as_millis(),
                    usage.prompt_token_count,
                    usage.candidates_token_count
                );
            }

            return match parsed.text() {
                Some(text) => {
                    info!("Model returned {} chars", text.len());
                    Ok(ModelResponse::new(text))
                }
                None => {
                    let block = parsed
                        .prompt_feedback
                        .as_ref()
                        .and_then(|f| f.block_reason.as_deref());
                    let finish = parsed
                        .candidates
                        .first()
                        .and_then(|c| c.finish_reason.as_deref());
                    warn!("Model returned no text (block_reason={block:?}, finish_reason={finish:?})");
                    Err(GatewayError::EmptyResponse)
                }
            };
        }

        Err(match last_error {
            Some(GatewayError::Timeout { .. }) => GatewayError::Timeout {
                attempts: self.max_attempts,
            },
            Some(e) => e,
            None => GatewayError::Unavailable("no attempts were made".to_string()),
        })
    }
}
