//! Model gateway: the `ModelGateway` seam plus a minimal Gemini client.
//!
//! We only call `models/{model}:generateContent`, optionally with an inline
//! image and a response schema. One request per call, no retries, no cache.
//! Calls are instrumented and log model name, latency, token usage and
//! response sizes (not contents).
//!
//! NOTE: We never log the API key; it travels only in the `x-goog-api-key` header.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument, warn};

use crate::config::GatewayConfig;
use crate::domain::ImageInput;
use crate::error::{Result, TutorError};

/// One structured request to the hosted model.
#[derive(Clone, Debug, Default)]
pub struct GenerateRequest {
  pub system_instruction: Option<String>,
  pub prompt: String,
  pub image: Option<ImageInput>,
  /// JSON-schema constraint; when set the reply is requested as `application/json`.
  pub schema: Option<Value>,
  pub temperature: Option<f32>,
}

/// Single entry point to the language model. Returns the raw text payload,
/// which callers must treat as untrusted.
#[async_trait]
pub trait ModelGateway: Send + Sync {
  async fn generate(&self, request: GenerateRequest) -> Result<String>;
}

/// Finish reasons that mean the service withheld the answer.
const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "RECITATION", "BLOCKLIST", "PROHIBITED_CONTENT", "SPII"];

#[derive(Clone)]
pub struct GeminiClient {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
}

impl GeminiClient {
  pub fn new(cfg: &GatewayConfig) -> Result<Self> {
    let mut builder = reqwest::Client::builder();
    if let Some(t) = cfg.timeout {
      builder = builder.timeout(t);
    }
    let client = builder
      .build()
      .map_err(|e| TutorError::TransportError(format!("failed to build HTTP client: {e}")))?;

    Ok(Self {
      client,
      api_key: cfg.api_key.clone(),
      base_url: cfg.base_url.trim_end_matches('/').to_string(),
      model: cfg.model.clone(),
    })
  }

  pub fn has_key(&self) -> bool {
    !self.api_key.is_empty()
  }

  fn endpoint(&self) -> String {
    format!("{}/models/{}:generateContent", self.base_url, self.model)
  }
}

#[async_trait]
impl ModelGateway for GeminiClient {
  #[instrument(
    level = "info",
    skip(self, request),
    fields(
      model = %self.model,
      prompt_len = request.prompt.len(),
      has_image = request.image.is_some(),
      has_schema = request.schema.is_some()
    )
  )]
  async fn generate(&self, request: GenerateRequest) -> Result<String> {
    if self.api_key.is_empty() {
      error!(target: "etutor_backend", "GEMINI_API_KEY not set; refusing to call the model");
      return Err(TutorError::AuthError("no API key configured".into()));
    }

    let body = GenerateContentRequest::from(request);
    let start = Instant::now();
    let res = self
      .client
      .post(self.endpoint())
      .header(USER_AGENT, "etutor-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(&body)
      .send()
      .await
      .map_err(|e| {
        error!(target: "etutor_backend", elapsed = ?start.elapsed(), error = %e, "Gemini request failed");
        TutorError::TransportError(e.to_string())
      })?;

    let status = res.status();
    if !status.is_success() {
      let body = res.text().await.unwrap_or_default();
      let err = classify_http_error(status, &body);
      error!(target: "etutor_backend", elapsed = ?start.elapsed(), %status, kind = err.kind(), "Gemini returned an error status");
      return Err(err);
    }

    let bytes = res
      .bytes()
      .await
      .map_err(|e| TutorError::TransportError(format!("failed to read response body: {e}")))?;
    let reply: GenerateContentResponse = serde_json::from_slice(&bytes)
      .map_err(|e| TutorError::TransportError(format!("unexpected response envelope: {e}")))?;

    if let Some(usage) = &reply.usage_metadata {
      info!(
        prompt_tokens = ?usage.prompt_token_count,
        completion_tokens = ?usage.candidates_token_count,
        total_tokens = ?usage.total_token_count,
        "Gemini usage"
      );
    }

    let text = extract_text(reply)?;
    info!(elapsed = ?start.elapsed(), response_bytes = bytes.len(), text_len = text.len(), "Gemini response received");
    Ok(text)
  }
}

/// Pull the text out of the first candidate, or explain why there is none.
fn extract_text(reply: GenerateContentResponse) -> Result<String> {
  if let Some(reason) = reply.prompt_feedback.and_then(|f| f.block_reason) {
    warn!(target: "etutor_backend", %reason, "Prompt blocked by the model service");
    return Err(TutorError::ModelRefusal(format!("prompt blocked ({reason})")));
  }

  let candidate = reply
    .candidates
    .into_iter()
    .next()
    .ok_or_else(|| TutorError::ModelRefusal("no candidates returned".into()))?;

  if let Some(reason) = candidate.finish_reason.as_deref() {
    if BLOCKING_FINISH_REASONS.contains(&reason) {
      warn!(target: "etutor_backend", %reason, "Candidate withheld by the model service");
      return Err(TutorError::ModelRefusal(format!("answer withheld ({reason})")));
    }
  }

  let text: String = candidate
    .content
    .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
    .unwrap_or_default();

  if text.trim().is_empty() {
    return Err(TutorError::ModelRefusal("empty answer".into()));
  }
  Ok(text)
}

/// Map a non-2xx status (plus Gemini's error body) to our taxonomy.
fn classify_http_error(status: StatusCode, body: &str) -> TutorError {
  let msg = extract_gemini_error(body).unwrap_or_else(|| body.chars().take(200).collect());
  let detail = format!("Gemini HTTP {}: {}", status, msg);

  let key_problem = msg.to_ascii_lowercase().contains("api key") || body.contains("API_KEY_INVALID");
  match status {
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TutorError::AuthError(detail),
    StatusCode::BAD_REQUEST if key_problem => TutorError::AuthError(detail),
    _ => TutorError::TransportError(detail),
  }
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

// --- generateContent DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
  contents: Vec<Content>,
  #[serde(skip_serializing_if = "Option::is_none")]
  system_instruction: Option<Content>,
  #[serde(skip_serializing_if = "Option::is_none")]
  generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Deserialize)]
struct Content {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  role: Option<String>,
  #[serde(default)]
  parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  text: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  inline_data: Option<InlineData>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
  mime_type: String,
  data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  #[serde(skip_serializing_if = "Option::is_none")]
  temperature: Option<f32>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_mime_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_schema: Option<Value>,
}

impl From<GenerateRequest> for GenerateContentRequest {
  fn from(r: GenerateRequest) -> Self {
    let mut parts = vec![Part { text: Some(r.prompt), inline_data: None }];
    if let Some(img) = &r.image {
      parts.push(Part {
        text: None,
        inline_data: Some(InlineData { mime_type: img.mime_type.clone(), data: img.to_base64() }),
      });
    }

    let generation_config = if r.schema.is_some() || r.temperature.is_some() {
      Some(GenerationConfig {
        temperature: r.temperature,
        response_mime_type: r.schema.as_ref().map(|_| "application/json".to_string()),
        response_schema: r.schema,
      })
    } else {
      None
    };

    Self {
      contents: vec![Content { role: Some("user".into()), parts }],
      system_instruction: r
        .system_instruction
        .map(|s| Content { role: None, parts: vec![Part { text: Some(s), inline_data: None }] }),
      generation_config,
    }
  }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)]
  candidates: Vec<Candidate>,
  #[serde(default)]
  prompt_feedback: Option<PromptFeedback>,
  #[serde(default)]
  usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
  #[serde(default)]
  content: Option<Content>,
  #[serde(default)]
  finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
  #[serde(default)]
  block_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}
