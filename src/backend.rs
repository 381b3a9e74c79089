//! Vision backend abstraction and the Gemini REST implementation.
//!
//! The extraction pipeline treats backends as an ordered fallback chain: a
//! transient failure on one advances the chain cursor and the same page is
//! retried against the next. That only works if the pipeline can see *why*
//! a call ended — in particular whether a candidate was blocked for
//! recitation, which must map to the empty-questions fallback rather than a
//! retry. The [`VisionBackend`] trait therefore exposes raw candidates with
//! their finish reasons instead of a pre-digested string.
//!
//! Tests implement the trait with scripted in-memory backends; production
//! uses [`GeminiBackend`] over the `generateContent` REST endpoint.

use crate::pipeline::encode::ImagePayload;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Why a candidate stopped generating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    /// Normal completion.
    Stop,
    /// Output blocked because it reproduced copyrighted training material.
    /// The pipeline substitutes the empty-questions payload for these.
    Recitation,
    /// Any other reason reported by the service (length, safety, ...).
    Other(String),
}

impl FinishReason {
    fn parse(raw: &str) -> Self {
        match raw {
            "STOP" => FinishReason::Stop,
            "RECITATION" => FinishReason::Recitation,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

/// One generation candidate returned by a backend.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub text: String,
    pub finish_reason: FinishReason,
}

/// A backend response: zero or more candidates.
///
/// Zero candidates is a legal (if unhelpful) answer, not an error — the
/// extraction pipeline records the empty-questions fallback for such pages.
#[derive(Debug, Clone, Default)]
pub struct GenerateResponse {
    pub candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// The first candidate's text, unless it was blocked for recitation.
    pub fn usable_text(&self) -> Option<&str> {
        match self.candidates.first() {
            Some(c) if c.finish_reason != FinishReason::Recitation => Some(&c.text),
            _ => None,
        }
    }
}

/// A transient backend failure. Consumed by the chain cursor, never
/// surfaced to callers directly.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),
}

/// A configured endpoint of the external vision-LLM service.
///
/// One trait method covers both call shapes: per-page extraction sends a
/// prompt plus a page image; syllabus structuring sends text only.
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Identifier used in logs and error messages.
    fn name(&self) -> &str;

    /// Submit a prompt (and optionally one page image) for generation.
    async fn generate(
        &self,
        prompt: &str,
        image: Option<&ImagePayload>,
    ) -> Result<GenerateResponse, BackendError>;
}

// ── Gemini REST implementation ────────────────────────────────────────────

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Vision backend calling the Gemini `generateContent` REST endpoint.
pub struct GeminiBackend {
    model: String,
    api_key: String,
    client: reqwest::Client,
    base_url: String,
    temperature: f32,
    max_output_tokens: usize,
}

impl GeminiBackend {
    pub fn new(
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout_secs: u64,
        temperature: f32,
        max_output_tokens: usize,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self {
            model: model.into(),
            api_key: api_key.into(),
            client,
            base_url: GEMINI_BASE_URL.to_string(),
            temperature,
            max_output_tokens,
        })
    }

    /// Point the backend at a different host. Used by tests against a stub
    /// server and by callers fronting Gemini with a proxy.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
}

#[derive(Deserialize)]
struct ApiCandidate {
    content: Option<ApiContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiContent {
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Deserialize)]
struct ApiPart {
    #[serde(default)]
    text: String,
}

#[async_trait]
impl VisionBackend for GeminiBackend {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        prompt: &str,
        image: Option<&ImagePayload>,
    ) -> Result<GenerateResponse, BackendError> {
        let mut parts = vec![json!({ "text": prompt })];
        if let Some(img) = image {
            parts.push(json!({
                "inline_data": {
                    "mime_type": img.mime_type,
                    "data": img.data,
                }
            }));
        }

        let body = json!({
            "contents": [{ "parts": parts }],
            "generationConfig": {
                "temperature": self.temperature,
                "maxOutputTokens": self.max_output_tokens,
            }
        });

        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        debug!(model = %self.model, has_image = image.is_some(), "submitting generateContent");

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let api: ApiResponse = response
            .json()
            .await
            .map_err(|e| BackendError::MalformedResponse(e.to_string()))?;

        let candidates = api
            .candidates
            .into_iter()
            .map(|c| {
                let text = c
                    .content
                    .map(|content| {
                        content
                            .parts
                            .into_iter()
                            .map(|p| p.text)
                            .collect::<Vec<_>>()
                            .join("")
                    })
                    .unwrap_or_default();
                Candidate {
                    text,
                    finish_reason: c
                        .finish_reason
                        .as_deref()
                        .map(FinishReason::parse)
                        .unwrap_or(FinishReason::Stop),
                }
            })
            .collect();

        Ok(GenerateResponse { candidates })
    }
}
