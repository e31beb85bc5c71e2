//! The image model call, its response checks, and the retry loop around it.
//!
//! One call to [`GenerationClient::generate`] walks attempts `1..=max_attempts`.
//! An attempt either persists an image and returns, or fails and, if any
//! attempts remain, sleeps `retry_delay * 2^(attempt-1)` before the next one.
//! Attempts never overlap.

use std::future::Future;
use std::io::Cursor;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose;
use image::ImageFormat;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::config::ServiceConfig;
use crate::constants::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_SECS, FINISH_REASON_STOP};
use crate::error::{GenerationError, GenerationFailure};
use crate::prompt::CompiledRequest;
use crate::storage::{Artifact, ArtifactStore};

/// How many attempts to make and how long to wait between them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least one
    pub max_attempts: u32,
    /// Wait after the first failure; doubles after each one after that
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_SECS)
    }
}

impl RetryPolicy {
    /// Builds a policy; zero attempts is treated as one, negative delays as zero.
    pub fn new(max_attempts: u32, retry_delay_secs: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_delay: Duration::try_from_secs_f64(retry_delay_secs).unwrap_or_default(),
        }
    }

    /// Wait after attempt `attempt` (1-based) fails.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.retry_delay.saturating_mul(1u32 << exponent)
    }
}

/// Image parameters sent along with every request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageSettings {
    /// eg `9:16`
    pub aspect_ratio: String,
    /// eg `2K`
    pub image_size: String,
}

/// What the model is asked to do.
#[derive(Debug)]
pub struct ModelRequest<'a> {
    /// Instruction text plus attachments
    pub compiled: &'a CompiledRequest,
    /// Output parameters
    pub settings: &'a ImageSettings,
}

/// An inline binary payload on a response part.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// eg `image/png`
    #[serde(default, alias = "mime_type")]
    pub mime_type: String,
    /// Base64 payload
    #[serde(default)]
    pub data: String,
}

/// One part of a candidate's content.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    /// Text output, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Binary output, if any
    #[serde(default, alias = "inline_data", skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

/// Content of a candidate.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Content {
    /// Parts in model order
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One candidate completion.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// The generated content
    #[serde(default)]
    pub content: Option<Content>,
    /// Completion signal, `STOP` when normal
    #[serde(default, alias = "finish_reason")]
    pub finish_reason: Option<String>,
}

/// What the model returned.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ModelResponse {
    /// Zero or more candidates
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl ModelResponse {
    /// A response carrying a single image, as the model would send it.
    pub fn with_image(mime_type: &str, bytes: &[u8]) -> Self {
        Self {
            candidates: vec![Candidate {
                content: Some(Content {
                    parts: vec![Part {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: mime_type.to_string(),
                            data: general_purpose::STANDARD.encode(bytes),
                        }),
                    }],
                }),
                finish_reason: Some(FINISH_REASON_STOP.to_string()),
            }],
        }
    }

    /// Checks the completion signal and pulls out the first inline image.
    pub fn first_image(&self) -> Result<&InlineData, GenerationError> {
        let candidate = self
            .candidates
            .first()
            .ok_or_else(|| GenerationError::AbnormalCompletion("Unknown".to_string()))?;
        match candidate.finish_reason.as_deref() {
            Some(FINISH_REASON_STOP) => {}
            Some(reason) => return Err(GenerationError::AbnormalCompletion(reason.to_string())),
            None => return Err(GenerationError::AbnormalCompletion("Unknown".to_string())),
        }
        candidate
            .content
            .iter()
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.inline_data.as_ref())
            .find(|inline| !inline.data.is_empty())
            .ok_or(GenerationError::NoImage)
    }
}

/// The call the retry loop wraps.
pub trait ImageModel {
    /// Sends one request and returns the parsed response.
    fn generate_content(
        &self,
        request: &ModelRequest<'_>,
    ) -> impl Future<Output = Result<ModelResponse, GenerationError>> + Send;
}

/// Gemini `generateContent` over REST.
#[derive(Clone, Debug)]
pub struct GeminiModel {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
    timeout: Duration,
}

impl GeminiModel {
    /// A model client bound to one API key.
    pub fn new(http: reqwest::Client, api_key: &str, config: &ServiceConfig) -> Self {
        Self {
            http,
            api_key: api_key.to_string(),
            api_base: config.gemini_api_base.trim_end_matches('/').to_string(),
            model: config.gemini_model.clone(),
            timeout: config.model_timeout,
        }
    }

    /// Full URL for the configured model.
    pub fn endpoint(&self) -> String {
        let model = self.model.trim();
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{model}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    /// Request body: text first, then each attachment as inline data.
    pub fn request_body(request: &ModelRequest<'_>) -> serde_json::Value {
        let mut parts = vec![json!({ "text": request.compiled.instruction })];
        parts.extend(request.compiled.attachments.iter().map(|image| {
            json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": general_purpose::STANDARD.encode(&image.bytes),
                }
            })
        }));
        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": {
                "responseModalities": ["TEXT", "IMAGE"],
                "imageConfig": {
                    "aspectRatio": request.settings.aspect_ratio,
                    "imageSize": request.settings.image_size,
                }
            }
        })
    }
}

impl ImageModel for GeminiModel {
    async fn generate_content(
        &self,
        request: &ModelRequest<'_>,
    ) -> Result<ModelResponse, GenerationError> {
        let resp = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .timeout(self.timeout)
            .json(&Self::request_body(request))
            .send()
            .await?;

        let status = resp.status();
        let bytes = resp.bytes().await?;
        if !status.is_success() {
            return Err(GenerationError::Api {
                status,
                body: String::from_utf8_lossy(&bytes).chars().take(512).collect(),
            });
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Runs the model under a retry policy and stores what comes back.
#[derive(Clone, Debug)]
pub struct GenerationClient<M> {
    model: M,
    store: ArtifactStore,
    settings: ImageSettings,
}

impl<M: ImageModel> GenerationClient<M> {
    /// Client writing into `store`.
    pub fn new(model: M, store: ArtifactStore, settings: ImageSettings) -> Self {
        Self {
            model,
            store,
            settings,
        }
    }

    /// Generates one image, retrying per `policy`. Returns the stored artifact
    /// or the error from the last attempt.
    pub async fn generate(
        &self,
        compiled: &CompiledRequest,
        policy: &RetryPolicy,
    ) -> Result<Artifact, GenerationFailure> {
        let max_attempts = policy.max_attempts.max(1);
        let request = ModelRequest {
            compiled,
            settings: &self.settings,
        };

        let mut attempt = 1;
        loop {
            info!(
                "Calling image model (Attempt {}/{}, {} reference image(s))",
                attempt,
                max_attempts,
                compiled.attachments.len()
            );
            match self.attempt(&request).await {
                Ok(artifact) => {
                    info!(
                        "Attempt {}/{} succeeded: {}",
                        attempt, max_attempts, artifact.id
                    );
                    return Ok(artifact);
                }
                Err(err) => {
                    warn!("Attempt {}/{} failed: {}", attempt, max_attempts, err);
                    if attempt >= max_attempts {
                        error!("All {} attempts failed", max_attempts);
                        return Err(GenerationFailure {
                            attempts: attempt,
                            source: err,
                        });
                    }
                    let wait = policy.backoff(attempt);
                    info!("Retrying in {:.1} seconds...", wait.as_secs_f64());
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn attempt(&self, request: &ModelRequest<'_>) -> Result<Artifact, GenerationError> {
        let response = self.model.generate_content(request).await?;
        let inline = response.first_image()?;
        let bytes = general_purpose::STANDARD.decode(inline.data.trim())?;
        let image = image::load_from_memory(&bytes)?;

        let mut png = Vec::new();
        image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        let artifact = self.store.persist_png(&png).await?;
        info!("Image saved to {}", artifact.path.display());
        Ok(artifact)
    }
}
