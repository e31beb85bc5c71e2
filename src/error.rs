//! Error handling

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::{error, info};

/// Why a single reference entry couldn't be turned into an image.
///
/// These never leave the resolver; they end up in a warning line and the
/// entry is skipped.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    /// Not a URL, artifact path or data URI
    #[error("unrecognised reference")]
    Unrecognised,
    /// Download failed or timed out
    #[error("download failed: {0}")]
    Fetch(#[from] reqwest::Error),
    /// Download returned something other than 2xx
    #[error("download returned {0}")]
    Status(reqwest::StatusCode),
    /// Reading a local artifact failed
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    /// The data URI payload wasn't base64
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The bytes weren't a supported image
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// Why one generation attempt failed. Every variant is retried.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Network or timeout talking to the model
    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// The model endpoint answered with a non-2xx status
    #[error("model API error {status}: {body}")]
    Api {
        /// HTTP status
        status: reqwest::StatusCode,
        /// Truncated response body
        body: String,
    },
    /// The response body wasn't the JSON we expected
    #[error("invalid model response: {0}")]
    InvalidResponse(#[from] serde_json::Error),
    /// No candidates, or a finish reason other than a normal stop
    #[error("Prompt Content Error: {0}")]
    AbnormalCompletion(String),
    /// The candidate carried no inline image
    #[error("No image generated in response")]
    NoImage,
    /// The inline image wasn't valid base64
    #[error("image payload was not valid base64: {0}")]
    Payload(#[from] base64::DecodeError),
    /// The inline image bytes couldn't be decoded or re-encoded
    #[error("generated image could not be processed: {0}")]
    Image(#[from] image::ImageError),
    /// Writing the artifact failed
    #[error("failed to store generated image: {0}")]
    Storage(#[from] std::io::Error),
}

/// A generation that ran out of attempts.
#[derive(Debug, thiserror::Error)]
#[error("generation failed after {attempts} attempt(s): {source}")]
pub struct GenerationFailure {
    /// How many attempts were made
    pub attempts: u32,
    /// The error from the final attempt
    #[source]
    pub source: GenerationError,
}

/// Storyboard script generation errors
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Network failure talking to the text model
    #[error("AI generation failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-2xx from the text model
    #[error("AI generation failed: API error {status}: {body}")]
    Api {
        /// HTTP status
        status: reqwest::StatusCode,
        /// Truncated response body
        body: String,
    },
    /// Couldn't parse the completion or its structured payload
    #[error("AI generation failed: {0}")]
    Parse(#[from] serde_json::Error),
    /// The completion carried no content
    #[error("AI generation failed: empty completion")]
    EmptyCompletion,
    /// The model refused to answer
    #[error("AI generation failed: model refused: {0}")]
    Refusal(String),
}

/// Errors surfaced at the service boundary; one message, no codes.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Bad or missing input
    #[error("{0}")]
    BadRequest(String),
    /// No Google API key on the request or the server
    #[error("Google API key is required")]
    MissingApiKey,
    /// Retries exhausted
    #[error(transparent)]
    Generation(#[from] GenerationFailure),
    /// Storyboard generation failed
    #[error(transparent)]
    Script(#[from] ScriptError),
    /// Proxy download failed
    #[error("Failed to fetch image: {0}")]
    Proxy(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::Proxy(err.to_string())
    }
}

impl From<url::ParseError> for ServiceError {
    fn from(err: url::ParseError) -> Self {
        ServiceError::BadRequest(format!("Invalid URL: {err}"))
    }
}

impl ServiceError {
    fn status(&self) -> StatusCode {
        match self {
            ServiceError::BadRequest(_) | ServiceError::MissingApiKey => StatusCode::BAD_REQUEST,
            ServiceError::Generation(_) | ServiceError::Script(_) | ServiceError::Proxy(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = self.to_string();
        if status.is_server_error() {
            error!("Request failed: {}", message);
        } else {
            info!("Bad request: {}", message);
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}
