//! Shared constants/defaults for the pipeline
//!

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

/// The default place generated artifacts are written to
pub static ARTIFACT_DIR: LazyLock<PathBuf> = LazyLock::new(|| PathBuf::from("./static/images"));

/// URL prefix the artifact directory is served under. Resolver and storage both key off this.
pub const ARTIFACT_URL_PREFIX: &str = "/backend/static/images";

/// Extension used for every persisted artifact.
pub const ARTIFACT_EXTENSION: &str = "png";

/// Length of the random token in artifact filenames.
pub const ARTIFACT_TOKEN_LENGTH: usize = 32;

/// Timeout for downloading a remote reference image.
pub const REFERENCE_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for a single call to the image model.
pub const MODEL_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Default Gemini REST base.
pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default image model.
pub const GEMINI_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";

/// Output aspect ratio requested from the model.
pub const IMAGE_ASPECT_RATIO: &str = "9:16";

/// Output resolution class requested from the model.
pub const IMAGE_SIZE: &str = "2K";

/// The finish reason that marks a normal completion.
pub const FINISH_REASON_STOP: &str = "STOP";

/// Attempts made before a generation is reported as failed.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Base delay for the exponential backoff between attempts, in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: f64 = 1.0;

/// Content type assumed when a proxied download doesn't say.
pub const PROXY_DEFAULT_CONTENT_TYPE: &str = "image/png";

/// Default OpenAI-compatible base for storyboard scripts.
pub const SCRIPT_API_BASE: &str = "https://api.openai.com/v1";

/// Default storyboard model.
pub const SCRIPT_MODEL: &str = "gpt-4o-mini";

/// Sampling temperature for storyboard generation.
pub const SCRIPT_TEMPERATURE: f64 = 0.7;

/// Token ceiling for storyboard generation.
pub const SCRIPT_MAX_TOKENS: u32 = 3000;

/// Pages generated when the caller doesn't ask for a count.
pub const SCRIPT_DEFAULT_PAGE_COUNT: u32 = 3;

/// How much of a reference entry ends up in a warning line.
pub const LOG_ENTRY_PREVIEW_CHARS: usize = 50;
