//! Config handling

use std::path::PathBuf;
use std::time::Duration;

use tracing::log::LevelFilter;

use crate::cli::CliOptions;
use crate::constants::{GEMINI_API_BASE, GEMINI_IMAGE_MODEL, IMAGE_ASPECT_RATIO, IMAGE_SIZE};
use crate::generation::RetryPolicy;

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("reqwest", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// Everything the service needs to talk to the image model and write artifacts.
///
/// Built once at startup and passed in explicitly, so two requests carrying
/// different API keys never see each other's settings.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Directory generated images are written to.
    pub artifact_dir: PathBuf,
    /// Key used when a request doesn't bring its own.
    pub default_google_api_key: Option<String>,
    /// Gemini REST base, without a trailing slash.
    pub gemini_api_base: String,
    /// Image model name.
    pub gemini_model: String,
    /// Aspect ratio requested for every output.
    pub aspect_ratio: String,
    /// Resolution class requested for every output.
    pub image_size: String,
    /// Timeout for one model call.
    pub model_timeout: Duration,
    /// Retry policy used when a request doesn't override it.
    pub retry: RetryPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            artifact_dir: crate::constants::ARTIFACT_DIR.clone(),
            default_google_api_key: None,
            gemini_api_base: GEMINI_API_BASE.to_string(),
            gemini_model: GEMINI_IMAGE_MODEL.to_string(),
            aspect_ratio: IMAGE_ASPECT_RATIO.to_string(),
            image_size: IMAGE_SIZE.to_string(),
            model_timeout: crate::constants::MODEL_REQUEST_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

impl From<&CliOptions> for ServiceConfig {
    fn from(cli: &CliOptions) -> Self {
        let default_google_api_key = cli
            .google_api_key
            .clone()
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty());

        Self {
            artifact_dir: cli.artifact_dir.clone(),
            default_google_api_key,
            gemini_api_base: cli.gemini_api_base.trim_end_matches('/').to_string(),
            gemini_model: cli.gemini_model.clone(),
            aspect_ratio: IMAGE_ASPECT_RATIO.to_string(),
            image_size: IMAGE_SIZE.to_string(),
            model_timeout: Duration::from_secs(cli.model_timeout_secs),
            retry: RetryPolicy::new(cli.max_attempts, cli.retry_delay_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn cli_flags_flow_into_service_config() {
        let cli = CliOptions::parse_from([
            "panelsmith",
            "--artifact-dir",
            "/tmp/artifacts",
            "--gemini-api-base",
            "http://localhost:1234/v1beta/",
            "--max-attempts",
            "5",
            "--retry-delay-secs",
            "0.5",
            "--google-api-key",
            "abc",
        ]);
        let config = ServiceConfig::from(&cli);
        assert_eq!(config.artifact_dir, PathBuf::from("/tmp/artifacts"));
        assert_eq!(config.gemini_api_base, "http://localhost:1234/v1beta");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.retry_delay, Duration::from_millis(500));
        assert_eq!(config.default_google_api_key.as_deref(), Some("abc"));
        assert_eq!(config.aspect_ratio, "9:16");
    }
}
