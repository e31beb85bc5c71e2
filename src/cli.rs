//! CLI parser
use clap::Parser;
use std::num::NonZeroU16;
use std::path::PathBuf;

use crate::constants::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_SECS, GEMINI_API_BASE, GEMINI_IMAGE_MODEL,
};

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "PANELSMITH_DEBUG")]
    /// Enable debug logging. Env: PANELSMITH_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "5003", env = "PANELSMITH_PORT")]
    /// http listener, defaults to `5003`.
    /// Env: PANELSMITH_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "PANELSMITH_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: PANELSMITH_LISTEN_ADDRESS
    pub listen_address: String,

    #[clap(
        long,
        short,
        default_value = "./static/images",
        env = "PANELSMITH_ARTIFACT_DIR"
    )]
    /// Where generated pages and covers are written, served under `/backend/static/images`.
    /// Env: PANELSMITH_ARTIFACT_DIR
    pub artifact_dir: PathBuf,

    #[clap(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    /// Fallback Google API key for requests that don't carry one.
    /// Env: GOOGLE_API_KEY (GEMINI_API_KEY is also checked at startup)
    pub google_api_key: Option<String>,

    #[clap(long, default_value = GEMINI_API_BASE, env = "PANELSMITH_GEMINI_API_BASE")]
    /// Gemini REST base URL.
    /// Env: PANELSMITH_GEMINI_API_BASE
    pub gemini_api_base: String,

    #[clap(long, default_value = GEMINI_IMAGE_MODEL, env = "PANELSMITH_GEMINI_MODEL")]
    /// Image model name.
    /// Env: PANELSMITH_GEMINI_MODEL
    pub gemini_model: String,

    #[clap(long, default_value = "120", env = "PANELSMITH_MODEL_TIMEOUT_SECS")]
    /// Timeout for a single model call, in seconds.
    /// Env: PANELSMITH_MODEL_TIMEOUT_SECS
    pub model_timeout_secs: u64,

    #[clap(long, default_value_t = DEFAULT_MAX_ATTEMPTS, env = "PANELSMITH_MAX_ATTEMPTS")]
    /// Attempts per generation before giving up.
    /// Env: PANELSMITH_MAX_ATTEMPTS
    pub max_attempts: u32,

    #[clap(long, default_value_t = DEFAULT_RETRY_DELAY_SECS, env = "PANELSMITH_RETRY_DELAY_SECS")]
    /// Base backoff delay in seconds, doubled after each failed attempt.
    /// Env: PANELSMITH_RETRY_DELAY_SECS
    pub retry_delay_secs: f64,
}
