//! The operations exposed to the routing layer: render a page, render a
//! cover, and proxy an image download.

use reqwest::header::{CONTENT_TYPE, HeaderMap};
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

use crate::config::ServiceConfig;
use crate::constants::{PROXY_DEFAULT_CONTENT_TYPE, REFERENCE_FETCH_TIMEOUT};
use crate::error::ServiceError;
use crate::generation::{GeminiModel, GenerationClient, ImageSettings, RetryPolicy};
use crate::prompt::{CompiledRequest, compile_cover_prompt, compile_page_prompt};
use crate::references::{RawReference, ReferenceInput, ReferenceResolver};
use crate::script::PageScript;
use crate::storage::ArtifactStore;
use crate::style::{ComicStyle, Language};

/// Optional per-request retry settings; unset fields use the server's.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
pub struct RetryOverride {
    /// Attempts before giving up
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Base backoff in seconds
    #[serde(default)]
    pub retry_delay: Option<f64>,
}

impl RetryOverride {
    fn apply(self, base: RetryPolicy) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries.unwrap_or(base.max_attempts),
            self.retry_delay
                .unwrap_or_else(|| base.retry_delay.as_secs_f64()),
        )
    }
}

/// Render one story page.
#[derive(Clone, Debug, Default)]
pub struct PageImageRequest {
    /// The page to draw
    pub page: PageScript,
    /// Style key; unknown keys use the default
    pub style: String,
    /// Sketch or other references for this page
    pub references: Option<ReferenceInput>,
    /// Pages rendered earlier, for continuity
    pub prior_pages: Vec<RawReference>,
    /// Overrides the server's key
    pub google_api_key: Option<String>,
    /// Overrides the server's retry policy
    pub retry: RetryOverride,
}

/// Render a cover.
#[derive(Clone, Debug, Default)]
pub struct CoverImageRequest {
    /// Style key; unknown keys use the default
    pub style: String,
    /// Language key for the title; unknown keys use English
    pub language: String,
    /// Usually the rendered pages
    pub references: Vec<RawReference>,
    /// Overrides the server's key
    pub google_api_key: Option<String>,
    /// Overrides the server's retry policy
    pub retry: RetryOverride,
}

/// A rendered image and the prompt that produced it.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Path the image is served at
    pub artifact_id: String,
    /// Instruction text sent to the model
    pub prompt: String,
}

/// Bytes fetched on the caller's behalf.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxiedImage {
    /// Body as downloaded
    pub bytes: Vec<u8>,
    /// Upstream content type, or `image/png`
    pub content_type: String,
}

/// Entry point for page, cover and proxy operations.
#[derive(Clone, Debug)]
pub struct ComicService {
    http: reqwest::Client,
    store: ArtifactStore,
    config: ServiceConfig,
}

impl ComicService {
    /// Service writing into `config.artifact_dir`.
    pub fn new(http: reqwest::Client, config: ServiceConfig) -> Self {
        let store = ArtifactStore::new(config.artifact_dir.clone());
        Self {
            http,
            store,
            config,
        }
    }

    /// Where artifacts go.
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Shared HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    fn api_key(&self, requested: Option<&str>) -> Result<String, ServiceError> {
        requested
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .or_else(|| self.config.default_google_api_key.clone())
            .ok_or(ServiceError::MissingApiKey)
    }

    fn resolver(&self) -> ReferenceResolver {
        ReferenceResolver::new(self.http.clone(), self.store.clone())
    }

    fn client(&self, api_key: &str) -> GenerationClient<GeminiModel> {
        GenerationClient::new(
            GeminiModel::new(self.http.clone(), api_key, &self.config),
            self.store.clone(),
            ImageSettings {
                aspect_ratio: self.config.aspect_ratio.clone(),
                image_size: self.config.image_size.clone(),
            },
        )
    }

    async fn render(
        &self,
        api_key: &str,
        instruction: String,
        references: &[RawReference],
        retry: RetryOverride,
    ) -> Result<GeneratedImage, ServiceError> {
        let attachments = self.resolver().resolve(references).await;
        info!(
            "Using {}/{} reference image(s)",
            attachments.len(),
            references.len()
        );
        let compiled = CompiledRequest::new(instruction, attachments);
        let policy = retry.apply(self.config.retry);
        let artifact = self.client(api_key).generate(&compiled, &policy).await?;
        Ok(GeneratedImage {
            artifact_id: artifact.id,
            prompt: compiled.instruction,
        })
    }

    /// Renders a story page. Page references come first, then prior pages.
    pub async fn generate_page_image(
        &self,
        request: PageImageRequest,
    ) -> Result<GeneratedImage, ServiceError> {
        let api_key = self.api_key(request.google_api_key.as_deref())?;
        let style = ComicStyle::from_key(&request.style);
        let instruction = compile_page_prompt(&request.page, style);

        let references = page_references(request.references, request.prior_pages);

        info!(
            "Generating page '{}' in {} style",
            request.page.title, style
        );
        self.render(&api_key, instruction, &references, request.retry)
            .await
    }

    /// Renders a cover from the style and language alone, plus references.
    pub async fn generate_cover_image(
        &self,
        request: CoverImageRequest,
    ) -> Result<GeneratedImage, ServiceError> {
        let api_key = self.api_key(request.google_api_key.as_deref())?;
        let style = ComicStyle::from_key(&request.style);
        let language = Language::from_key_or(&request.language, Language::English);
        let instruction = compile_cover_prompt(style, language);

        info!(
            "Generating cover in {} style ({}), {} reference(s)",
            style,
            language,
            request.references.len()
        );
        self.render(&api_key, instruction, &request.references, request.retry)
            .await
    }

    /// Fetches `url` and hands back its body. Anything but a 200 is an error.
    pub async fn proxy_download(&self, url: &str) -> Result<ProxiedImage, ServiceError> {
        let url = Url::parse(url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ServiceError::BadRequest(format!(
                "Unsupported URL scheme: {}",
                url.scheme()
            )));
        }

        let resp = self
            .http
            .get(url)
            .timeout(REFERENCE_FETCH_TIMEOUT)
            .send()
            .await?;
        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            return Err(ServiceError::Proxy(status.as_u16().to_string()));
        }
        let content_type = content_type_of(resp.headers());
        let bytes = resp.bytes().await?.to_vec();
        Ok(ProxiedImage {
            bytes,
            content_type,
        })
    }
}

/// Page references first, then prior pages, in the order given.
fn page_references(
    references: Option<ReferenceInput>,
    prior_pages: Vec<RawReference>,
) -> Vec<RawReference> {
    let mut entries = references
        .map(ReferenceInput::into_entries)
        .unwrap_or_default();
    entries.extend(prior_pages);
    entries
}

fn content_type_of(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .unwrap_or(PROXY_DEFAULT_CONTENT_TYPE)
        .to_string()
}
