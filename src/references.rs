//! Turns caller-supplied reference entries into decoded images.
//!
//! Entries arrive as bare strings or as `{"imageUrl": ...}` objects and can
//! point at three places: a remote URL, an artifact this service generated
//! earlier, or an inline `data:image/...;base64,` payload. Anything that
//! can't be turned into an image is logged and skipped, never fatal.

use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose;
use image::{ImageFormat, ImageReader};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::constants::{LOG_ENTRY_PREVIEW_CHARS, REFERENCE_FETCH_TIMEOUT};
use crate::error::ReferenceError;
use crate::storage::ArtifactStore;

/// One reference entry as the caller sent it.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawReference {
    /// A bare string, classified by prefix
    Text(String),
    /// An object with a URL-bearing field, eg a previously rendered page
    Object {
        /// The image location
        #[serde(rename = "imageUrl", alias = "image_url", alias = "url")]
        image_url: String,
    },
    /// Anything else; always dropped
    Other(Value),
}

impl RawReference {
    /// Projects the entry onto the string that gets classified.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawReference::Text(value) => Some(value),
            RawReference::Object { image_url } => Some(image_url),
            RawReference::Other(_) => None,
        }
    }
}

impl From<&str> for RawReference {
    fn from(value: &str) -> Self {
        RawReference::Text(value.to_string())
    }
}

/// Either a single entry or a list of them.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ReferenceInput {
    /// `["a", {"imageUrl": "b"}]`
    Many(Vec<RawReference>),
    /// `"a"`
    One(RawReference),
}

impl ReferenceInput {
    /// Flattens into an ordered list.
    pub fn into_entries(self) -> Vec<RawReference> {
        match self {
            ReferenceInput::Many(entries) => entries,
            ReferenceInput::One(entry) => vec![entry],
        }
    }
}

/// Where a reference image comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReferenceDescriptor {
    /// Fetched over HTTP(S)
    Remote(Url),
    /// A file in the artifact directory
    LocalArtifact(PathBuf),
    /// Base64 payload from a data URI, header stripped
    Inline(String),
}

impl ReferenceDescriptor {
    /// Classifies `value`, checking remote, then local artifact, then data URI.
    pub fn classify(value: &str, store: &ArtifactStore) -> Option<Self> {
        let value = value.trim();
        if value.starts_with("http://") || value.starts_with("https://") {
            return Url::parse(value).ok().map(ReferenceDescriptor::Remote);
        }
        if store.owns(value) {
            return store.resolve_id(value).map(ReferenceDescriptor::LocalArtifact);
        }
        if value.starts_with("data:image") {
            let payload = match value.split_once(',') {
                Some((_header, encoded)) => encoded,
                None => value,
            };
            return Some(ReferenceDescriptor::Inline(payload.to_string()));
        }
        None
    }

    fn kind(&self) -> &'static str {
        match self {
            ReferenceDescriptor::Remote(_) => "remote",
            ReferenceDescriptor::LocalArtifact(_) => "artifact",
            ReferenceDescriptor::Inline(_) => "inline",
        }
    }
}

/// A decoded reference, ready to attach to a model request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceImage {
    /// Encoded bytes, png/jpeg/webp as received or re-encoded to png
    pub bytes: Vec<u8>,
    /// MIME type of `bytes`
    pub mime_type: String,
    /// Pixel width
    pub width: u32,
    /// Pixel height
    pub height: u32,
}

impl ReferenceImage {
    /// Decodes `bytes` to check they are an image we can send.
    ///
    /// PNG, JPEG and WebP keep their original encoding; anything else the
    /// model won't take is re-encoded to PNG.
    pub fn decode(bytes: Vec<u8>) -> Result<Self, ReferenceError> {
        let reader = ImageReader::new(Cursor::new(bytes.as_slice())).with_guessed_format()?;
        let format = reader.format();
        let image = reader.decode()?;
        let (width, height) = (image.width(), image.height());

        let (format, bytes) = match format {
            Some(format @ (ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::WebP)) => {
                (format, bytes)
            }
            _ => {
                let mut output = Vec::new();
                image.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)?;
                (ImageFormat::Png, output)
            }
        };
        Ok(Self {
            width,
            height,
            mime_type: format.to_mime_type().to_string(),
            bytes,
        })
    }
}

/// Resolves reference entries into images, in order.
#[derive(Clone, Debug)]
pub struct ReferenceResolver {
    http: reqwest::Client,
    store: ArtifactStore,
    fetch_timeout: Duration,
}

impl ReferenceResolver {
    /// Resolver reading local artifacts from `store` and fetching with `http`.
    pub fn new(http: reqwest::Client, store: ArtifactStore) -> Self {
        Self {
            http,
            store,
            fetch_timeout: REFERENCE_FETCH_TIMEOUT,
        }
    }

    /// Overrides the download timeout.
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Resolves every entry, skipping the ones that fail. Order is preserved.
    pub async fn resolve(&self, entries: &[RawReference]) -> Vec<ReferenceImage> {
        let mut images = Vec::with_capacity(entries.len());
        for entry in entries {
            match self.resolve_one(entry).await {
                Ok(image) => images.push(image),
                Err(err) => {
                    warn!(
                        "Failed to process reference image {}...: {}",
                        preview(entry),
                        err
                    );
                }
            }
        }
        debug!("Resolved {}/{} reference images", images.len(), entries.len());
        images
    }

    async fn resolve_one(&self, entry: &RawReference) -> Result<ReferenceImage, ReferenceError> {
        let descriptor = entry
            .as_str()
            .and_then(|value| ReferenceDescriptor::classify(value, &self.store))
            .ok_or(ReferenceError::Unrecognised)?;
        info!("Processing {} reference image", descriptor.kind());

        let bytes = match descriptor {
            ReferenceDescriptor::Remote(url) => self.fetch(url).await?,
            ReferenceDescriptor::LocalArtifact(path) => tokio::fs::read(&path).await?,
            ReferenceDescriptor::Inline(payload) => general_purpose::STANDARD.decode(payload.trim())?,
        };
        ReferenceImage::decode(bytes)
    }

    async fn fetch(&self, url: Url) -> Result<Vec<u8>, ReferenceError> {
        info!("Downloading reference image: {}", url);
        let resp = self
            .http
            .get(url)
            .timeout(self.fetch_timeout)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ReferenceError::Status(status));
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

fn preview(entry: &RawReference) -> String {
    let text = match entry {
        RawReference::Other(value) => value.to_string(),
        _ => entry.as_str().unwrap_or_default().to_string(),
    };
    text.chars().take(LOG_ENTRY_PREVIEW_CHARS).collect()
}
