//! Where generated artifacts live and how callers address them.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use rand::RngExt;
use rand::distr::Alphanumeric;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::constants::{ARTIFACT_EXTENSION, ARTIFACT_TOKEN_LENGTH, ARTIFACT_URL_PREFIX};

/// A persisted image and the identifier handed back to callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    /// Path expression served by the static file layer, eg `/backend/static/images/<token>.png`.
    pub id: String,
    /// Where the file sits on disk.
    pub path: PathBuf,
}

/// Flat directory of generated images, addressed by a URL prefix.
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    root: PathBuf,
    url_prefix: String,
}

impl ArtifactStore {
    /// Store rooted at `root`, served under the default prefix.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_prefix(root, ARTIFACT_URL_PREFIX)
    }

    /// Store rooted at `root`, served under `url_prefix`.
    pub fn with_prefix(root: impl Into<PathBuf>, url_prefix: &str) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    /// The directory artifacts are written to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The URL prefix artifact ids start with.
    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// A fresh, collision-free filename.
    pub fn new_artifact_name() -> String {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(ARTIFACT_TOKEN_LENGTH)
            .map(char::from)
            .collect();
        format!("{token}.{ARTIFACT_EXTENSION}")
    }

    /// Caller-facing id for a filename in this store.
    pub fn artifact_id(&self, name: &str) -> String {
        format!("{}/{}", self.url_prefix, name)
    }

    /// Whether `value` is addressed at this store.
    pub fn owns(&self, value: &str) -> bool {
        value
            .strip_prefix(self.url_prefix.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Maps an artifact id back to its file, if it names a single file under the prefix.
    pub fn resolve_id(&self, id: &str) -> Option<PathBuf> {
        let name = id.strip_prefix(self.url_prefix.as_str())?.strip_prefix('/')?;
        let mut components = Path::new(name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(file)), None) => Some(self.root.join(file)),
            _ => None,
        }
    }

    /// Writes `png` under a new name. Never replaces an existing file.
    pub async fn persist_png(&self, png: &[u8]) -> std::io::Result<Artifact> {
        match tokio::fs::create_dir_all(&self.root).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
            Err(err) => return Err(err),
        }

        let name = Self::new_artifact_name();
        let path = self.root.join(&name);
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        write_or_discard(file, &path, png).await?;
        debug!("Wrote {} bytes to {}", png.len(), path.display());

        Ok(Artifact {
            id: self.artifact_id(&name),
            path,
        })
    }
}

/// Writes `bytes` through `writer`; on failure removes the partial file at `path`.
async fn write_or_discard<W: AsyncWrite + Unpin>(
    mut writer: W,
    path: &Path,
    bytes: &[u8],
) -> std::io::Result<()> {
    let written = match writer.write_all(bytes).await {
        Ok(()) => writer.flush().await,
        Err(err) => Err(err),
    };
    if let Err(err) = written {
        drop(writer);
        if let Err(remove_err) = tokio::fs::remove_file(path).await {
            warn!(
                "Failed to remove partial artifact {}: {}",
                path.display(),
                remove_err
            );
        }
        return Err(err);
    }
    Ok(())
}
