//! Asset transport
//!
//! An audio tile needs exactly two things from the network: a cheap existence
//! check and one full fetch with progress. [`HttpTransport`] does both over
//! HTTP; [`FileTransport`] serves a local asset directory.

use crate::error::{Error, Result};
use async_trait::async_trait;
use reef_common::config::AudioConfig;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::debug;

const USER_AGENT: &str = concat!("reef-tank/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 60;
const FILE_CHUNK_BYTES: usize = 64 * 1024;
/// Upper bound on what a reported length may reserve up front
const MAX_PREALLOC_BYTES: u64 = 16 << 20;

/// Progress callback: `(bytes_loaded, total_bytes_if_known)`
pub type Progress<'a> = &'a (dyn Fn(u64, Option<u64>) + Send + Sync);

/// Where audio assets come from
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether the asset exists. Must not be served from a cache.
    async fn exists(&self, url: &str) -> Result<bool>;

    /// Fetch the whole asset, reporting progress after every chunk
    async fn fetch(&self, url: &str, progress: Progress<'_>) -> Result<Vec<u8>>;
}

/// Pick the transport matching the configured asset base
pub fn transport_for(config: &AudioConfig) -> Result<Arc<dyn Transport>> {
    if config.is_remote() {
        Ok(Arc::new(HttpTransport::new(&config.asset_base)?))
    } else {
        Ok(Arc::new(FileTransport::new(&config.asset_base)))
    }
}

/// File extension of the last path segment, used as a decoder hint
pub fn extension_hint(url: &str) -> Option<String> {
    let path = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);
    let name = path.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Initial body capacity for a reported length; larger bodies grow as they arrive
fn initial_capacity(total: Option<u64>) -> usize {
    total.map_or(0, |t| t.min(MAX_PREALLOC_BYTES) as usize)
}

// ============================================================================
// HTTP
// ============================================================================

pub struct HttpTransport {
    client: reqwest::Client,
    base: reqwest::Url,
}

impl HttpTransport {
    pub fn new(base: &str) -> Result<Self> {
        let base = reqwest::Url::parse(base)
            .map_err(|e| Error::BadRequest(format!("Invalid asset base '{}': {}", base, e)))?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::Http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base })
    }

    /// Resolve `url` against the base (absolute URLs pass through)
    pub fn resolve(&self, url: &str) -> Result<reqwest::Url> {
        self.base.join(url).map_err(|e| Error::Fetch {
            url: url.to_string(),
            reason: format!("cannot resolve against {}: {}", self.base, e),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn exists(&self, url: &str) -> Result<bool> {
        let target = self.resolve(url)?;
        let response = self
            .client
            .head(target.clone())
            .header(reqwest::header::CACHE_CONTROL, "no-store")
            .send()
            .await
            .map_err(|e| Error::AssetUnavailable(format!("{}: {}", target, e)))?;

        debug!("HEAD {} -> {}", target, response.status());
        Ok(response.status().is_success())
    }

    async fn fetch(&self, url: &str, progress: Progress<'_>) -> Result<Vec<u8>> {
        let target = self.resolve(url)?;
        let fetch_error = |reason: String| Error::Fetch {
            url: target.to_string(),
            reason,
        };

        let mut response = self
            .client
            .get(target.clone())
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(fetch_error(format!("HTTP {}", response.status())));
        }

        let total = response.content_length();
        let mut body = Vec::with_capacity(initial_capacity(total));
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| fetch_error(e.to_string()))?
        {
            body.extend_from_slice(&chunk);
            progress(body.len() as u64, total);
        }

        debug!("GET {} -> {} bytes", target, body.len());
        Ok(body)
    }
}

// ============================================================================
// Local directory
// ============================================================================

pub struct FileTransport {
    root: PathBuf,
}

impl FileTransport {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map `url` to a path under the root, refusing anything that escapes it
    pub fn resolve(&self, url: &str) -> Result<PathBuf> {
        let relative = url.strip_prefix("file://").unwrap_or(url);
        let relative = relative.trim_start_matches('/');

        let mut path = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(Error::AssetUnavailable(format!(
                        "{} escapes the asset directory",
                        url
                    )))
                }
            }
        }
        if path == self.root {
            return Err(Error::AssetUnavailable(format!("{} names no file", url)));
        }
        Ok(path)
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn exists(&self, url: &str) -> Result<bool> {
        let path = self.resolve(url)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch(&self, url: &str, progress: Progress<'_>) -> Result<Vec<u8>> {
        let path = self.resolve(url)?;
        let fetch_error = |reason: String| Error::Fetch {
            url: url.to_string(),
            reason,
        };

        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        let total = file
            .metadata()
            .await
            .map_err(|e| fetch_error(e.to_string()))?
            .len();

        let mut body = Vec::with_capacity(initial_capacity(Some(total)));
        let mut chunk = vec![0u8; FILE_CHUNK_BYTES];
        loop {
            let n = file
                .read(&mut chunk)
                .await
                .map_err(|e| fetch_error(e.to_string()))?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..n]);
            progress(body.len() as u64, Some(total));
        }

        debug!("Read {} ({} bytes)", path.display(), body.len());
        Ok(body)
    }
}
