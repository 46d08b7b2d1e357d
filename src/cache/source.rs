//! Content sources: where tile files and layout documents are fetched from.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use url::Url;

use crate::error::{TileError, ViewerError};
use crate::format::decode_container;

/// Fetch a file by path. Implementations are called from the fetch thread.
pub trait ContentSource: Send + Sync {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, TileError>;
}

/// Blocking HTTP(S) source resolving paths against a base URL.
pub struct HttpSource {
    client: reqwest::blocking::Client,
    base: Url,
}

impl HttpSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ViewerError> {
        let mut base = Url::parse(base_url)?;
        // Without a trailing slash `join` would replace the last segment.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("mipview/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        log::info!("Content source: {}", base);
        Ok(Self { client, base })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }
}

impl ContentSource for HttpSource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, TileError> {
        let url = self
            .base
            .join(path)
            .map_err(|e| TileError::transport(path, format!("Invalid URL: {}", e)))?;
        log::debug!("GET {}", url);

        let response = self
            .client
            .get(url.as_str())
            .send()
            .map_err(|e| TileError::transport(path, format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TileError::transport(path, format!("HTTP {}", status)));
        }

        let bytes = response
            .bytes()
            .map_err(|e| TileError::transport(path, format!("Failed to read body: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

/// In-memory source. Unknown paths fail with a transport error.
#[derive(Default)]
pub struct MemorySource {
    files: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: impl Into<String>, data: Vec<u8>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(path.into(), data);
        }
    }

    pub fn with_file(self, path: impl Into<String>, data: Vec<u8>) -> Self {
        self.insert(path, data);
        self
    }

    /// Every path requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl ContentSource for MemorySource {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, TileError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(path.to_string());
        }
        let files = self
            .files
            .lock()
            .map_err(|_| TileError::transport(path, "source lock poisoned"))?;
        files
            .get(path)
            .cloned()
            .ok_or_else(|| TileError::transport(path, "not found"))
    }
}

impl<S: ContentSource + ?Sized> ContentSource for std::sync::Arc<S> {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, TileError> {
        (**self).fetch(path)
    }
}

/// Wraps a tile source so PNG/JPEG/WebP payloads are expanded to raw RGBA
/// inside `fetch`, on whichever thread performs it.
pub struct DecodingSource<S> {
    inner: S,
}

impl<S: ContentSource> DecodingSource<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S: ContentSource> ContentSource for DecodingSource<S> {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, TileError> {
        let bytes = self.inner.fetch(path)?;
        decode_container(&bytes).map_err(|e| TileError::format(path, e))
    }
}
