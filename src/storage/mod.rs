//! Blob storage for receipt photos.

pub mod http;

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::RwLock;

pub use http::HttpBlobStore;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("storage request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("storage rejected the request with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("blob not found: {0}")]
    NotFound(String),
}

/// Port for photo binaries, addressed by path inside a single bucket.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `path` and returns the public URL of the blob.
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<String, BlobError>;

    /// Removes the blob stored under `path`.
    async fn delete(&self, path: &str) -> Result<(), BlobError>;

    fn public_url(&self, path: &str) -> String;
}

/// Keeps blobs in process; URLs use the `memory://` scheme.
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<String, (Bytes, String)>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, path: &str) -> bool {
        self.blobs.read().await.contains_key(path)
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<String, BlobError> {
        self.blobs
            .write()
            .await
            .insert(path.to_string(), (bytes, content_type.to_string()));
        Ok(self.public_url(path))
    }

    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        self.blobs
            .write()
            .await
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| BlobError::NotFound(path.to_string()))
    }

    fn public_url(&self, path: &str) -> String {
        format!("memory://{path}")
    }
}
