use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{BlobError, BlobStore};

/// Object storage reached over HTTP.
///
/// Objects are written to `{base}/storage/v1/object/{bucket}/{path}` and
/// served from `{base}/storage/v1/object/public/{bucket}/{path}`.
#[derive(Clone)]
pub struct HttpBlobStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    service_key: Option<String>,
}

impl HttpBlobStore {
    pub fn new(
        base_url: &str,
        bucket: &str,
        service_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BlobError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            service_key,
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.service_key {
            Some(key) => request
                .header(AUTHORIZATION, format!("Bearer {key}"))
                .header("apikey", key),
            None => request,
        }
    }

    async fn check(response: reqwest::Response) -> Result<(), BlobError> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(BlobError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put(&self, path: &str, bytes: Bytes, content_type: &str) -> Result<String, BlobError> {
        let response = self
            .authorize(self.client.post(self.object_url(path)))
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await?;
        Self::check(response).await?;
        debug!(path, "blob stored");
        Ok(self.public_url(path))
    }

    #[instrument(skip(self))]
    async fn delete(&self, path: &str) -> Result<(), BlobError> {
        let response = self
            .authorize(self.client.delete(self.object_url(path)))
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BlobError::NotFound(path.to_string()));
        }
        Self::check(response).await
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, path
        )
    }
}
