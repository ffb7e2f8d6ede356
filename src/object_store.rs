//! Object store adapter
//!
//! Uploads event snapshots to the remote storage API and derives public URLs.
//! The storage API follows the `/storage/v1/object/{bucket}/{key}` convention;
//! public URLs are served under `/storage/v1/object/public/`.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;

/// Snapshot storage operations
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload bytes under the given bucket/key
    async fn upload(&self, bucket: &str, key: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<()>;

    /// Retrievable URL for an uploaded object
    fn public_url(&self, bucket: &str, key: &str) -> String;
}

/// HTTP storage client
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl HttpObjectStore {
    pub fn new(base_url: String, service_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
        }
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(&self, bucket: &str, key: &str, bytes: Vec<u8>, content_type: &str)
        -> Result<()>
    {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, key);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.service_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::ObjectStore(format!(
                "upload of {}/{} returned {}: {}",
                bucket,
                key,
                status,
                body.trim()
            )));
        }

        tracing::debug!(bucket = %bucket, key = %key, "Snapshot uploaded");
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, key)
    }
}
