//! services/api/src/adapters/gcs.rs
//!
//! This module contains the adapter for Google Cloud Storage.
//! It implements the `ObjectStorage` port from the `core` crate with a single
//! XML API `PUT`, which creates or overwrites the object in one request.

use crate::adapters::status_error;
use async_trait::async_trait;
use feedback_core::{ObjectStorage, PortError, PortResult, StoredObject};
use reqwest::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::Url;
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ObjectStorage` for one Cloud Storage bucket.
#[derive(Clone)]
pub struct GcsStorageAdapter {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    access_token: String,
}

impl GcsStorageAdapter {
    /// Creates a new `GcsStorageAdapter`.
    pub fn new(
        client: reqwest::Client,
        base_url: String,
        bucket: String,
        access_token: String,
    ) -> Self {
        Self {
            client,
            base_url,
            bucket,
            access_token,
        }
    }

    /// `{base_url}/{bucket}/{key}` with every path segment percent-encoded.
    fn object_url(&self, key: &str) -> PortResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| PortError::Unexpected(format!("Invalid storage URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| PortError::Unexpected("Storage URL cannot take a path".to_string()))?
            .pop_if_empty()
            .push(&self.bucket)
            .extend(key.split('/'));
        Ok(url)
    }

    /// The upload request, built but not sent.
    fn put_request(&self, object: StoredObject) -> PortResult<reqwest::Request> {
        let url = self.object_url(&object.key)?;
        self.client
            .put(url)
            .bearer_auth(&self.access_token)
            .header(CONTENT_TYPE, object.content_type)
            .header(CONTENT_LENGTH, object.content_length())
            .header(CACHE_CONTROL, object.cache_control)
            .body(object.body)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Invalid upload request: {}", e)))
    }
}

//=========================================================================================
// `ObjectStorage` Trait Implementation
//=========================================================================================

#[async_trait]
impl ObjectStorage for GcsStorageAdapter {
    async fn put_object(&self, object: StoredObject) -> PortResult<()> {
        let request = self.put_request(object)?;
        debug!(url = %request.url(), "Uploading object");

        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| PortError::Unexpected(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        Err(status_error(status, text.trim()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(base_url: &str) -> GcsStorageAdapter {
        GcsStorageAdapter::new(
            reqwest::Client::new(),
            base_url.to_string(),
            "feedback-proto-ai-raw".to_string(),
            "token".to_string(),
        )
    }

    #[test]
    fn object_url_keeps_key_segments() {
        let url = adapter("https://storage.googleapis.com")
            .object_url("raw_submissions/2026-10-16/0a1b2c3d4e.json")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/feedback-proto-ai-raw/raw_submissions/2026-10-16/0a1b2c3d4e.json"
        );
    }

    #[test]
    fn object_url_encodes_unsafe_characters() {
        let url = adapter("http://localhost:4443/")
            .object_url("raw submissions/2026-10-16/a?b.json")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:4443/feedback-proto-ai-raw/raw%20submissions/2026-10-16/a%3Fb.json"
        );
    }

    #[test]
    fn upload_request_carries_auth_and_object_headers() {
        let body = br#"{"prompt":"hi"}"#.to_vec();
        let request = adapter("https://storage.googleapis.com")
            .put_request(StoredObject::json(
                "raw_submissions/2026-10-16/0a1b2c3d4e.json".to_string(),
                body.clone(),
            ))
            .unwrap();

        assert_eq!(request.method(), reqwest::Method::PUT);
        assert_eq!(
            request.url().as_str(),
            "https://storage.googleapis.com/feedback-proto-ai-raw/raw_submissions/2026-10-16/0a1b2c3d4e.json"
        );
        let headers = request.headers();
        assert_eq!(headers["authorization"], "Bearer token");
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[CACHE_CONTROL], "no-cache");
        assert_eq!(headers[CONTENT_LENGTH], body.len().to_string().as_str());
        assert_eq!(
            request.body().and_then(|b| b.as_bytes()),
            Some(body.as_slice())
        );
    }

    #[test]
    fn invalid_base_url_is_an_error() {
        assert!(adapter("not a url").object_url("k.json").is_err());
    }
}
