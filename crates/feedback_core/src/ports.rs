//! crates/feedback_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! The generator and writer only ever talk to the model host and the object
//! store through these traits, so the core stays independent of any SDK or
//! HTTP client.

use crate::domain::GenerationRequest;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (network, auth, quota).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Upstream service returned {status}: {message}")]
    Upstream { status: u16, message: String },
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Text fragments in arrival order.
pub type TextStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait InferenceService: Send + Sync {
    /// Runs one blocking completion against `model` and returns its text, untrimmed.
    async fn generate(&self, model: &str, request: &GenerationRequest) -> PortResult<String>;

    /// Starts a streaming completion against `model`.
    async fn generate_streaming(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> PortResult<TextStream>;
}

/// A fully materialized object ready for a single-shot upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: &'static str,
    pub cache_control: &'static str,
}

impl StoredObject {
    /// A JSON document that downstream caches must not keep.
    pub fn json(key: String, body: Vec<u8>) -> Self {
        Self {
            key,
            body,
            content_type: "application/json",
            cache_control: "no-cache",
        }
    }

    pub fn content_length(&self) -> usize {
        self.body.len()
    }
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Creates or overwrites the object in one call. No retries happen here.
    async fn put_object(&self, object: StoredObject) -> PortResult<()>;
}
