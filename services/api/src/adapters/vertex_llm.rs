//! services/api/src/adapters/vertex_llm.rs
//!
//! This module contains the adapter for the Vertex AI generative model host.
//! It implements the `InferenceService` port from the `core` crate over the
//! `generateContent` REST methods, both blocking and server-sent-event streaming.

use crate::adapters::status_error;
use async_stream::stream;
use async_trait::async_trait;
use bytes::Bytes;
use feedback_core::{
    GenerationRequest, InferenceService, PortError, PortResult, TextStream,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use tracing::debug;

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: WireGenerationConfig<'a>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireGenerationConfig<'a> {
    max_output_tokens: u32,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'a str>,
}

impl<'a> GenerateContentRequest<'a> {
    fn from_request(request: &'a GenerationRequest) -> Self {
        let config = &request.config;
        Self {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: &request.text,
                }],
            }],
            generation_config: WireGenerationConfig {
                max_output_tokens: config.max_output_tokens,
                temperature: config.temperature,
                top_p: config.top_p,
                top_k: config.top_k,
                response_mime_type: config.response_mime_type.as_deref(),
            },
        }
    }
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    /// Set when the host reports a failure in-band, e.g. mid-stream.
    #[serde(default)]
    error: Option<WireError>,
}

#[derive(Deserialize)]
struct WireError {
    #[serde(default)]
    code: u16,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    fn into_checked(self) -> PortResult<Self> {
        match self.error {
            Some(error) => Err(PortError::Upstream {
                status: error.code,
                message: error.message,
            }),
            None => Ok(self),
        }
    }

    fn texts(&self) -> impl Iterator<Item = &str> {
        self.candidates
            .iter()
            .filter_map(|c| c.content.as_ref())
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.text.as_deref())
            .filter(|text| !text.is_empty())
    }

    /// A whole response: every text part, one per line.
    fn joined_text(&self) -> String {
        self.texts().collect::<Vec<_>>().join("\n")
    }

    /// One streamed chunk: its parts glued together as they arrived.
    fn chunk_text(&self) -> String {
        self.texts().collect()
    }
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `InferenceService` against Vertex AI.
#[derive(Clone)]
pub struct VertexAiAdapter {
    client: reqwest::Client,
    project_id: String,
    location: String,
    access_token: String,
}

impl VertexAiAdapter {
    /// Creates a new `VertexAiAdapter`.
    pub fn new(
        client: reqwest::Client,
        project_id: String,
        location: String,
        access_token: String,
    ) -> Self {
        Self {
            client,
            project_id,
            location,
            access_token,
        }
    }

    /// Full resource names pass through; bare ids are treated as Google publisher models.
    fn resource_name(&self, model: &str) -> String {
        let model = model.trim().trim_start_matches('/');
        if model.starts_with("projects/") {
            model.to_string()
        } else if model.starts_with("publishers/") {
            format!("projects/{}/locations/{}/{}", self.project_id, self.location, model)
        } else {
            format!(
                "projects/{}/locations/{}/publishers/google/models/{}",
                self.project_id, self.location, model
            )
        }
    }

    fn method_url(&self, model: &str, method: &str) -> String {
        format!(
            "https://{}-aiplatform.googleapis.com/v1/{}:{}",
            self.location,
            self.resource_name(model),
            method
        )
    }

    async fn post(&self, url: String, request: &GenerationRequest) -> PortResult<reqwest::Response> {
        let body = GenerateContentRequest::from_request(request);
        debug!(%url, "Calling Vertex AI");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let text = response.text().await.unwrap_or_default();
        Err(status_error(status, &vertex_error_message(&text)))
    }
}

//=========================================================================================
// `InferenceService` Trait Implementation
//=========================================================================================

#[async_trait]
impl InferenceService for VertexAiAdapter {
    async fn generate(&self, model: &str, request: &GenerationRequest) -> PortResult<String> {
        let url = self.method_url(model, "generateContent");
        let response = self.post(url, request).await?;

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to parse response JSON: {}", e)))?;

        Ok(parsed.into_checked()?.joined_text())
    }

    async fn generate_streaming(
        &self,
        model: &str,
        request: &GenerationRequest,
    ) -> PortResult<TextStream> {
        let url = format!("{}?alt=sse", self.method_url(model, "streamGenerateContent"));
        let response = self.post(url, request).await?;
        Ok(sse_text_stream(response.bytes_stream()))
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Pulls `error.message` out of a Google API error body, falling back to the raw body.
fn vertex_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

/// Turns a server-sent-event byte stream into the text of each `data:` chunk.
/// Lines may be split across network reads.
fn sse_text_stream<S, E>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(stream! {
        let mut buffer: Vec<u8> = Vec::new();

        for await chunk in bytes {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(PortError::Unexpected(format!("Stream interrupted: {}", e)));
                    return;
                }
            };
            buffer.extend_from_slice(&chunk);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                match parse_sse_line(&line) {
                    Ok(Some(text)) => yield Ok(text),
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }
        }

        match parse_sse_line(&buffer) {
            Ok(Some(text)) => yield Ok(text),
            Ok(None) => {}
            Err(e) => yield Err(e),
        }
    })
}

fn parse_sse_line(line: &[u8]) -> PortResult<Option<String>> {
    let line = String::from_utf8_lossy(line);
    let Some(data) = line.trim().strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return Ok(None);
    }

    let chunk = serde_json::from_str::<GenerateContentResponse>(data)
        .map_err(|e| PortError::Unexpected(format!("Malformed stream chunk: {}", e)))?
        .into_checked()?;
    let text = chunk.chunk_text();
    Ok((!text.is_empty()).then_some(text))
}
