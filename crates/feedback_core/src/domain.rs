//! crates/feedback_core/src/domain.rs
//!
//! Defines the core data structures for the feedback collector.
//! The submission record is the only durable entity; everything else here lives
//! for the duration of a single user action.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::str::FromStr;

/// Schema version stamped onto every record.
pub const RECORD_VERSION: &str = "v1";

//=========================================================================================
// Prompt
//=========================================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromptError {
    #[error("The prompt is empty. Describe the student's situation first.")]
    Empty,
}

/// The user's description of a student's situation, trimmed and guaranteed non-blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Prompt(String);

impl Prompt {
    pub fn parse(raw: &str) -> Result<Self, PromptError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PromptError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//=========================================================================================
// Generation
//=========================================================================================

/// Sampling parameters sent with every generation request. Fixed per deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationConfig {
    pub max_output_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: Option<u32>,
    pub response_mime_type: Option<String>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_output_tokens: 2048,
            temperature: 0.7,
            top_p: 0.95,
            top_k: None,
            response_mime_type: None,
        }
    }
}

/// A single user turn with a single text part, plus the sampling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub text: String,
    pub config: GenerationConfig,
}

impl GenerationRequest {
    pub fn user_turn(prompt: &Prompt, config: GenerationConfig) -> Self {
        Self {
            text: prompt.as_str().to_string(),
            config,
        }
    }
}

/// One step of the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Route {
    /// The tuned model, consumed as a stream of fragments.
    TunedStream,
    /// The tuned model, one blocking call.
    TunedSync,
    /// The generic base model, one blocking call.
    BaseSync,
}

impl Route {
    pub fn is_streaming(self) -> bool {
        matches!(self, Route::TunedStream)
    }

    pub fn uses_fallback_model(self) -> bool {
        matches!(self, Route::BaseSync)
    }
}

/// The order in which routes are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainOrder {
    #[default]
    StreamingFirst,
    SyncFirst,
}

impl ChainOrder {
    pub fn routes(self) -> &'static [Route] {
        match self {
            ChainOrder::StreamingFirst => &[Route::TunedStream, Route::TunedSync, Route::BaseSync],
            ChainOrder::SyncFirst => &[Route::TunedSync, Route::BaseSync],
        }
    }
}

impl FromStr for ChainOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "streaming_first" => Ok(ChainOrder::StreamingFirst),
            "sync_first" => Ok(ChainOrder::SyncFirst),
            other => Err(format!(
                "'{}' is not a chain order (expected streaming_first or sync_first)",
                other
            )),
        }
    }
}

/// What happened on one attempted route. Serializes as `"ok": bool` or `"error": "..."`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Ok(bool),
    Error(String),
}

/// One entry of the diagnostic trace, in attempt order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub name: Route,
    pub model: String,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

/// The result of running the fallback chain. An empty `text` means every route failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub text: String,
    /// The model that produced `text`; `None` when `text` is empty.
    pub model: Option<String>,
    pub trace: Vec<Attempt>,
}

impl Generation {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn into_draft(self) -> Draft {
        Draft {
            text: self.text,
            model: self.model,
        }
    }
}

/// A generated candidate response held by the caller between preview and submit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Draft {
    pub text: String,
    pub model: Option<String>,
}

//=========================================================================================
// Submission Record
//=========================================================================================

/// The static provenance tag. Older deployments wrote `submitted_by`, newer ones `source_app`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    SourceApp(String),
    SubmittedBy(String),
}

impl Provenance {
    /// Builds a provenance tag from a field name (`source_app` or `submitted_by`).
    pub fn from_field(field: &str, tag: String) -> Result<Self, String> {
        match field.trim().to_ascii_lowercase().as_str() {
            "source_app" => Ok(Provenance::SourceApp(tag)),
            "submitted_by" => Ok(Provenance::SubmittedBy(tag)),
            other => Err(format!(
                "'{}' is not a provenance field (expected source_app or submitted_by)",
                other
            )),
        }
    }
}

/// One user submission as persisted to object storage. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionRecord {
    #[serde(serialize_with = "serialize_timestamp")]
    timestamp: DateTime<Utc>,
    prompt: Prompt,
    ai_response: String,
    used_model: String,
    #[serde(flatten)]
    provenance: Provenance,
    version: String,
}

impl SubmissionRecord {
    pub fn new(
        timestamp: DateTime<Utc>,
        prompt: Prompt,
        ai_response: String,
        used_model: String,
        provenance: Provenance,
        version: String,
    ) -> Self {
        Self {
            timestamp,
            prompt,
            ai_response,
            used_model,
            provenance,
            version,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    pub fn ai_response(&self) -> &str {
        &self.ai_response
    }

    pub fn used_model(&self) -> &str {
        &self.used_model
    }

    pub fn provenance(&self) -> &Provenance {
        &self.provenance
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

// Second precision with a `Z` suffix, e.g. 2026-10-16T08:31:07Z.
fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Secs, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn prompt_is_trimmed() {
        let prompt = Prompt::parse("  학생이 숙제를 미룹니다 \n").unwrap();
        assert_eq!(prompt.as_str(), "학생이 숙제를 미룹니다");
    }

    #[test]
    fn blank_prompt_is_rejected() {
        assert_eq!(Prompt::parse(""), Err(PromptError::Empty));
        assert_eq!(Prompt::parse(" \t\n "), Err(PromptError::Empty));
    }

    #[test]
    fn chain_orders_parse() {
        assert_eq!("streaming_first".parse(), Ok(ChainOrder::StreamingFirst));
        assert_eq!(" SYNC_FIRST ".parse(), Ok(ChainOrder::SyncFirst));
        assert!("random".parse::<ChainOrder>().is_err());
        assert_eq!(ChainOrder::StreamingFirst.routes().len(), 3);
        assert_eq!(ChainOrder::SyncFirst.routes(), &[Route::TunedSync, Route::BaseSync]);
    }

    #[test]
    fn attempt_serializes_flat() {
        let ok = Attempt {
            name: Route::TunedStream,
            model: "tuned".to_string(),
            outcome: AttemptOutcome::Ok(false),
        };
        assert_eq!(
            serde_json::to_value(&ok).unwrap(),
            serde_json::json!({ "name": "tuned-stream", "model": "tuned", "ok": false })
        );

        let failed = Attempt {
            name: Route::BaseSync,
            model: "base".to_string(),
            outcome: AttemptOutcome::Error("quota exceeded".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            serde_json::json!({ "name": "base-sync", "model": "base", "error": "quota exceeded" })
        );
    }

    #[test]
    fn record_serializes_in_declared_order() {
        let record = SubmissionRecord::new(
            Utc.with_ymd_and_hms(2026, 10, 16, 8, 31, 7).unwrap(),
            Prompt::parse("학생이 숙제를 미룹니다").unwrap(),
            "차분하게 이야기해 보세요.".to_string(),
            "projects/p/locations/us-central1/endpoints/42".to_string(),
            Provenance::SourceApp("public".to_string()),
            RECORD_VERSION.to_string(),
        );

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"timestamp":"2026-10-16T08:31:07Z","prompt":"학생이 숙제를 미룹니다","ai_response":"차분하게 이야기해 보세요.","used_model":"projects/p/locations/us-central1/endpoints/42","source_app":"public","version":"v1"}"#
        );
    }

    #[test]
    fn provenance_field_selects_key() {
        let tag = Provenance::from_field("submitted_by", "public".to_string()).unwrap();
        assert_eq!(tag, Provenance::SubmittedBy("public".to_string()));
        assert!(Provenance::from_field("author", "public".to_string()).is_err());
    }
}
