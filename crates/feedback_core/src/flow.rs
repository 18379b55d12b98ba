//! crates/feedback_core/src/flow.rs
//!
//! Composes the generator and writer into the two user actions: previewing a
//! draft and submitting a case. The draft is passed in by the caller rather than
//! kept here, so the flow itself holds no per-user state.

use crate::domain::{Draft, Generation, Prompt, PromptError, Provenance, SubmissionRecord};
use crate::generator::ResponseGenerator;
use crate::ports::PortError;
use crate::writer::SubmissionWriter;
use chrono::Utc;
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Consent is required before a case can be submitted.")]
    ConsentRequired,
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error("Failed to store the submission: {0}")]
    Storage(#[source] PortError),
}

/// Fixed metadata stamped onto every record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionMetadata {
    pub provenance: Provenance,
    pub version: String,
}

/// A record that made it to storage.
#[derive(Debug, Clone)]
pub struct Submitted {
    pub storage_key: String,
    pub record: SubmissionRecord,
}

#[derive(Clone)]
pub struct FeedbackFlow {
    generator: ResponseGenerator,
    writer: SubmissionWriter,
    metadata: SubmissionMetadata,
}

impl FeedbackFlow {
    pub fn new(
        generator: ResponseGenerator,
        writer: SubmissionWriter,
        metadata: SubmissionMetadata,
    ) -> Self {
        Self {
            generator,
            writer,
            metadata,
        }
    }

    /// Generates a draft for the preview action.
    pub async fn preview(&self, raw_prompt: &str) -> Result<Generation, FlowError> {
        let prompt = Prompt::parse(raw_prompt)?;
        let generation = self.generator.generate(&prompt).await;
        if generation.is_empty() {
            warn!(attempts = generation.trace.len(), "Preview produced an empty draft");
        }
        Ok(generation)
    }

    /// Stores a submission, reusing `draft` when it has text and generating one otherwise.
    ///
    /// A successful call consumes the draft; the caller has nothing left to clear.
    pub async fn submit(
        &self,
        raw_prompt: &str,
        consent: bool,
        draft: Option<Draft>,
    ) -> Result<Submitted, FlowError> {
        if !consent {
            return Err(FlowError::ConsentRequired);
        }
        let prompt = Prompt::parse(raw_prompt)?;

        let supplied = draft
            .map(|d| Draft {
                text: d.text.trim().to_string(),
                model: d.model,
            })
            .filter(|d| !d.text.is_empty());
        let draft = match supplied {
            Some(draft) => draft,
            None => {
                info!("No draft supplied, generating one for the submission");
                self.generator.generate(&prompt).await.into_draft()
            }
        };
        // A caller-held draft may name any model; only configured targets are recorded.
        let used_model = draft
            .model
            .filter(|model| self.generator.targets_model(model))
            .unwrap_or_else(|| self.generator.designated_model().to_string());

        let record = SubmissionRecord::new(
            Utc::now(),
            prompt,
            draft.text,
            used_model,
            self.metadata.provenance.clone(),
            self.metadata.version.clone(),
        );

        let storage_key = self
            .writer
            .submit(&record)
            .await
            .map_err(FlowError::Storage)?;

        Ok(Submitted {
            storage_key,
            record,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChainOrder, GenerationConfig, RECORD_VERSION};
    use crate::generator::ModelTargets;
    use crate::testing::{MemoryStorage, Scripted, ScriptedInference};
    use crate::writer::KeySuffix;
    use std::sync::Arc;

    const TUNED: &str = "projects/p/locations/us-central1/endpoints/42";
    const BASE: &str = "gemini-1.5-pro-002";
    const PROMPT: &str = "학생이 숙제를 미룹니다";

    fn flow(inference: Arc<ScriptedInference>, storage: Arc<MemoryStorage>) -> FeedbackFlow {
        let generator = ResponseGenerator::new(
            inference,
            ModelTargets {
                tuned: TUNED.to_string(),
                fallback: BASE.to_string(),
            },
            ChainOrder::StreamingFirst,
            GenerationConfig::default(),
        );
        let writer = SubmissionWriter::new(storage, "raw_submissions", KeySuffix::RandomHex);
        FeedbackFlow::new(
            generator,
            writer,
            SubmissionMetadata {
                provenance: Provenance::SourceApp("public".to_string()),
                version: RECORD_VERSION.to_string(),
            },
        )
    }

    fn stored_json(storage: &MemoryStorage) -> serde_json::Value {
        let objects = storage.objects();
        assert_eq!(objects.len(), 1);
        serde_json::from_slice(&objects[0].body).unwrap()
    }

    #[tokio::test]
    async fn preview_then_submit_reuses_the_draft() {
        let inference = Arc::new(
            ScriptedInference::new().on_stream(TUNED, Scripted::Text("함께 계획을 세워 보세요.".to_string())),
        );
        let storage = Arc::new(MemoryStorage::new());
        let flow = flow(inference.clone(), storage.clone());

        let generation = flow.preview(PROMPT).await.unwrap();
        assert_eq!(generation.text, "함께 계획을 세워 보세요.");
        let draft = generation.into_draft();

        let submitted = flow.submit(PROMPT, true, Some(draft)).await.unwrap();

        // Only the preview touched the model.
        assert_eq!(inference.calls().len(), 1);

        let today = Utc::now().format("%Y-%m-%d").to_string();
        let prefix = format!("raw_submissions/{}/", today);
        assert!(submitted.storage_key.starts_with(&prefix));
        assert!(submitted.storage_key.ends_with(".json"));

        let json = stored_json(&storage);
        assert_eq!(json["prompt"], PROMPT);
        assert_eq!(json["ai_response"], "함께 계획을 세워 보세요.");
        assert_eq!(json["used_model"], TUNED);
        assert_eq!(json["source_app"], "public");
        assert_eq!(json["version"], "v1");
        assert!(json["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn submit_without_draft_generates_on_demand() {
        let inference = Arc::new(
            ScriptedInference::new()
                .on_stream(TUNED, Scripted::Fail("stream refused".to_string()))
                .on_sync(TUNED, Scripted::Text("sync answer".to_string())),
        );
        let storage = Arc::new(MemoryStorage::new());

        flow(inference.clone(), storage.clone())
            .submit(PROMPT, true, None)
            .await
            .unwrap();

        assert_eq!(inference.calls().len(), 2);
        assert_eq!(stored_json(&storage)["ai_response"], "sync answer");
    }

    #[tokio::test]
    async fn blank_draft_is_regenerated() {
        let inference = Arc::new(
            ScriptedInference::new().on_stream(TUNED, Scripted::Text("fresh".to_string())),
        );
        let storage = Arc::new(MemoryStorage::new());
        let stale = Draft {
            text: "  ".to_string(),
            model: None,
        };

        flow(inference, storage.clone())
            .submit(PROMPT, true, Some(stale))
            .await
            .unwrap();

        assert_eq!(stored_json(&storage)["ai_response"], "fresh");
    }

    #[tokio::test]
    async fn supplied_draft_is_stored_trimmed() {
        let inference = Arc::new(ScriptedInference::new());
        let storage = Arc::new(MemoryStorage::new());
        let draft = Draft {
            text: "\n  함께 계획을 세워 보세요.  \n".to_string(),
            model: Some(BASE.to_string()),
        };

        flow(inference.clone(), storage.clone())
            .submit(PROMPT, true, Some(draft))
            .await
            .unwrap();

        assert!(inference.calls().is_empty());
        let json = stored_json(&storage);
        assert_eq!(json["ai_response"], "함께 계획을 세워 보세요.");
        assert_eq!(json["used_model"], BASE);
    }

    #[tokio::test]
    async fn unknown_draft_model_falls_back_to_designated_model() {
        let inference = Arc::new(ScriptedInference::new());
        let storage = Arc::new(MemoryStorage::new());
        let draft = Draft {
            text: "anything".to_string(),
            model: Some("not-a-real-model".to_string()),
        };

        let submitted = flow(inference, storage.clone())
            .submit(PROMPT, true, Some(draft))
            .await
            .unwrap();

        assert_eq!(submitted.record.used_model(), TUNED);
        assert_eq!(stored_json(&storage)["used_model"], TUNED);
    }

    #[tokio::test]
    async fn failed_generation_still_submits_an_empty_response() {
        let inference = Arc::new(ScriptedInference::new());
        let storage = Arc::new(MemoryStorage::new());

        let submitted = flow(inference, storage.clone())
            .submit(PROMPT, true, None)
            .await
            .unwrap();

        assert_eq!(submitted.record.ai_response(), "");
        let json = stored_json(&storage);
        assert_eq!(json["ai_response"], "");
        assert_eq!(json["used_model"], TUNED);
    }

    #[tokio::test]
    async fn consent_is_checked_before_anything_else() {
        let inference = Arc::new(ScriptedInference::new());
        let storage = Arc::new(MemoryStorage::new());
        let flow = flow(inference.clone(), storage.clone());

        let err = flow.submit("", false, None).await.unwrap_err();
        assert!(matches!(err, FlowError::ConsentRequired));
        assert!(inference.calls().is_empty());
        assert!(storage.objects().is_empty());
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected() {
        let inference = Arc::new(ScriptedInference::new());
        let storage = Arc::new(MemoryStorage::new());
        let flow = flow(inference.clone(), storage.clone());

        assert!(matches!(
            flow.preview("   ").await,
            Err(FlowError::Prompt(PromptError::Empty))
        ));
        assert!(matches!(
            flow.submit("\n", true, None).await,
            Err(FlowError::Prompt(PromptError::Empty))
        ));
        assert!(inference.calls().is_empty());
    }

    #[tokio::test]
    async fn storage_failure_surfaces_as_storage_error() {
        let inference = Arc::new(
            ScriptedInference::new().on_stream(TUNED, Scripted::Text("draft".to_string())),
        );
        let storage = Arc::new(MemoryStorage::failing("permission denied"));

        let err = flow(inference, storage)
            .submit(PROMPT, true, None)
            .await
            .unwrap_err();

        match err {
            FlowError::Storage(source) => assert!(source.to_string().contains("permission denied")),
            other => panic!("expected a storage error, got {:?}", other),
        }
    }
}
