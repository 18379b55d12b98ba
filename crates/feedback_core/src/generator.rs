//! crates/feedback_core/src/generator.rs
//!
//! The Response Generator: runs the fallback chain against the inference port
//! until one route yields non-empty text.

use crate::domain::{
    Attempt, AttemptOutcome, ChainOrder, Generation, GenerationConfig, GenerationRequest, Prompt,
    Route,
};
use crate::ports::{InferenceService, PortResult};
use futures::StreamExt;
use std::sync::Arc;
use tracing::{info, warn};

/// The model identifiers the chain can target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelTargets {
    /// The designated tuned endpoint.
    pub tuned: String,
    /// The generic base model used as a last resort.
    pub fallback: String,
}

#[derive(Clone)]
pub struct ResponseGenerator {
    inference: Arc<dyn InferenceService>,
    targets: ModelTargets,
    order: ChainOrder,
    config: GenerationConfig,
}

impl ResponseGenerator {
    pub fn new(
        inference: Arc<dyn InferenceService>,
        targets: ModelTargets,
        order: ChainOrder,
        config: GenerationConfig,
    ) -> Self {
        Self {
            inference,
            targets,
            order,
            config,
        }
    }

    pub fn designated_model(&self) -> &str {
        &self.targets.tuned
    }

    /// Whether `model` is one this generator can produce drafts from.
    pub fn targets_model(&self, model: &str) -> bool {
        model == self.targets.tuned || model == self.targets.fallback
    }

    /// Tries each route in order and stops at the first non-empty, trimmed result.
    ///
    /// Never fails: route errors land in the trace, and when nothing produced text
    /// the returned `Generation` is empty.
    pub async fn generate(&self, prompt: &Prompt) -> Generation {
        let request = GenerationRequest::user_turn(prompt, self.config.clone());
        let routes = self.order.routes();
        let mut trace = Vec::with_capacity(routes.len());

        for &route in routes {
            let model = self.model_for(route);
            match self.attempt(route, model, &request).await {
                Ok(raw) => {
                    let text = raw.trim();
                    let produced = !text.is_empty();
                    info!(?route, model, produced, "Generation attempt finished");
                    trace.push(Attempt {
                        name: route,
                        model: model.to_string(),
                        outcome: AttemptOutcome::Ok(produced),
                    });
                    if produced {
                        return Generation {
                            text: text.to_string(),
                            model: Some(model.to_string()),
                            trace,
                        };
                    }
                }
                Err(e) => {
                    warn!(?route, model, error = %e, "Generation attempt failed");
                    trace.push(Attempt {
                        name: route,
                        model: model.to_string(),
                        outcome: AttemptOutcome::Error(e.to_string()),
                    });
                }
            }
        }

        warn!(attempts = trace.len(), "Every generation route came back empty");
        Generation {
            text: String::new(),
            model: None,
            trace,
        }
    }

    fn model_for(&self, route: Route) -> &str {
        if route.uses_fallback_model() {
            &self.targets.fallback
        } else {
            &self.targets.tuned
        }
    }

    async fn attempt(
        &self,
        route: Route,
        model: &str,
        request: &GenerationRequest,
    ) -> PortResult<String> {
        if !route.is_streaming() {
            return self.inference.generate(model, request).await;
        }

        // Consumed to completion; an error mid-stream abandons the whole attempt.
        let mut stream = self.inference.generate_streaming(model, request).await?;
        let mut text = String::new();
        while let Some(fragment) = stream.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}
