//! crates/feedback_core/src/testing.rs
//!
//! In-memory port implementations for unit and router tests.

use crate::domain::GenerationRequest;
use crate::ports::{
    InferenceService, ObjectStorage, PortError, PortResult, StoredObject, TextStream,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// What a scripted model returns for one kind of call.
#[derive(Debug, Clone)]
pub enum Scripted {
    Text(String),
    Fragments(Vec<String>),
    /// Yields the fragments, then fails before the stream ends.
    BrokenStream(Vec<String>, String),
    Fail(String),
}

/// Which call the generator made: `(model, streaming)`.
pub type InferenceCall = (String, bool);

/// Returns canned responses per `(model, streaming)` pair and records every call.
/// Unscripted calls fail.
#[derive(Default)]
pub struct ScriptedInference {
    script: HashMap<InferenceCall, Scripted>,
    calls: Mutex<Vec<InferenceCall>>,
}

impl ScriptedInference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_stream(mut self, model: &str, response: Scripted) -> Self {
        self.script.insert((model.to_string(), true), response);
        self
    }

    pub fn on_sync(mut self, model: &str, response: Scripted) -> Self {
        self.script.insert((model.to_string(), false), response);
        self
    }

    pub fn calls(&self) -> Vec<InferenceCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn lookup(&self, model: &str, streaming: bool) -> PortResult<Scripted> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((model.to_string(), streaming));
        }
        self.script
            .get(&(model.to_string(), streaming))
            .cloned()
            .ok_or_else(|| PortError::Unexpected(format!("no scripted response for {}", model)))
    }
}

#[async_trait]
impl InferenceService for ScriptedInference {
    async fn generate(&self, model: &str, _request: &GenerationRequest) -> PortResult<String> {
        match self.lookup(model, false)? {
            Scripted::Text(text) => Ok(text),
            Scripted::Fragments(parts) => Ok(parts.concat()),
            Scripted::BrokenStream(_, message) | Scripted::Fail(message) => {
                Err(PortError::Unexpected(message))
            }
        }
    }

    async fn generate_streaming(
        &self,
        model: &str,
        _request: &GenerationRequest,
    ) -> PortResult<TextStream> {
        let items: Vec<PortResult<String>> = match self.lookup(model, true)? {
            Scripted::Text(text) => vec![Ok(text)],
            Scripted::Fragments(parts) => parts.into_iter().map(Ok).collect(),
            Scripted::BrokenStream(parts, message) => parts
                .into_iter()
                .map(Ok)
                .chain(std::iter::once(Err(PortError::Unexpected(message))))
                .collect(),
            Scripted::Fail(message) => return Err(PortError::Unexpected(message)),
        };
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

/// Keeps uploaded objects in memory, or rejects every upload when built with `failing`.
#[derive(Default)]
pub struct MemoryStorage {
    objects: Mutex<Vec<StoredObject>>,
    failure: Option<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            objects: Mutex::new(Vec::new()),
            failure: Some(message.to_string()),
        }
    }

    pub fn objects(&self) -> Vec<StoredObject> {
        self.objects.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn put_object(&self, object: StoredObject) -> PortResult<()> {
        if let Some(message) = &self.failure {
            return Err(PortError::Upstream {
                status: 403,
                message: message.clone(),
            });
        }
        self.objects
            .lock()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .push(object);
        Ok(())
    }
}
