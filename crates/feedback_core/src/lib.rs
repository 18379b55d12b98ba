pub mod domain;
pub mod flow;
pub mod generator;
pub mod ports;
pub mod writer;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use domain::{
    Attempt, AttemptOutcome, ChainOrder, Draft, Generation, GenerationConfig, GenerationRequest,
    Prompt, PromptError, Provenance, Route, SubmissionRecord, RECORD_VERSION,
};
pub use flow::{FeedbackFlow, FlowError, SubmissionMetadata, Submitted};
pub use generator::{ModelTargets, ResponseGenerator};
pub use ports::{InferenceService, ObjectStorage, PortError, PortResult, StoredObject, TextStream};
pub use writer::{KeySuffix, SubmissionWriter};
