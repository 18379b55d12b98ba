//! crates/feedback_core/src/writer.rs
//!
//! The Submission Writer: names a record under a date-partitioned key and
//! uploads it as one JSON object.

use crate::domain::SubmissionRecord;
use crate::ports::{ObjectStorage, PortError, PortResult, StoredObject};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// How the last key segment is made unique within a UTC day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeySuffix {
    /// Ten random hex characters.
    #[default]
    RandomHex,
    /// The record's timestamp followed by eight random hex characters.
    TimestampRandom,
}

impl FromStr for KeySuffix {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random_hex" => Ok(KeySuffix::RandomHex),
            "timestamp_random" => Ok(KeySuffix::TimestampRandom),
            other => Err(format!(
                "'{}' is not a key suffix (expected random_hex or timestamp_random)",
                other
            )),
        }
    }
}

#[derive(Clone)]
pub struct SubmissionWriter {
    storage: Arc<dyn ObjectStorage>,
    prefix: String,
    suffix: KeySuffix,
}

impl SubmissionWriter {
    /// `prefix` is stored without surrounding whitespace or slashes.
    pub fn new(storage: Arc<dyn ObjectStorage>, prefix: &str, suffix: KeySuffix) -> Self {
        Self {
            storage,
            prefix: prefix.trim().trim_matches('/').to_string(),
            suffix,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `{prefix}/{YYYY-MM-DD}/{suffix}.json`, dated by the record's own timestamp.
    pub fn key_for(&self, record: &SubmissionRecord) -> String {
        let timestamp = record.timestamp();
        let day = timestamp.format("%Y-%m-%d");
        let token = random_hex();
        let unique = match self.suffix {
            KeySuffix::RandomHex => token[..10].to_string(),
            KeySuffix::TimestampRandom => {
                format!("{}-{}", timestamp.format("%Y%m%dT%H%M%SZ"), &token[..8])
            }
        };

        if self.prefix.is_empty() {
            format!("{}/{}.json", day, unique)
        } else {
            format!("{}/{}/{}.json", self.prefix, day, unique)
        }
    }

    /// Writes the record once and returns its key. Upload failures are returned as-is.
    pub async fn submit(&self, record: &SubmissionRecord) -> PortResult<String> {
        let key = self.key_for(record);
        let body = encode_record(record)?;
        let bytes = body.len();

        self.storage
            .put_object(StoredObject::json(key.clone(), body))
            .await?;

        info!(key = %key, bytes, "Submission stored");
        Ok(key)
    }
}

/// Pretty-printed UTF-8 JSON; non-ASCII text is written as-is.
pub fn encode_record(record: &SubmissionRecord) -> PortResult<Vec<u8>> {
    serde_json::to_vec_pretty(record).map_err(|e| PortError::Unexpected(e.to_string()))
}

fn random_hex() -> String {
    Uuid::new_v4().simple().to_string()
}
