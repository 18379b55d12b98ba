pub mod gcs;
pub mod vertex_llm;

pub use gcs::GcsStorageAdapter;
pub use vertex_llm::VertexAiAdapter;

use feedback_core::PortError;
use reqwest::StatusCode;

/// Maps a non-success HTTP status from a Google API onto a port error.
pub(crate) fn status_error(status: StatusCode, message: &str) -> PortError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            PortError::Unauthorized(format!("{}: {}", status, message))
        }
        _ => PortError::Upstream {
            status: status.as_u16(),
            message: message.to_string(),
        },
    }
}
