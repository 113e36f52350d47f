//! Shared error types.

use thiserror::Error;

/// Failure to decode or encode a chat protocol frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("frame has no `type` discriminator")]
    MissingType,
    #[error("`{kind}` frame has an invalid body: {source}")]
    InvalidBody {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}
