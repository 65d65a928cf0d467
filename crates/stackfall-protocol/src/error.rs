//! Error types for the protocol layer.

/// Errors raised while turning frames into values and back.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A value could not be serialized.
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Bytes were not valid JSON or did not match the expected shape.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame parsed but names an event no route handles.
    #[error("unknown event: {0}")]
    UnknownEvent(String),
}
