/// A frame could not be turned into a message, or a message arrived where
/// it makes no sense. Never a networking or rules problem.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Malformed JSON, or a known `name` with missing or mistyped `data`.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    #[error("unknown message kind {0:?}")]
    UnknownKind(String),

    /// Well-formed but out of place, e.g. `chat-message` before `join-room`.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
