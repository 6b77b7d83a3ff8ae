//! Turning frames into messages and back.
//!
//! The server only ever decodes [`ClientMessage`]s and encodes
//! [`ServerMessage`]s, so the [`Codec`] trait is typed to exactly that.

use crate::{ClientMessage, ProtocolError, ServerMessage};

/// The server's side of the wire format.
///
/// One codec is shared by every connection task, hence `Send + Sync`.
pub trait Codec: Send + Sync + 'static {
    fn encode(&self, msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError>;

    /// # Errors
    ///
    /// [`ProtocolError::UnknownKind`] when the frame is a well-formed
    /// envelope whose `name` is not a client message, otherwise
    /// [`ProtocolError::Decode`].
    fn decode(&self, frame: &[u8]) -> Result<ClientMessage, ProtocolError>;
}

/// `{"name": ..., "data": ...}` JSON, what browser clients speak.
///
/// ```rust
/// use nightfall_protocol::{ClientMessage, Codec, JsonCodec};
///
/// let msg = JsonCodec
///     .decode(br#"{"name":"join-room","data":{"username":"ada"}}"#)
///     .unwrap();
///
/// assert_eq!(msg, ClientMessage::JoinRoom { username: "ada".into() });
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode(&self, msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(msg).map_err(ProtocolError::Encode)
    }

    fn decode(&self, frame: &[u8]) -> Result<ClientMessage, ProtocolError> {
        serde_json::from_slice(frame).map_err(|e| {
            #[derive(serde::Deserialize)]
            struct Envelope {
                name: String,
            }
            match serde_json::from_slice::<Envelope>(frame) {
                Ok(Envelope { name }) if !ClientMessage::KINDS.contains(&name.as_str()) => {
                    ProtocolError::UnknownKind(name)
                }
                _ => ProtocolError::Decode(e),
            }
        })
    }
}
