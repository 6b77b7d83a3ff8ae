use std::time::Duration;

/// Limits applied to every accepted client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Largest frame a client may send, in bytes. Game messages are small
    /// JSON objects, so anything near this limit is garbage.
    pub max_message_size: usize,
    /// How long a client may take to finish the WebSocket upgrade.
    pub handshake_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_message_size: 16 * 1024,
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

impl TransportConfig {
    #[cfg(feature = "websocket")]
    pub(crate) fn websocket(&self) -> tokio_tungstenite::tungstenite::protocol::WebSocketConfig {
        let mut config = tokio_tungstenite::tungstenite::protocol::WebSocketConfig::default();
        config.max_message_size = Some(self.max_message_size);
        config.max_frame_size = Some(self.max_message_size);
        config
    }
}
