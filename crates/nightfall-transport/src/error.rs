use std::net::SocketAddr;

/// Errors from the socket layer.
///
/// None of these reach game logic. The server logs them and drops the
/// connection; only [`Bind`](Self::Bind) stops startup.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind listener: {0}")]
    Bind(#[source] std::io::Error),

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    /// The client connected but the WebSocket upgrade failed.
    #[error("handshake with {peer} failed: {reason}")]
    Handshake { peer: SocketAddr, reason: String },

    #[error("handshake with {0} timed out")]
    HandshakeTimeout(SocketAddr),

    /// The client sent a frame above the configured limit.
    #[error("message exceeds {0} bytes")]
    MessageTooLarge(usize),

    #[error("connection closed")]
    Closed,

    #[error("send failed: {0}")]
    Send(String),

    #[error("receive failed: {0}")]
    Receive(String),
}

impl TransportError {
    /// Whether the listener itself is in trouble, as opposed to one client.
    pub fn is_listener_error(&self) -> bool {
        matches!(self, Self::Bind(_) | Self::Accept(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_bind_and_accept_are_listener_errors() {
        let io = || std::io::Error::other("boom");
        let peer: SocketAddr = ([127, 0, 0, 1], 9000).into();

        assert!(TransportError::Bind(io()).is_listener_error());
        assert!(TransportError::Accept(io()).is_listener_error());
        assert!(!TransportError::HandshakeTimeout(peer).is_listener_error());
        assert!(!TransportError::MessageTooLarge(16).is_listener_error());
        assert!(!TransportError::Closed.is_listener_error());
    }

    #[test]
    fn test_handshake_error_names_the_peer() {
        let err = TransportError::Handshake {
            peer: ([10, 0, 0, 2], 4000).into(),
            reason: "missing upgrade header".into(),
        };
        assert_eq!(
            err.to_string(),
            "handshake with 10.0.0.2:4000 failed: missing upgrade header"
        );
    }
}
