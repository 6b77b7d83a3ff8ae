//! WebSocket clients over `tokio-tungstenite`.
//!
//! Each accepted stream is split so a reader can sit in
//! [`Connection::recv`] while the player's writer task sends room output.
//! The upgrade runs inside [`Transport::accept`] under
//! [`TransportConfig::handshake_timeout`], so a client that stalls
//! mid-handshake holds the accept loop for a bounded time only.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::{Connection, ConnectionId, Transport, TransportConfig, TransportError};

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Listens for WebSocket clients.
pub struct WebSocketTransport {
    listener: TcpListener,
    config: TransportConfig,
}

impl WebSocketTransport {
    /// Binds with the default [`TransportConfig`].
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        Self::bind_with(addr, TransportConfig::default()).await
    }

    pub async fn bind_with(addr: &str, config: TransportConfig) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr).await.map_err(TransportError::Bind)?;
        tracing::info!(
            addr,
            max_message_size = config.max_message_size,
            "listening for WebSocket clients"
        );
        Ok(Self { listener, config })
    }

    /// The bound address, useful after binding port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Transport for WebSocketTransport {
    type Connection = WebSocketConnection;
    type Error = TransportError;

    async fn accept(&mut self) -> Result<WebSocketConnection, TransportError> {
        let (stream, peer) = self.listener.accept().await.map_err(TransportError::Accept)?;

        let upgrade =
            tokio_tungstenite::accept_async_with_config(stream, Some(self.config.websocket()));
        let ws = match tokio::time::timeout(self.config.handshake_timeout, upgrade).await {
            Ok(Ok(ws)) => ws,
            Ok(Err(e)) => {
                return Err(TransportError::Handshake {
                    peer,
                    reason: e.to_string(),
                });
            }
            Err(_) => return Err(TransportError::HandshakeTimeout(peer)),
        };

        let id = ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%id, %peer, "client upgraded to WebSocket");

        let (writer, reader) = ws.split();
        Ok(WebSocketConnection {
            id,
            peer,
            max_message_size: self.config.max_message_size,
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }
}

/// One WebSocket client.
pub struct WebSocketConnection {
    id: ConnectionId,
    peer: SocketAddr,
    max_message_size: usize,
    writer: Mutex<SplitSink<WebSocketStream<TcpStream>, Message>>,
    reader: Mutex<SplitStream<WebSocketStream<TcpStream>>>,
}

impl WebSocketConnection {
    fn send_error(e: tungstenite::Error) -> TransportError {
        match e {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                TransportError::Closed
            }
            other => TransportError::Send(other.to_string()),
        }
    }
}

impl Connection for WebSocketConnection {
    type Error = TransportError;

    /// JSON goes out as text frames, which is what browsers expect.
    /// Non-UTF-8 payloads fall back to binary.
    async fn send(&self, data: &[u8]) -> Result<(), TransportError> {
        let msg = match std::str::from_utf8(data) {
            Ok(text) => Message::text(text.to_owned()),
            Err(_) => Message::binary(data.to_vec()),
        };
        self.writer
            .lock()
            .await
            .send(msg)
            .await
            .map_err(Self::send_error)
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        let mut reader = self.reader.lock().await;
        loop {
            let frame = match reader.next().await {
                None => return Ok(None),
                Some(Ok(frame)) => frame,
                Some(Err(tungstenite::Error::Capacity(e))) => {
                    tracing::debug!(id = %self.id, error = %e, "oversized frame");
                    return Err(TransportError::MessageTooLarge(self.max_message_size));
                }
                Some(Err(
                    tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed,
                )) => return Ok(None),
                Some(Err(e)) => return Err(TransportError::Receive(e.to_string())),
            };
            match frame {
                Message::Text(text) => return Ok(Some(text.as_bytes().to_vec())),
                Message::Binary(data) => return Ok(Some(data.to_vec())),
                Message::Close(_) => return Ok(None),
                // ping/pong are answered by tungstenite
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.writer
            .lock()
            .await
            .close()
            .await
            .map_err(Self::send_error)
    }

    fn id(&self) -> ConnectionId {
        self.id
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}
