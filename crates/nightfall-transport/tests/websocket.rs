//! Integration tests for the WebSocket transport.
//!
//! These bind a real listener on an OS-assigned port and talk to it with a
//! real `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use nightfall_transport::{
        Connection, Transport, TransportConfig, TransportError, WebSocketConnection,
        WebSocketTransport,
    };
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn connected_pair_with(config: TransportConfig) -> (WebSocketConnection, ClientWs) {
        let mut transport = WebSocketTransport::bind_with("127.0.0.1:0", config)
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address");

        let server_handle =
            tokio::spawn(async move { transport.accept().await.expect("should accept") });

        let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        let server = server_handle.await.expect("task should complete");
        (server, client)
    }

    async fn connected_pair() -> (WebSocketConnection, ClientWs) {
        connected_pair_with(TransportConfig::default()).await
    }

    /// A listener whose accept runs on a task, plus its address.
    async fn accepting(
        config: TransportConfig,
    ) -> (
        std::net::SocketAddr,
        tokio::task::JoinHandle<Result<WebSocketConnection, TransportError>>,
    ) {
        let mut transport = WebSocketTransport::bind_with("127.0.0.1:0", config)
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address");
        (addr, tokio::spawn(async move { transport.accept().await }))
    }

    // =====================================================================
    // Frames
    // =====================================================================

    #[tokio::test]
    async fn test_json_flows_both_directions() {
        let (server_conn, mut client_ws) = connected_pair().await;
        assert!(server_conn.id().into_inner() > 0);
        assert!(server_conn.peer_addr().ip().is_loopback());

        server_conn
            .send(br#"{"name":"voting-disabled"}"#)
            .await
            .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert!(msg.is_text(), "JSON goes out as text frames");
        assert_eq!(msg.into_data().as_ref(), br#"{"name":"voting-disabled"}"#);

        client_ws
            .send(Message::text(r#"{"name":"disconnect"}"#.to_owned()))
            .await
            .unwrap();

        let received = server_conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(received, br#"{"name":"disconnect"}"#);

        server_conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_send_while_recv_pending() {
        let (server_conn, mut client_ws) = connected_pair().await;
        let server_conn = Arc::new(server_conn);

        let reader = Arc::clone(&server_conn);
        let pending_recv = tokio::spawn(async move { reader.recv().await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        tokio::time::timeout(Duration::from_secs(2), server_conn.send(b"phase"))
            .await
            .expect("send must not block behind recv")
            .expect("send should succeed");

        let msg = client_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"phase");

        client_ws.send(Message::Close(None)).await.unwrap();
        let result = pending_recv.await.unwrap().expect("recv should not error");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_client_close() {
        let (server_conn, mut client_ws) = connected_pair().await;

        client_ws.send(Message::Close(None)).await.unwrap();

        let result = server_conn.recv().await.expect("recv should not error");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_oversized_frame_is_rejected() {
        let config = TransportConfig {
            max_message_size: 1024,
            ..TransportConfig::default()
        };
        let (server_conn, mut client_ws) = connected_pair_with(config).await;

        client_ws
            .send(Message::text("x".repeat(4096)))
            .await
            .unwrap();

        let err = server_conn.recv().await.expect_err("frame is over the limit");
        assert!(matches!(err, TransportError::MessageTooLarge(1024)), "got {err:?}");
    }

    // =====================================================================
    // Handshake
    // =====================================================================

    #[tokio::test]
    async fn test_stalled_handshake_times_out() {
        let config = TransportConfig {
            handshake_timeout: Duration::from_millis(100),
            ..TransportConfig::default()
        };
        let (addr, accept) = accepting(config).await;

        let _silent = TcpStream::connect(addr).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), accept)
            .await
            .expect("accept should give up")
            .unwrap();
        assert!(matches!(result, Err(TransportError::HandshakeTimeout(_))));
    }

    #[tokio::test]
    async fn test_plain_http_request_fails_handshake() {
        let (addr, accept) = accepting(TransportConfig::default()).await;

        let mut raw = TcpStream::connect(addr).await.unwrap();
        raw.write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();

        let result = tokio::time::timeout(Duration::from_secs(2), accept)
            .await
            .expect("accept should finish")
            .unwrap();
        match result {
            Err(TransportError::Handshake { peer, .. }) => assert!(peer.ip().is_loopback()),
            Err(other) => panic!("expected handshake error, got {other:?}"),
            Ok(_) => panic!("plain HTTP must not upgrade"),
        }
    }
}
