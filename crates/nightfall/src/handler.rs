//! Per-connection handler: join, then route input until the socket closes.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `join-room` → seat the player in a room
//!   2. Spawn a writer task draining the player's outbound channel
//!   3. Loop: decode client frames → forward them to the room actor
//!   4. On close or `disconnect` → leave the room

use std::sync::Arc;

use nightfall_protocol::{ClientMessage, Codec, PlayerId, ProtocolError, ServerMessage};
use nightfall_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::NightfallError;
use crate::server::ServerState;

/// Drop guard that removes the player from their room when the handler
/// exits.
///
/// This ensures cleanup happens even if the handler panics. Since `Drop`
/// is synchronous, we spawn a fire-and-forget task for the async lock.
struct RoomGuard {
    player_id: PlayerId,
    state: Arc<ServerState>,
}

impl Drop for RoomGuard {
    fn drop(&mut self) {
        let player_id = self.player_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut rooms = state.rooms.lock().await;
            if let Err(e) = rooms.leave_room(player_id).await {
                tracing::debug!(%player_id, error = %e, "leave on disconnect failed");
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), NightfallError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    let player_id = PlayerId(conn_id.into_inner());
    tracing::debug!(%conn_id, %player_id, peer = %conn.peer_addr(), "handling new connection");

    // --- Step 1: join-room ---
    let username = match await_join(&conn, &state).await {
        Ok(username) => username,
        Err(e) => {
            let _ = conn.close().await;
            return Err(e);
        }
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let joined = {
        let mut rooms = state.rooms.lock().await;
        rooms.join_or_create(player_id, &username, tx).await
    };
    let (room_id, seat) = match joined {
        Ok(joined) => joined,
        Err(e) => {
            send_text(&conn, &state, &format!("Could not join: {e}")).await?;
            let _ = conn.close().await;
            return Err(e.into());
        }
    };
    let _guard = RoomGuard {
        player_id,
        state: Arc::clone(&state),
    };
    tracing::info!(%player_id, %room_id, %seat, %username, "player seated");

    // Cached so routine input does not lock the manager.
    let handle = state.rooms.lock().await.handle_for(player_id)?.clone();

    // --- Step 2: writer ---
    let mut writer = tokio::spawn(write_loop(Arc::clone(&conn), rx, Arc::clone(&state)));

    // --- Step 3: reader ---
    loop {
        let data = tokio::select! {
            received = conn.recv() => match received {
                Ok(Some(data)) => data,
                Ok(None) => {
                    tracing::info!(%player_id, "connection closed cleanly");
                    break;
                }
                Err(e) => {
                    tracing::debug!(%player_id, error = %e, "recv error");
                    break;
                }
            },
            _ = &mut writer => {
                tracing::debug!(%player_id, "room closed the player's channel");
                break;
            }
        };

        let msg: ClientMessage = match state.codec.decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%player_id, error = %e, "failed to decode client message");
                send_text(&conn, &state, "Invalid message.").await?;
                continue;
            }
        };

        if msg == ClientMessage::Disconnect {
            tracing::info!(%player_id, "client disconnected");
            break;
        }
        tracing::trace!(%player_id, kind = msg.kind(), "client input");
        if handle.send_message(player_id, msg).await.is_err() {
            tracing::debug!(%player_id, %room_id, "room unavailable");
            break;
        }
    }

    writer.abort();
    let _ = conn.close().await;
    // _guard drops here → leave fires.
    Ok(())
}

/// Waits for the first frame, which must be `join-room`.
async fn await_join(
    conn: &WebSocketConnection,
    state: &ServerState,
) -> Result<String, NightfallError> {
    let data = match tokio::time::timeout(state.join_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage("connection closed before join-room".into()).into());
        }
        Ok(Err(e)) => return Err(NightfallError::Transport(e)),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("join-room timed out".into()).into());
        }
    };

    match state.codec.decode(&data)? {
        ClientMessage::JoinRoom { username } => Ok(username),
        _ => {
            send_text(conn, state, "Join a room first.").await?;
            Err(ProtocolError::InvalidMessage("first message must be join-room".into()).into())
        }
    }
}

/// Drains the player's outbound channel onto the socket.
///
/// Ends when the room drops the sending half (the player left, the game
/// ended, or the room shut down), then closes the socket.
async fn write_loop(
    conn: Arc<WebSocketConnection>,
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
    state: Arc<ServerState>,
) {
    while let Some(msg) = rx.recv().await {
        let bytes = match state.codec.encode(&msg) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode server message");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed");
            break;
        }
    }
    let _ = conn.close().await;
}

/// Sends a `generic-message` straight to the socket, bypassing any room.
async fn send_text(
    conn: &WebSocketConnection,
    state: &ServerState,
    message: &str,
) -> Result<(), NightfallError> {
    let bytes = state.codec.encode(&ServerMessage::GenericMessage {
        message: message.to_owned(),
    })?;
    conn.send(&bytes).await?;
    Ok(())
}
