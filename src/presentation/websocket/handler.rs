//! WebSocket Connection Handler
//!
//! One socket per chat room. After the upgrade the connection joins the room,
//! is greeted with [`JOIN_GREETING`] and then receives every payload relayed
//! for it. The only inbound frame honoured is close.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};

use super::registry::ConnectionHandle;
use crate::application::queries::GetChatRoom;
use crate::shared::error::AppError;
use crate::startup::AppState;

/// First frame sent once a connection has joined its room
pub const JOIN_GREETING: &str = "You are now connected!";

/// WebSocket upgrade handler for `/chats/{chat_oid}/ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(chat_oid): Path<String>,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let room = state
        .mediator
        .handle_query(GetChatRoom { chat_oid })
        .await?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, room)))
}

/// Handle individual WebSocket connection
async fn handle_socket(mut socket: WebSocket, state: AppState, room: String) {
    let (handle, mut rx) = ConnectionHandle::channel();
    let connection_id = handle.id();

    if let Err(e) = state.bridge.connect(&room, handle) {
        tracing::warn!(room = %room, connection_id = %connection_id, error = %e, "Join rejected");
        return;
    }
    tracing::info!(room = %room, connection_id = %connection_id, "Client connected");

    if socket.send(greeting()).await.is_err() {
        tracing::debug!(connection_id = %connection_id, "Client left before greeting");
        state.bridge.disconnect(&room, connection_id);
        return;
    }

    // Split socket for concurrent read/write
    let (mut sender, mut receiver) = socket.split();

    // Forward relayed payloads to the socket
    let sender_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sender
                .send(Message::Text(payload.to_string().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Close(_)) => break,
            Err(e) => {
                tracing::debug!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
            // Ping/pong is handled by axum; other client frames are ignored
            Ok(_) => {}
        }
    }

    // Cleanup
    state.bridge.disconnect(&room, connection_id);
    sender_task.abort();

    tracing::info!(room = %room, connection_id = %connection_id, "Client disconnected");
}

fn greeting() -> Message {
    Message::Text(JOIN_GREETING.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn greeting_is_a_text_frame() {
        match greeting() {
            Message::Text(text) => assert_eq!(text.as_str(), "You are now connected!"),
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}
