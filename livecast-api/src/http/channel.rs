//! Room presence & chat channel
//!
//! One persistent WebSocket per client, independent of the media path.
//! Clients join and leave stream-key rooms and exchange chat events; the
//! hub broadcasts to whoever is in the room right now. Outbound delivery
//! runs through a bounded per-client buffer so one slow reader cannot
//! hold up a room.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::collections::HashSet;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::http::AppState;
use crate::rooms::{ClientEvent, ClientId, ServerEvent};

/// WebSocket handler for the room channel
///
/// Path: `GET /channel`
pub async fn channel_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let max_message_bytes = state.config.channel.max_message_bytes;
    ws.max_message_size(max_message_bytes)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let client_id = ClientId::generate();
    info!(client_id = %client_id, "channel client connected");

    let (tx, mut rx) = mpsc::channel::<ServerEvent>(state.config.channel.send_buffer);
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Hub events -> socket. Ends when every sender clone is gone (the
    // client left all rooms and the read loop below finished).
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let Ok(text) = serde_json::to_string(&event) else {
                continue;
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    let mut joined: HashSet<String> = HashSet::new();
    while let Some(message) = ws_rx.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                debug!(client_id = %client_id, error = %e, "channel read error");
                break;
            }
        };
        match message {
            Message::Text(text) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(ClientEvent::JoinRoom { stream_key }) => {
                    state.rooms.join(&client_id, tx.clone(), &stream_key);
                    joined.insert(stream_key);
                }
                Ok(ClientEvent::LeaveRoom { stream_key }) => {
                    state.rooms.leave(&client_id, &stream_key);
                    joined.remove(&stream_key);
                }
                Ok(ClientEvent::SendChat {
                    stream_key,
                    username,
                    message,
                }) => {
                    state.rooms.chat(&stream_key, &username, &message);
                }
                Err(e) => {
                    debug!(client_id = %client_id, error = %e, "unparseable channel event ignored");
                }
            },
            Message::Close(_) => break,
            // Ping/pong are answered by axum; binary is not part of the
            // channel protocol.
            _ => {}
        }
    }

    for stream_key in &joined {
        state.rooms.leave(&client_id, stream_key);
    }
    info!(client_id = %client_id, rooms_left = joined.len(), "channel client disconnected");
}
