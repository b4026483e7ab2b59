//! WebSocket endpoint for live updates
//!
//! Each connection registers an mpsc handle with the ConnectionManager; the
//! fan-out writes into that channel and this task forwards to the socket.
//! Clients manage their subject subscriptions with JSON commands.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientCommand {
    Subscribe { dog_id: Uuid },
    Unsubscribe { dog_id: Uuid },
}

pub async fn websocket(
    ws: WebSocketUpgrade,
    Path(client_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, client_id, state))
}

enum SocketEvent {
    Outbound(Option<Message>),
    Inbound(Option<Result<Message, axum::Error>>),
}

async fn handle_socket(mut socket: WebSocket, client_id: String, state: AppState) {
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.realtime.register(&client_id, tx.clone());

    loop {
        let event = tokio::select! {
            outbound = rx.recv() => SocketEvent::Outbound(outbound),
            inbound = socket.recv() => SocketEvent::Inbound(inbound),
        };

        match event {
            SocketEvent::Outbound(Some(msg)) => {
                if socket.send(msg).await.is_err() {
                    break;
                }
            }
            SocketEvent::Outbound(None) => break,
            SocketEvent::Inbound(Some(Ok(Message::Text(text)))) => {
                handle_command(&state, &client_id, &text)
            }
            SocketEvent::Inbound(Some(Ok(Message::Close(_)))) | SocketEvent::Inbound(None) => {
                break
            }
            SocketEvent::Inbound(Some(Ok(_))) => {}
            SocketEvent::Inbound(Some(Err(_))) => break,
        }
    }

    // Only tear down the registration if it is still ours; a reconnect under
    // the same client id must not be evicted by the stale socket closing.
    state.realtime.deregister_if_current(&client_id, &tx);
}

fn handle_command(state: &AppState, client_id: &str, text: &str) {
    match serde_json::from_str::<ClientCommand>(text) {
        Ok(ClientCommand::Subscribe { dog_id }) => state.realtime.subscribe(client_id, dog_id),
        Ok(ClientCommand::Unsubscribe { dog_id }) => state.realtime.unsubscribe(client_id, dog_id),
        Err(e) => tracing::debug!("Ignoring malformed command from {}: {}", client_id, e),
    }
}
