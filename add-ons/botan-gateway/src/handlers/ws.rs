//! WebSocket surface: participants on `/ws/chat`, read-only observers on
//! `/ws/obs`.
//!
//! Each socket gets an unbounded channel registered with the connection
//! registry; a forward task drains it into the sink. Malformed frames are
//! answered with an error frame, never a disconnect.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use chrono::Utc;
use futures_util::stream::{SplitSink, StreamExt};
use futures_util::SinkExt;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use uuid::Uuid;

use botan_core::{ClientMessage, ConnectionGroup, ServerMessage};

use crate::state::SharedState;

pub async fn ws_chat(State(state): State<SharedState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| participant_loop(state, socket))
}

pub async fn ws_observe(State(state): State<SharedState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| observer_loop(state, socket))
}

/// Drains the registry channel into the socket sink. Ends when the channel
/// closes (unregister) or the peer goes away.
fn spawn_forwarder(
    mut rx: UnboundedReceiver<ServerMessage>,
    mut sink: SplitSink<WebSocket, Message>,
) {
    tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!(target: "botan::gateway", error = %e, "outbound frame serialization failed");
                    continue;
                }
            };
            if sink.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });
}

fn connected_frame(id: Uuid) -> ServerMessage {
    ServerMessage::Connected {
        connection_id: id.to_string(),
        timestamp: Utc::now(),
    }
}

async fn participant_loop(state: SharedState, socket: WebSocket) {
    let (sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let id = state.registry.register(ConnectionGroup::Participant, tx);
    spawn_forwarder(rx, sink);

    let _ = state.registry.send_to(id, connected_frame(id));

    // Remembered so the session can be persisted on disconnect.
    let mut last_client_id: Option<String> = None;

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(raw) => {
                let reply = match serde_json::from_str::<ClientMessage>(&raw) {
                    Ok(ClientMessage::Chat {
                        text,
                        client_id,
                        enable_voice,
                        enable_reflection,
                        ..
                    }) => {
                        last_client_id = Some(client_id.clone());
                        match super::process_turn(
                            &state,
                            &client_id,
                            &text,
                            enable_reflection,
                            enable_voice,
                        )
                        .await
                        {
                            Ok(reply) => reply.into_frame(),
                            Err(message) => ServerMessage::error(message),
                        }
                    }
                    Ok(ClientMessage::ObserverConnect { .. }) => {
                        ServerMessage::error("観察者接続は /ws/obs を使ってください")
                    }
                    Err(e) => ServerMessage::error(format!("不正なメッセージ形式です: {}", e)),
                };
                if state.registry.send_to(id, reply).is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            // Ping/pong are answered by the transport; binary is ignored.
            _ => {}
        }
    }

    state.registry.unregister(id);
    if let Some(client_id) = last_client_id {
        state.persist_session(&client_id).await;
    }
}

async fn observer_loop(state: SharedState, socket: WebSocket) {
    let (sink, mut stream) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel();
    let id = state.registry.register(ConnectionGroup::Observer, tx);
    spawn_forwarder(rx, sink);

    let _ = state.registry.send_to(id, connected_frame(id));

    while let Some(Ok(msg)) = stream.next().await {
        match msg {
            Message::Text(raw) => {
                let reply = match serde_json::from_str::<ClientMessage>(&raw) {
                    // An explicit handshake frame is acknowledged again.
                    Ok(ClientMessage::ObserverConnect { .. }) => connected_frame(id),
                    Ok(ClientMessage::Chat { .. }) => {
                        ServerMessage::error("観察者接続は読み取り専用です")
                    }
                    Err(e) => ServerMessage::error(format!("不正なメッセージ形式です: {}", e)),
                };
                if state.registry.send_to(id, reply).is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    state.registry.unregister(id);
}
