pub mod handlers;
pub mod player;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::Deserialize;
use std::sync::Arc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, Connection};
use crate::types::{ConnectionId, OwnerToken, PlayerId, PlayerToken, RoomCode};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub room_code: String,
    #[serde(default)]
    pub player_name: String,
    pub owner_token: Option<String>,
    /// Returning players pass the token from their `joined` event
    pub player_token: Option<String>,
}

/// Who is on the other end of a socket, fixed at join time
#[derive(Debug, Clone)]
pub struct Session {
    pub room_code: RoomCode,
    pub conn_id: ConnectionId,
    pub player_id: PlayerId,
    pub player_token: PlayerToken,
    pub owner_token: Option<OwnerToken>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::info!(
        "WebSocket connection request: room={}, returning={}",
        params.room_code,
        params.player_token.is_some()
    );

    ws.on_upgrade(move |socket| handle_socket(socket, params, state))
}

fn encode(msg: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!("Failed to serialize message: {}", e);
            None
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, params: WsQuery, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (conn, mut outbound) = Connection::open();
    let conn_id = conn.id;

    let joined = match state
        .join(
            &params.room_code,
            &params.player_name,
            conn,
            params.player_token.as_deref(),
            params.owner_token.as_deref(),
        )
        .await
    {
        Ok(joined) => joined,
        Err(e) => {
            tracing::warn!("Join to room {} refused: {}", params.room_code, e);
            if let Some(msg) = encode(&ServerMessage::from(e)) {
                let _ = sender.send(msg).await;
            }
            let _ = sender.close().await;
            return;
        }
    };
    state.publish_room_state(&joined.room_code).await;

    let session = Session {
        room_code: joined.room_code,
        conn_id,
        player_id: joined.player_id,
        player_token: joined.player_token,
        owner_token: params.owner_token,
    };

    loop {
        tokio::select! {
            // Events queued by the room
            queued = outbound.recv() => {
                match queued {
                    Some(msg) => {
                        let Some(frame) = encode(&msg) else { continue };
                        if sender.send(frame).await.is_err() {
                            break;
                        }
                    }
                    None => {
                        tracing::info!("Connection {} superseded by a newer one", conn_id);
                        break;
                    }
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message on {}: {}", conn_id, text);

                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => handlers::handle_message(client_msg, &session, &state).await,
                            Err(e) => {
                                tracing::warn!("Failed to parse client message: {}", e);
                                Some(ServerMessage::error(
                                    "parse_error",
                                    format!("Invalid message format: {}", e),
                                ))
                            }
                        };
                        if let Some(frame) = reply.as_ref().and_then(encode) {
                            if sender.send(frame).await.is_err() {
                                tracing::error!("Failed to send response");
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => break,
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    let _ = sender.close().await;
    state
        .disconnect(conn_id, &session.room_code, &session.player_token)
        .await;
    tracing::info!(
        "WebSocket closed for player {} in room {}",
        session.player_id,
        session.room_code
    );
}
