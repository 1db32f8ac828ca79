//! WebSocket message dispatch
//!
//! Every inbound message kind is handled here exhaustively. The reply, if any,
//! goes back to the sending connection only; room-wide updates are published
//! by the state layer.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use std::sync::Arc;

use super::{player, Session};

/// Handle client messages and return optional response
pub async fn handle_message(
    msg: ClientMessage,
    session: &Session,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    match msg {
        ClientMessage::StartGame => player::handle_start_game(state, session).await,
        ClientMessage::SubmitAnswer { answer } => {
            player::handle_submit_answer(state, session, answer).await
        }
        ClientMessage::Ping => Some(ServerMessage::Pong),
    }
}
