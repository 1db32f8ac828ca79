//! Player message handlers

use crate::error::RoomError;
use crate::protocol::ServerMessage;
use crate::state::AppState;
use std::sync::Arc;

use super::Session;

/// Owner starts the game. Stale or unauthorized starts are dropped silently.
pub async fn handle_start_game(state: &Arc<AppState>, session: &Session) -> Option<ServerMessage> {
    match state
        .start_game(&session.room_code, session.owner_token.as_deref())
        .await
    {
        Ok(()) => None,
        Err(RoomError::NotOwner) | Err(RoomError::NotInLobby) => {
            tracing::debug!(
                "Ignoring start_game from {} in room {}",
                session.player_id,
                session.room_code
            );
            None
        }
        Err(e) => {
            tracing::warn!("Room {} failed to start: {}", session.room_code, e);
            Some(e.into())
        }
    }
}

pub async fn handle_submit_answer(
    state: &Arc<AppState>,
    session: &Session,
    answer: String,
) -> Option<ServerMessage> {
    match state
        .submit_answer(&session.room_code, &session.player_token, &answer)
        .await
    {
        Ok(()) => {
            tracing::debug!("Answer from {} in room {}", session.player_id, session.room_code);
            Some(ServerMessage::AnswerReceived)
        }
        Err(e) => Some(e.into()),
    }
}
