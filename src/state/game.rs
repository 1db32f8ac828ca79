use std::sync::Arc;
use tokio::time::Instant;

use super::AppState;
use crate::error::RoomError;
use crate::protocol::ServerMessage;
use crate::round_timer;
use crate::types::*;

const MAX_ANSWER_CHARS: usize = 200;

impl AppState {
    /// Leave the lobby: draw the questions, open round one and start the timer.
    /// Only the owner may start, and only from the lobby.
    pub async fn start_game(
        self: &Arc<Self>,
        code: &RoomCode,
        owner_token: Option<&str>,
    ) -> Result<(), RoomError> {
        let room_arc = self.room(code).await.ok_or(RoomError::NotFound)?;
        let (dead, spawn_timer) = {
            let mut room = room_arc.lock().await;
            if !room.is_owner(owner_token) {
                return Err(RoomError::NotOwner);
            }
            if room.phase != Phase::Lobby {
                return Err(RoomError::NotInLobby);
            }

            let questions = self.pool.select_questions(&room.config);
            if questions.is_empty() {
                tracing::warn!("Room {} has no questions for its settings", code);
                return Err(RoomError::NoQuestions);
            }
            room.begin_game(questions);
            tracing::info!(
                "Game started in room {} with {} rounds",
                code,
                room.config.rounds_total
            );

            let dead = match room.start_round(Instant::now()) {
                Some(msg) => room.deliver(&msg),
                None => Vec::new(),
            };
            let spawn_timer = !room.timer_running;
            room.timer_running = true;
            (dead, spawn_timer)
        };
        self.prune(dead).await;

        if spawn_timer {
            round_timer::spawn_round_timer(Arc::clone(self), room_arc);
        }
        Ok(())
    }

    /// Record a player's answer for the open round and wake the timer
    pub async fn submit_answer(
        &self,
        code: &RoomCode,
        token: &str,
        answer: &str,
    ) -> Result<(), RoomError> {
        let room = self.room(code).await.ok_or(RoomError::NotFound)?;
        let answer: String = answer.trim().chars().take(MAX_ANSWER_CHARS).collect();
        let dead = {
            let mut room = room.lock().await;
            room.record_answer(token, &answer)?;
            room.answer_signal.notify_one();
            room.deliver(&ServerMessage::RoomState { state: room.view() })
        };
        self.prune(dead).await;
        Ok(())
    }
}
