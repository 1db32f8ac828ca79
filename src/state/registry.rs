use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{AppState, Connection, Room};
use crate::error::RoomError;
use crate::protocol::{RoomView, ServerMessage};
use crate::types::*;

const MAX_NAME_CHARS: usize = 32;
const DEFAULT_NAME: &str = "Player";
const SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Spawn a background task that deletes rooms nobody joined within the idle timeout
pub fn spawn_idle_room_sweeper(state: Arc<AppState>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(SWEEP_INTERVAL).await;
            state.sweep_idle_rooms(Instant::now()).await;
        }
    });
}

/// Result of a successful join
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub room_code: RoomCode,
    pub player_id: PlayerId,
    pub player_token: PlayerToken,
    pub is_owner: bool,
    pub view: RoomView,
}

/// Trimmed, length-capped display name
pub fn clean_name(raw: &str) -> String {
    let name: String = raw.trim().chars().take(MAX_NAME_CHARS).collect();
    let name = name.trim();
    if name.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        name.to_string()
    }
}

impl AppState {
    /// Register an empty room in the lobby. Generated codes retry until unused.
    pub async fn create_room(
        &self,
        code: Option<RoomCode>,
        config: RoomConfig,
    ) -> Result<(RoomCode, OwnerToken), RoomError> {
        let mut rooms = self.rooms.write().await;

        let code = match code {
            Some(code) if rooms.contains_key(&code) => return Err(RoomError::CodeTaken),
            Some(code) => code,
            None => loop {
                let candidate = RoomCode::generate();
                if !rooms.contains_key(&candidate) {
                    break candidate;
                }
            },
        };

        let owner_token = generate_secret();
        let room = Room::new(code.clone(), owner_token.clone(), config);
        rooms.insert(code.clone(), Arc::new(Mutex::new(room)));

        tracing::info!("Room {} created", code);
        Ok((code, owner_token))
    }

    /// Bind a connection to a room as a new or returning player.
    ///
    /// A known `player_token` reconnects that player and supersedes its
    /// previous connection, ignoring capacity. Otherwise a fresh player is
    /// created if the room has space. The `joined` event is queued on the
    /// new connection before anything else can reach it.
    pub async fn join(
        &self,
        code: &str,
        name: &str,
        conn: Connection,
        player_token: Option<&str>,
        owner_token: Option<&str>,
    ) -> Result<JoinOutcome, RoomError> {
        let code = RoomCode::normalize(code);
        let room = self.room(&code).await.ok_or(RoomError::NotFound)?;
        let mut room = room.lock().await;
        if room.closed {
            return Err(RoomError::JoinFailed);
        }

        let conn_id = conn.id;
        let returning = player_token.filter(|token| room.player(token).is_some());
        let token = match returning {
            Some(token) => token.to_string(),
            None if room.is_full() => return Err(RoomError::Full),
            None => room.add_player(&clean_name(name)).token.clone(),
        };
        let player_id = room
            .player(&token)
            .map(|p| p.id.clone())
            .ok_or(RoomError::JoinFailed)?;

        let superseded = room.attach(&token, conn);
        {
            let mut index = self.connections.write().await;
            if let Some(old) = &superseded {
                index.remove(&old.id);
            }
            index.insert(conn_id, (code.clone(), token.clone()));
        }
        if returning.is_some() {
            tracing::info!("Player {} reconnected to room {} on {}", player_id, code, conn_id);
        } else {
            tracing::info!("Player {} joined room {} on {}", player_id, code, conn_id);
        }

        let is_owner = room.is_owner(owner_token);
        let view = room.view();
        room.send_to(
            conn_id,
            ServerMessage::Joined {
                player_id: player_id.clone(),
                player_token: token.clone(),
                is_owner,
                state: view.clone(),
            },
        );
        room.answer_signal.notify_one();

        Ok(JoinOutcome {
            room_code: code,
            player_id,
            player_token: token,
            is_owner,
            view,
        })
    }

    /// Forget a connection. Returns the player if it just became inactive.
    pub async fn leave(&self, conn_id: ConnectionId) -> Option<(RoomCode, PlayerToken)> {
        let (code, _) = self.connections.write().await.remove(&conn_id)?;
        let room = self.room(&code).await?;
        let mut room = room.lock().await;
        let token = room.detach(conn_id)?;
        room.answer_signal.notify_one();
        tracing::info!("Player left room {} ({})", code, conn_id);
        Some((code, token))
    }

    /// Transport closed: drop the connection, tell the room, and arm the purge
    pub async fn disconnect(self: &Arc<Self>, conn_id: ConnectionId, code: &RoomCode, token: &str) {
        self.leave(conn_id).await;
        self.publish_room_state(code).await;
        self.schedule_purge(code, token).await;
    }

    /// Purge the player after the reconnect grace period unless it comes back.
    /// Replaces any purge already pending for the same player.
    pub async fn schedule_purge(self: &Arc<Self>, code: &RoomCode, token: &str) {
        let Some(room) = self.room(code).await else {
            return;
        };
        let mut room = room.lock().await;
        if room.closed || room.is_active(token) || room.player(token).is_none() {
            return;
        }

        let state = Arc::clone(self);
        let grace = self.settings.reconnect_grace;
        let (code, token) = (code.clone(), token.to_string());
        let key = token.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            state.purge_if_inactive(&code, &token).await;
        });
        if let Some(previous) = room.pending_purges.insert(key, handle) {
            previous.abort();
        }
    }

    /// Remove a player with no live connection. Deletes the room once empty.
    pub async fn purge_if_inactive(&self, code: &RoomCode, token: &str) -> bool {
        let Some(room_arc) = self.room(code).await else {
            return false;
        };
        let mut room = room_arc.lock().await;
        room.pending_purges.remove(token);
        if !room.remove_player(token) {
            return false;
        }
        tracing::info!("Purged inactive player from room {}", code);

        if room.players.is_empty() && room.connections.is_empty() {
            room.close();
            drop(room);
            let mut rooms = self.rooms.write().await;
            if rooms.get(code).is_some_and(|r| Arc::ptr_eq(r, &room_arc)) {
                rooms.remove(code);
                tracing::info!("Room {} deleted", code);
            }
        } else {
            drop(room);
            self.publish_room_state(code).await;
        }
        true
    }

    /// Delete rooms that have had no players since creation for longer than the
    /// idle timeout. Returns how many were removed.
    pub async fn sweep_idle_rooms(&self, now: Instant) -> usize {
        let candidates: Vec<(RoomCode, Arc<Mutex<Room>>)> = self
            .rooms
            .read()
            .await
            .iter()
            .map(|(code, room)| (code.clone(), Arc::clone(room)))
            .collect();

        let mut removed = 0;
        for (code, room_arc) in candidates {
            {
                let mut room = room_arc.lock().await;
                let idle = room.players.is_empty()
                    && room.connections.is_empty()
                    && now.saturating_duration_since(room.created_at)
                        >= self.settings.idle_room_timeout;
                if !idle {
                    continue;
                }
                room.close();
            }

            let mut rooms = self.rooms.write().await;
            if rooms.get(&code).is_some_and(|r| Arc::ptr_eq(r, &room_arc)) {
                rooms.remove(&code);
                removed += 1;
                tracing::info!("Room {} deleted after sitting empty", code);
            }
        }
        removed
    }

    pub async fn connections_for(&self, code: &RoomCode) -> Vec<ConnectionId> {
        match self.room(code).await {
            Some(room) => room.lock().await.connections.keys().copied().collect(),
            None => Vec::new(),
        }
    }

    pub async fn snapshot(&self, code: &str) -> Result<RoomView, RoomError> {
        let room = self
            .room(&RoomCode::normalize(code))
            .await
            .ok_or(RoomError::NotFound)?;
        let view = room.lock().await.view();
        Ok(view)
    }

    pub async fn room_exists(&self, code: &str) -> bool {
        self.rooms
            .read()
            .await
            .contains_key(&RoomCode::normalize(code))
    }
}
