mod broadcast;
mod game;
mod registry;
pub mod room;

pub use registry::{spawn_idle_room_sweeper, JoinOutcome};
pub use room::{Connection, Room, RoundOutcome};

use crate::config::Settings;
use crate::pool::ContentPool;
use crate::suggest::TitleIndex;
use crate::types::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Shared application state
pub struct AppState {
    /// Every live room, each behind its own lock
    pub rooms: RwLock<HashMap<RoomCode, Arc<Mutex<Room>>>>,
    /// Reverse index from a transport channel to its (room, player)
    pub connections: RwLock<HashMap<ConnectionId, (RoomCode, PlayerToken)>>,
    pub pool: Arc<ContentPool>,
    pub titles: Arc<TitleIndex>,
    pub settings: Settings,
    /// Outbound client for the cover proxy
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(settings: Settings, pool: ContentPool) -> Self {
        let titles = TitleIndex::new(pool.items());
        Self {
            rooms: RwLock::new(HashMap::new()),
            connections: RwLock::new(HashMap::new()),
            pool: Arc::new(pool),
            titles: Arc::new(titles),
            settings,
            http: reqwest::Client::new(),
        }
    }

    pub(crate) async fn room(&self, code: &RoomCode) -> Option<Arc<Mutex<Room>>> {
        self.rooms.read().await.get(code).cloned()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Settings::default(), ContentPool::default())
    }
}
