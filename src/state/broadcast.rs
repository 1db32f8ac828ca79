use super::AppState;
use crate::protocol::ServerMessage;
use crate::types::*;

impl AppState {
    /// Fan a message out to every connection in the room.
    ///
    /// Delivery happens under the room lock so events reach each connection in
    /// transition order. Dead connections are removed afterwards; failures are
    /// never reported to the caller.
    pub async fn publish(&self, code: &RoomCode, msg: ServerMessage) {
        let Some(room) = self.room(code).await else {
            return;
        };
        let dead = room.lock().await.deliver(&msg);
        self.prune(dead).await;
    }

    pub async fn publish_room_state(&self, code: &RoomCode) {
        let Some(room) = self.room(code).await else {
            return;
        };
        let dead = {
            let room = room.lock().await;
            room.deliver(&ServerMessage::RoomState { state: room.view() })
        };
        self.prune(dead).await;
    }

    /// Drop connections whose outbound queue is closed
    pub async fn prune(&self, dead: Vec<ConnectionId>) {
        for conn_id in dead {
            tracing::warn!("Pruning dead connection {}", conn_id);
            self.leave(conn_id).await;
        }
    }
}
