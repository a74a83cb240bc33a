use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::types::ServerMsg;

/// Outbound queue for one WebSocket connection.
pub type ConnectionSender = mpsc::UnboundedSender<ServerMsg>;

/// Room-keyed pub/sub over the live connections.
///
/// Every connection registers an outbound queue when it opens. Rooms are
/// named by session code and hold the ids of their subscribed connections.
#[derive(Default)]
pub struct Hub {
    connections: DashMap<String, ConnectionSender>,
    rooms: DashMap<String, Vec<String>>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connection_id: &str) -> mpsc::UnboundedReceiver<ServerMsg> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.insert(connection_id.to_string(), tx);
        rx
    }

    pub fn unregister(&self, connection_id: &str) {
        self.connections.remove(connection_id);
    }

    pub fn subscribe(&self, room: &str, connection_id: &str) {
        let mut members = self.rooms.entry(room.to_string()).or_default();
        if !members.iter().any(|id| id == connection_id) {
            members.push(connection_id.to_string());
        }
    }

    pub fn unsubscribe(&self, room: &str, connection_id: &str) {
        let emptied = match self.rooms.get_mut(room) {
            Some(mut members) => {
                members.retain(|id| id != connection_id);
                members.is_empty()
            }
            None => false,
        };
        if emptied {
            self.rooms.remove_if(room, |_, members| members.is_empty());
        }
    }

    pub fn close_room(&self, room: &str) {
        self.rooms.remove(room);
    }

    pub fn room_size(&self, room: &str) -> usize {
        self.rooms.get(room).map(|m| m.len()).unwrap_or(0)
    }

    /// Send a message to a specific connection.
    pub fn send_to(&self, connection_id: &str, msg: ServerMsg) {
        if let Some(tx) = self.connections.get(connection_id) {
            let _ = tx.send(msg);
        }
    }

    /// Broadcast a message to every connection subscribed to `room`.
    pub fn broadcast(&self, room: &str, msg: ServerMsg) {
        let Some(members) = self.rooms.get(room) else {
            return;
        };
        for id in members.iter() {
            if let Some(tx) = self.connections.get(id) {
                let _ = tx.send(msg.clone());
            }
        }
    }
}
