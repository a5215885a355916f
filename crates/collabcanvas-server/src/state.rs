//! Shared server state: canvases and relay rooms.

use crate::config::ServerConfig;
use chrono::{NaiveDateTime, Utc};
use collabcanvas_core::backend::{ChatMessage, FileRecord, NewChatMessage};
use collabcanvas_core::config::UserIdentity;
use collabcanvas_core::snapshot::DocumentSnapshot;
use collabcanvas_core::sync::ServerMessage;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 256;

pub type RoomMessage = (String, ServerMessage);

/// One canvas as the REST API sees it.
#[derive(Debug, Clone, Default)]
pub struct CanvasRecord {
    pub content: DocumentSnapshot,
    pub last_saved: Option<NaiveDateTime>,
    pub files: Vec<FileRecord>,
    pub messages: Vec<ChatMessage>,
}

/// Relay room state
struct Room {
    tx: broadcast::Sender<RoomMessage>,
    peers: HashSet<String>,
    /// Last document broadcast in the room, for new joiners
    last_state: Option<DocumentSnapshot>,
}

impl Room {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            peers: HashSet::new(),
            last_state: None,
        }
    }
}

/// What a peer gets back when joining a room.
pub struct Joined {
    pub rx: broadcast::Receiver<RoomMessage>,
    pub initial_state: Option<DocumentSnapshot>,
    pub peer_count: usize,
}

pub struct AppState {
    pub config: ServerConfig,
    canvases: DashMap<String, CanvasRecord>,
    rooms: DashMap<String, Room>,
    next_message_id: AtomicU64,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            canvases: DashMap::new(),
            rooms: DashMap::new(),
            next_message_id: AtomicU64::new(1),
        }
    }

    pub fn shared(config: ServerConfig) -> SharedState {
        Arc::new(Self::new(config))
    }

    // ------------------------------------------------------------------
    // Canvases
    // ------------------------------------------------------------------

    /// Copy of a canvas; unknown canvases read as empty.
    pub fn canvas(&self, canvas_id: &str) -> CanvasRecord {
        self.canvases
            .get(canvas_id)
            .map(|record| record.clone())
            .unwrap_or_default()
    }

    pub fn save_canvas(&self, canvas_id: &str, content: DocumentSnapshot) -> NaiveDateTime {
        let now = Utc::now().naive_utc();
        let mut record = self.canvases.entry(canvas_id.to_string()).or_default();
        record.content = content;
        record.last_saved = Some(now);
        now
    }

    /// Record an upload. Newest files come first.
    pub fn add_file(&self, canvas_id: &str, file: FileRecord) {
        self.canvases
            .entry(canvas_id.to_string())
            .or_default()
            .files
            .insert(0, file);
    }

    pub fn files(&self, canvas_id: &str) -> Vec<FileRecord> {
        self.canvases
            .get(canvas_id)
            .map(|record| record.files.clone())
            .unwrap_or_default()
    }

    pub fn post_message(&self, canvas_id: &str, from: &UserIdentity, message: NewChatMessage) -> ChatMessage {
        let stored = ChatMessage {
            id: self.next_message_id.fetch_add(1, Ordering::SeqCst),
            user_id: from.user_id.clone(),
            user_name: from.user_name.clone(),
            message: message.message,
            message_type: message.message_type,
            file_path: None,
            created_at: Utc::now().naive_utc(),
        };
        self.canvases
            .entry(canvas_id.to_string())
            .or_default()
            .messages
            .push(stored.clone());
        stored
    }

    /// Chat history, oldest first.
    pub fn messages(&self, canvas_id: &str) -> Vec<ChatMessage> {
        self.canvases
            .get(canvas_id)
            .map(|record| record.messages.clone())
            .unwrap_or_default()
    }

    // ------------------------------------------------------------------
    // Rooms
    // ------------------------------------------------------------------

    /// Add peer to room
    pub fn join_room(&self, room_id: &str, peer_id: &str) -> Joined {
        let mut room = self.rooms.entry(room_id.to_string()).or_insert_with(Room::new);
        room.peers.insert(peer_id.to_string());
        Joined {
            rx: room.tx.subscribe(),
            initial_state: room.last_state.clone(),
            peer_count: room.peers.len(),
        }
    }

    /// Remove peer from room. Empty rooms are dropped along with their
    /// cached document.
    pub fn leave_room(&self, room_id: &str, peer_id: &str) {
        let empty = match self.rooms.get_mut(room_id) {
            Some(mut room) => {
                room.peers.remove(peer_id);
                room.peers.is_empty()
            }
            None => false,
        };
        if empty {
            self.rooms.remove(room_id);
        }
    }

    pub fn update_state(&self, room_id: &str, state: DocumentSnapshot) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.last_state = Some(state);
        }
    }

    /// Broadcast message to room
    pub fn broadcast(&self, room_id: &str, from: &str, msg: ServerMessage) {
        if let Some(room) = self.rooms.get(room_id) {
            let _ = room.tx.send((from.to_string(), msg));
        }
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn state() -> AppState {
        AppState::new(ServerConfig {
            addr: "127.0.0.1:0".parse().unwrap(),
            upload_dir: PathBuf::from("unused"),
        })
    }

    #[test]
    fn test_unknown_canvas_is_empty() {
        let state = state();
        let record = state.canvas("404");
        assert!(record.content.is_empty());
        assert!(record.last_saved.is_none());
    }

    #[test]
    fn test_save_sets_timestamp() {
        let state = state();
        let saved_at = state.save_canvas("1", DocumentSnapshot::default());
        assert_eq!(state.canvas("1").last_saved, Some(saved_at));
    }

    #[test]
    fn test_messages_get_increasing_ids() {
        let state = state();
        let user = UserIdentity::new("1", "Ada");
        let a = state.post_message("1", &user, NewChatMessage::text("a"));
        let b = state.post_message("1", &user, NewChatMessage::text("b"));
        assert!(a.id < b.id);
        assert_eq!(state.messages("1").len(), 2);
        assert!(state.messages("2").is_empty());
    }

    #[test]
    fn test_room_lifecycle() {
        let state = state();
        let first = state.join_room("canvas_1", "a");
        assert_eq!(first.peer_count, 1);
        assert!(first.initial_state.is_none());

        state.update_state("canvas_1", DocumentSnapshot::default());
        let second = state.join_room("canvas_1", "b");
        assert_eq!(second.peer_count, 2);
        assert!(second.initial_state.is_some());

        state.leave_room("canvas_1", "a");
        assert_eq!(state.room_count(), 1);
        state.leave_room("canvas_1", "b");
        assert_eq!(state.room_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_room() {
        let state = state();
        let mut joined = state.join_room("canvas_1", "a");
        state.broadcast(
            "canvas_1",
            "b",
            ServerMessage::PeerJoined {
                peer_id: "b".into(),
            },
        );
        let (from, msg) = joined.rx.recv().await.unwrap();
        assert_eq!(from, "b");
        assert!(matches!(msg, ServerMessage::PeerJoined { .. }));
    }
}
