//! WebSocket relay: fans canvas updates and presence out to room peers.

use crate::state::{RoomMessage, SharedState};
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use collabcanvas_core::sync::{ClientMessage, ServerMessage};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// One connected peer and the room it sits in.
struct Peer {
    id: String,
    room: Option<String>,
    rx: Option<broadcast::Receiver<RoomMessage>>,
}

impl Peer {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            room: None,
            rx: None,
        }
    }

    /// Apply a client message. Returns the reply owed to this peer, if any.
    fn handle(&mut self, state: &SharedState, message: ClientMessage) -> Option<ServerMessage> {
        match message {
            ClientMessage::Join { room } => {
                self.leave(state);
                let joined = state.join_room(&room, &self.id);
                self.rx = Some(joined.rx);
                self.room = Some(room.clone());
                state.broadcast(
                    &room,
                    &self.id,
                    ServerMessage::PeerJoined {
                        peer_id: self.id.clone(),
                    },
                );
                info!(peer = %self.id, room = %room, peers = joined.peer_count, "peer joined");
                Some(ServerMessage::Joined {
                    room,
                    peer_count: joined.peer_count,
                    initial_state: joined.initial_state,
                })
            }
            ClientMessage::Leave => {
                self.leave(state);
                None
            }
            ClientMessage::CanvasUpdate { update } => match &self.room {
                Some(room) => {
                    state.update_state(room, update.clone().into_snapshot());
                    state.broadcast(
                        room,
                        &self.id,
                        ServerMessage::CanvasUpdate {
                            from: self.id.clone(),
                            update,
                        },
                    );
                    None
                }
                None => Some(not_in_room()),
            },
            ClientMessage::Presence { state: presence } => match &self.room {
                Some(room) => {
                    state.broadcast(
                        room,
                        &self.id,
                        ServerMessage::Presence {
                            from: self.id.clone(),
                            state: presence,
                        },
                    );
                    None
                }
                None => Some(not_in_room()),
            },
        }
    }

    fn leave(&mut self, state: &SharedState) {
        if let Some(room) = self.room.take() {
            state.leave_room(&room, &self.id);
            state.broadcast(
                &room,
                &self.id,
                ServerMessage::PeerLeft {
                    peer_id: self.id.clone(),
                },
            );
            info!(peer = %self.id, room = %room, "peer left");
        }
        self.rx = None;
    }
}

fn not_in_room() -> ServerMessage {
    ServerMessage::Error {
        message: "Join a room first".to_string(),
    }
}

fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            warn!(error = %e, "failed to encode server message");
            None
        }
    }
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, state: SharedState) {
    let mut peer = Peer::new();
    info!(peer = %peer.id, "new connection");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let reply = match msg {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(client_msg) => peer.handle(&state, client_msg),
                        Err(e) => {
                            warn!(peer = %peer.id, error = %e, "invalid message");
                            Some(ServerMessage::Error {
                                message: format!("Invalid message: {}", e),
                            })
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => None,
                    Some(Err(e)) => {
                        warn!(peer = %peer.id, error = %e, "websocket error");
                        break;
                    }
                };
                if let Some(out) = reply.as_ref().and_then(encode) {
                    if sender.send(out).await.is_err() {
                        break;
                    }
                }
            }

            msg = async {
                match &mut peer.rx {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                match msg {
                    Ok((from, server_msg)) => {
                        if from == peer.id {
                            continue;
                        }
                        if let Some(out) = encode(&server_msg) {
                            if sender.send(out).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(peer = %peer.id, skipped, "peer lagging behind room");
                    }
                    Err(broadcast::error::RecvError::Closed) => peer.rx = None,
                }
            }
        }
    }

    peer.leave(&state);
    info!(peer = %peer.id, "connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::state::AppState;
    use collabcanvas_core::snapshot::DocumentSnapshot;
    use collabcanvas_core::sync::{CanvasUpdate, PresenceState};
    use std::path::PathBuf;

    fn state() -> SharedState {
        AppState::shared(ServerConfig {
            addr: "127.0.0.1:0".parse().unwrap(),
            upload_dir: PathBuf::from("unused"),
        })
    }

    fn join(peer: &mut Peer, state: &SharedState, room: &str) -> ServerMessage {
        peer.handle(state, ClientMessage::Join { room: room.into() }).unwrap()
    }

    #[test]
    fn test_update_before_join_is_error() {
        let state = state();
        let mut peer = Peer::new();
        let reply = peer.handle(
            &state,
            ClientMessage::CanvasUpdate {
                update: CanvasUpdate::full(DocumentSnapshot::default()),
            },
        );
        assert!(matches!(reply, Some(ServerMessage::Error { .. })));
    }

    #[test]
    fn test_late_joiner_gets_last_state() {
        let state = state();
        let mut first = Peer::new();
        join(&mut first, &state, "canvas_1");

        let mut doc = DocumentSnapshot::default();
        doc.settings.zoom = 2.0;
        first.handle(
            &state,
            ClientMessage::CanvasUpdate {
                update: CanvasUpdate::full(doc.clone()),
            },
        );

        let mut second = Peer::new();
        match join(&mut second, &state, "canvas_1") {
            ServerMessage::Joined {
                peer_count,
                initial_state,
                ..
            } => {
                assert_eq!(peer_count, 2);
                assert_eq!(initial_state, Some(doc));
            }
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_presence_reaches_other_peers() {
        let state = state();
        let mut a = Peer::new();
        let mut b = Peer::new();
        join(&mut a, &state, "canvas_1");
        join(&mut b, &state, "canvas_1");

        let presence = PresenceState {
            user_name: Some("Ada".into()),
            ..Default::default()
        };
        a.handle(&state, ClientMessage::Presence { state: presence.clone() });

        let rx = b.rx.as_mut().unwrap();
        loop {
            let (from, msg) = rx.recv().await.unwrap();
            if let ServerMessage::Presence { state: got, .. } = msg {
                assert_eq!(from, a.id);
                assert_eq!(got, presence);
                break;
            }
        }
    }

    #[test]
    fn test_leave_drops_empty_room() {
        let state = state();
        let mut peer = Peer::new();
        join(&mut peer, &state, "canvas_1");
        assert_eq!(state.room_count(), 1);
        assert!(peer.handle(&state, ClientMessage::Leave).is_none());
        assert_eq!(state.room_count(), 0);
        assert!(peer.rx.is_none());
    }
}
