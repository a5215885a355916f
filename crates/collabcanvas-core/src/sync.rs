//! Realtime transport for canvas collaboration.
//!
//! Peers in the same room exchange whole-document snapshots through a relay
//! server. Messages are JSON objects tagged by `type`.

use crate::element::ElementId;
use crate::snapshot::DocumentSnapshot;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use thiserror::Error;

/// Document change carried by a `canvas_update` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanvasUpdate {
    /// Entire document; receivers replace theirs.
    Full { state: DocumentSnapshot },
}

impl CanvasUpdate {
    pub fn full(state: DocumentSnapshot) -> Self {
        CanvasUpdate::Full { state }
    }

    pub fn into_snapshot(self) -> DocumentSnapshot {
        match self {
            CanvasUpdate::Full { state } => state,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

/// What a peer is pointing at and has selected.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PresenceState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<CursorPosition>,
    #[serde(default)]
    pub selection: Vec<ElementId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

/// Messages sent to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join { room: String },
    Leave,
    CanvasUpdate { update: CanvasUpdate },
    Presence {
        #[serde(flatten)]
        state: PresenceState,
    },
}

/// Messages received from the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirm room join, with the last document the room has seen
    Joined {
        room: String,
        peer_count: usize,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_state: Option<DocumentSnapshot>,
    },
    PeerJoined { peer_id: String },
    PeerLeft { peer_id: String },
    CanvasUpdate { from: String, update: CanvasUpdate },
    Presence {
        from: String,
        #[serde(flatten)]
        state: PresenceState,
    },
    Error { message: String },
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events from a transport
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Connected,
    Disconnected,
    JoinedRoom {
        room: String,
        peer_count: usize,
        initial_state: Option<DocumentSnapshot>,
    },
    PeerJoined { peer_id: String },
    PeerLeft { peer_id: String },
    UpdateReceived { from: String, update: CanvasUpdate },
    PresenceReceived { from: String, state: PresenceState },
    Error { message: String },
}

impl From<ServerMessage> for SyncEvent {
    fn from(message: ServerMessage) -> Self {
        match message {
            ServerMessage::Joined {
                room,
                peer_count,
                initial_state,
            } => SyncEvent::JoinedRoom {
                room,
                peer_count,
                initial_state,
            },
            ServerMessage::PeerJoined { peer_id } => SyncEvent::PeerJoined { peer_id },
            ServerMessage::PeerLeft { peer_id } => SyncEvent::PeerLeft { peer_id },
            ServerMessage::CanvasUpdate { from, update } => SyncEvent::UpdateReceived { from, update },
            ServerMessage::Presence { from, state } => SyncEvent::PresenceReceived { from, state },
            ServerMessage::Error { message } => SyncEvent::Error { message },
        }
    }
}

impl ConnectionState {
    /// State after `event` has been observed.
    fn after(self, event: &SyncEvent) -> Self {
        match event {
            SyncEvent::Connected => ConnectionState::Connected,
            SyncEvent::Disconnected => ConnectionState::Disconnected,
            SyncEvent::Error { .. } if self != ConnectionState::Connected => ConnectionState::Error,
            _ => self,
        }
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Already connected")]
    AlreadyConnected,
    #[error("Not connected")]
    NotConnected,
    #[error("Send failed: {0}")]
    Send(String),
    #[error("Encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A connection to the relay, polled from the owning thread.
pub trait Transport {
    fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError>;

    /// Drain pending events without blocking.
    fn poll_events(&mut self) -> Vec<SyncEvent>;

    fn state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

/// In-process transport. Records what is sent and replays queued events.
#[derive(Debug)]
pub struct LoopbackTransport {
    state: ConnectionState,
    sent: Vec<ClientMessage>,
    incoming: VecDeque<SyncEvent>,
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl LoopbackTransport {
    /// A transport that reports `Connected` on its first poll.
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
            sent: Vec::new(),
            incoming: VecDeque::from([SyncEvent::Connected]),
        }
    }

    /// Queue an event as if it came from the server.
    pub fn push(&mut self, event: SyncEvent) {
        self.incoming.push_back(event);
    }

    pub fn push_message(&mut self, message: ServerMessage) {
        self.push(message.into());
    }

    pub fn take_sent(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.sent)
    }

    pub fn sent(&self) -> &[ClientMessage] {
        &self.sent
    }
}

impl Transport for LoopbackTransport {
    fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError> {
        if self.state != ConnectionState::Connected {
            return Err(TransportError::NotConnected);
        }
        // Encode like a real socket would.
        let json = serde_json::to_string(message)?;
        self.sent.push(serde_json::from_str(&json)?);
        Ok(())
    }

    fn poll_events(&mut self) -> Vec<SyncEvent> {
        let events: Vec<SyncEvent> = self.incoming.drain(..).collect();
        for event in &events {
            self.state = self.state.after(event);
        }
        events
    }

    fn state(&self) -> ConnectionState {
        self.state
    }
}

mod socket_thread {
    use super::*;
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::stream::MaybeTlsStream;
    use tungstenite::{Message, WebSocket, connect};
    use url::Url;

    type Socket = WebSocket<MaybeTlsStream<std::net::TcpStream>>;

    /// Read timeout on plain sockets; bounds how long an outgoing message waits.
    const READ_POLL: Duration = Duration::from_millis(50);
    const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Requests from the owner to the socket thread.
    enum Outbound {
        Text(String),
        Close,
    }

    /// Channels and thread of one live connection.
    struct Link {
        outbound: Sender<Outbound>,
        inbound: Receiver<SyncEvent>,
        _thread: JoinHandle<()>,
    }

    /// WebSocket client running its socket on a background thread.
    ///
    /// The thread always ends with a [`SyncEvent::Disconnected`]; once that
    /// has been polled the client can `connect` again.
    pub struct NativeWebSocket {
        state: ConnectionState,
        link: Option<Link>,
    }

    impl NativeWebSocket {
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                link: None,
            }
        }

        pub fn connect(&mut self, url: &str) -> Result<(), TransportError> {
            if self.link.is_some() {
                return Err(TransportError::AlreadyConnected);
            }

            let parsed = Url::parse(url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
            if !matches!(parsed.scheme(), "ws" | "wss") {
                return Err(TransportError::InvalidUrl(format!(
                    "unsupported scheme: {}",
                    parsed.scheme()
                )));
            }

            let (outbound, outbound_rx) = channel();
            let (inbound_tx, inbound) = channel();
            let url = url.to_string();
            let thread = thread::spawn(move || {
                run_socket(&url, &outbound_rx, &inbound_tx);
                let _ = inbound_tx.send(SyncEvent::Disconnected);
            });

            self.state = ConnectionState::Connecting;
            self.link = Some(Link {
                outbound,
                inbound,
                _thread: thread,
            });
            Ok(())
        }

        pub fn disconnect(&mut self) {
            if let Some(link) = self.link.take() {
                let _ = link.outbound.send(Outbound::Close);
            }
            self.state = ConnectionState::Disconnected;
        }
    }

    /// Connect, then shuttle messages until either side closes.
    fn run_socket(url: &str, outbound: &Receiver<Outbound>, inbound: &Sender<SyncEvent>) {
        log::info!("WebSocket thread: connecting to {}", url);
        let mut socket = match connect(url) {
            Ok((socket, response)) => {
                log::info!("WebSocket connected, status: {}", response.status());
                socket
            }
            Err(e) => {
                log::error!("WebSocket connection failed: {}", e);
                let _ = inbound.send(SyncEvent::Error {
                    message: format!("Connection failed: {}", e),
                });
                return;
            }
        };
        let _ = inbound.send(SyncEvent::Connected);
        set_timeouts(&mut socket);

        while flush_outbound(&mut socket, outbound) && read_inbound(&mut socket, inbound) {}
        log::info!("WebSocket thread exiting");
    }

    fn set_timeouts(socket: &mut Socket) {
        match socket.get_mut() {
            MaybeTlsStream::Plain(tcp) => {
                let _ = tcp.set_read_timeout(Some(READ_POLL));
                let _ = tcp.set_write_timeout(Some(WRITE_TIMEOUT));
            }
            // TLS streams keep their blocking reads
            #[allow(unreachable_patterns)]
            _ => log::debug!("TLS or other stream - using default timeout handling"),
        }
    }

    /// Send everything queued by the owner. False once the link should end.
    fn flush_outbound(socket: &mut Socket, outbound: &Receiver<Outbound>) -> bool {
        loop {
            match outbound.try_recv() {
                Ok(Outbound::Text(text)) => {
                    if let Err(e) = socket.send(Message::Text(text)) {
                        log::error!("WebSocket send error: {}", e);
                        return false;
                    }
                }
                Ok(Outbound::Close) => {
                    log::info!("WebSocket close requested");
                    let _ = socket.close(None);
                    return false;
                }
                // owner dropped the client
                Err(TryRecvError::Disconnected) => return false,
                Err(TryRecvError::Empty) => return true,
            }
        }
    }

    /// Forward at most one frame to the owner. False once the link should end.
    fn read_inbound(socket: &mut Socket, inbound: &Sender<SyncEvent>) -> bool {
        match socket.read() {
            Ok(Message::Text(text)) => {
                match serde_json::from_str::<ServerMessage>(&text) {
                    Ok(message) => {
                        let _ = inbound.send(message.into());
                    }
                    Err(e) => log::warn!("Failed to parse server message: {}", e),
                }
                true
            }
            Ok(Message::Ping(data)) => socket.send(Message::Pong(data)).is_ok(),
            Ok(Message::Close(_)) => {
                log::info!("WebSocket received close frame");
                false
            }
            Ok(_) => true,
            // read timeout, nothing arrived
            Err(tungstenite::Error::Io(ref e))
                if matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut) =>
            {
                true
            }
            Err(e) => {
                log::error!("WebSocket read error: {}", e);
                false
            }
        }
    }

    impl Transport for NativeWebSocket {
        fn send(&mut self, message: &ClientMessage) -> Result<(), TransportError> {
            let link = self.link.as_ref().ok_or(TransportError::NotConnected)?;
            let json = serde_json::to_string(message)?;
            link.outbound
                .send(Outbound::Text(json))
                .map_err(|e| TransportError::Send(e.to_string()))
        }

        fn poll_events(&mut self) -> Vec<SyncEvent> {
            let Some(link) = &self.link else {
                return Vec::new();
            };
            let events: Vec<SyncEvent> = link.inbound.try_iter().collect();
            for event in &events {
                self.state = self.state.after(event);
            }
            // The thread has finished; free the slot for a reconnect.
            if events.contains(&SyncEvent::Disconnected) {
                self.link = None;
            }
            events
        }

        fn state(&self) -> ConnectionState {
            self.state
        }
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }
}

pub use socket_thread::NativeWebSocket;
