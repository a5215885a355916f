//! Sync gateway: persistence and realtime mirroring for one canvas.
//!
//! Local changes are debounced into a single save and broadcast as full
//! snapshots. Remote snapshots replace the local document wholesale when
//! they differ (last writer wins). Remote replacements are never recorded in
//! history, re-broadcast or autosaved.

use crate::autosave::{AutoSave, SaveStatus};
use crate::backend::{Backend, BackendResult, SaveReceipt};
use crate::editor::Editor;
use crate::snapshot::DocumentSnapshot;
use crate::sync::{CanvasUpdate, ClientMessage, PresenceState, SyncEvent};
use chrono::NaiveDateTime;
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

pub struct SyncGateway {
    canvas_id: String,
    room: String,
    autosave: AutoSave,
    last_saved: Option<NaiveDateTime>,
    joined: bool,
    peer_count: usize,
    peers: HashMap<String, PresenceState>,
    outgoing: VecDeque<ClientMessage>,
}

impl SyncGateway {
    pub fn new(canvas_id: impl Into<String>, autosave_delay: Duration) -> Self {
        let canvas_id = canvas_id.into();
        Self {
            room: format!("canvas_{}", canvas_id),
            canvas_id,
            autosave: AutoSave::new(autosave_delay),
            last_saved: None,
            joined: false,
            peer_count: 0,
            peers: HashMap::new(),
            outgoing: VecDeque::new(),
        }
    }

    pub fn canvas_id(&self) -> &str {
        &self.canvas_id
    }

    pub fn room(&self) -> &str {
        &self.room
    }

    /// Fetch the persisted document and install it as the new baseline.
    pub async fn load<B: Backend + ?Sized>(&mut self, backend: &B, editor: &mut Editor) -> BackendResult<()> {
        let snapshot = backend
            .load(&self.canvas_id)
            .await
            .inspect_err(|e| log::error!("Failed to load canvas {}: {}", self.canvas_id, e))?;
        log::info!(
            "Loaded canvas {} with {} elements",
            self.canvas_id,
            snapshot.elements.len()
        );
        editor.load(snapshot);
        self.autosave.reset();
        Ok(())
    }

    /// A local edit happened: arm the debounce and broadcast the document.
    pub fn note_local_change(&mut self, editor: &Editor, now: Instant) {
        self.autosave.mark_dirty(now);
        if self.joined {
            self.outgoing.push_back(ClientMessage::CanvasUpdate {
                update: CanvasUpdate::full(editor.snapshot()),
            });
        }
    }

    /// Save if the debounce deadline has passed. `None` when nothing was due.
    pub async fn tick<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        editor: &Editor,
        now: Instant,
    ) -> Option<BackendResult<SaveReceipt>> {
        if !self.autosave.is_due(now) {
            return None;
        }
        Some(self.save_now(backend, editor, now).await)
    }

    /// Save immediately, bypassing the debounce.
    pub async fn save_now<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        editor: &Editor,
        now: Instant,
    ) -> BackendResult<SaveReceipt> {
        self.autosave.begin();
        match backend.save(&self.canvas_id, &editor.snapshot()).await {
            Ok(receipt) => {
                log::info!("Canvas {} saved", self.canvas_id);
                self.autosave.succeeded(now);
                if receipt.last_saved.is_some() {
                    self.last_saved = receipt.last_saved;
                }
                Ok(receipt)
            }
            Err(e) => {
                log::error!("Auto-save failed: {}", e);
                self.autosave.failed(e.to_string());
                Err(e)
            }
        }
    }

    /// Page is going away: save only if something is unsaved.
    pub async fn flush<B: Backend + ?Sized>(
        &mut self,
        backend: &B,
        editor: &Editor,
        now: Instant,
    ) -> Option<BackendResult<SaveReceipt>> {
        if !self.autosave.is_dirty() {
            return None;
        }
        Some(self.save_now(backend, editor, now).await)
    }

    /// React to a transport event. Returns true when the local document was
    /// replaced.
    pub fn handle_event(&mut self, event: SyncEvent, editor: &mut Editor) -> bool {
        match event {
            SyncEvent::Connected => {
                log::info!("Realtime connected, joining {}", self.room);
                self.outgoing.push_back(ClientMessage::Join {
                    room: self.room.clone(),
                });
                false
            }
            SyncEvent::Disconnected => {
                log::warn!("Realtime disconnected");
                self.joined = false;
                self.peer_count = 0;
                self.peers.clear();
                false
            }
            SyncEvent::JoinedRoom {
                room,
                peer_count,
                initial_state,
            } => {
                log::info!("Joined {} with {} peers", room, peer_count);
                self.joined = true;
                self.peer_count = peer_count;
                initial_state.is_some_and(|state| self.apply_remote(editor, state))
            }
            SyncEvent::PeerJoined { peer_id } => {
                log::debug!("Peer {} joined", peer_id);
                self.peer_count += 1;
                false
            }
            SyncEvent::PeerLeft { peer_id } => {
                log::debug!("Peer {} left", peer_id);
                self.peer_count = self.peer_count.saturating_sub(1);
                self.peers.remove(&peer_id);
                false
            }
            SyncEvent::UpdateReceived { from, update } => {
                log::debug!("Canvas update from {}", from);
                self.apply_remote(editor, update.into_snapshot())
            }
            SyncEvent::PresenceReceived { from, state } => {
                self.peers.insert(from, state);
                false
            }
            SyncEvent::Error { message } => {
                log::warn!("Realtime error: {}", message);
                false
            }
        }
    }

    /// Replace the local document with a collaborator's when the elements
    /// differ. Unsaved local edits are overwritten.
    pub fn apply_remote(&mut self, editor: &mut Editor, snapshot: DocumentSnapshot) -> bool {
        if editor.store().snapshot().same_elements(&snapshot) {
            return false;
        }
        editor.apply_remote(snapshot);
        true
    }

    /// Share the local cursor and selection with the room.
    pub fn set_presence(&mut self, state: PresenceState) {
        if self.joined {
            self.outgoing.push_back(ClientMessage::Presence { state });
        }
    }

    pub fn leave(&mut self) {
        if self.joined {
            self.outgoing.push_back(ClientMessage::Leave);
            self.joined = false;
        }
    }

    /// Messages waiting to be sent on the transport.
    pub fn take_outgoing(&mut self) -> Vec<ClientMessage> {
        self.outgoing.drain(..).collect()
    }

    pub fn is_joined(&self) -> bool {
        self.joined
    }

    pub fn peer_count(&self) -> usize {
        self.peer_count
    }

    pub fn peers(&self) -> &HashMap<String, PresenceState> {
        &self.peers
    }

    pub fn status(&self) -> &SaveStatus {
        self.autosave.status()
    }

    pub fn status_label(&self, now: Instant) -> String {
        self.autosave.status().label(now)
    }

    pub fn is_dirty(&self) -> bool {
        self.autosave.is_dirty()
    }

    /// Server timestamp of the last successful save.
    pub fn last_saved(&self) -> Option<NaiveDateTime> {
        self.last_saved
    }

    pub fn save_deadline(&self) -> Option<Instant> {
        self.autosave.deadline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MemoryBackend};
    use crate::element::NewElement;
    use crate::history::History;
    use futures::executor::block_on;
    use kurbo::Point;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn joined_gateway(editor: &mut Editor) -> SyncGateway {
        let mut gateway = SyncGateway::new("1", ms(2000));
        gateway.handle_event(SyncEvent::Connected, editor);
        gateway.handle_event(
            SyncEvent::JoinedRoom {
                room: "canvas_1".into(),
                peer_count: 1,
                initial_state: None,
            },
            editor,
        );
        gateway.take_outgoing();
        gateway
    }

    #[test]
    fn test_load_installs_baseline() {
        let backend = MemoryBackend::new();
        let mut seed = Editor::default();
        seed.create(NewElement::text(Point::new(1.0, 1.0))).unwrap();
        backend.insert("1", seed.snapshot()).unwrap();

        let mut editor = Editor::default();
        let mut gateway = SyncGateway::new("1", ms(2000));
        block_on(gateway.load(&backend, &mut editor)).unwrap();

        assert_eq!(editor.store().len(), 1);
        assert!(!editor.history().can_undo());
        assert!(!gateway.is_dirty());
    }

    #[test]
    fn test_three_edits_produce_one_save() {
        let backend = MemoryBackend::new();
        let mut editor = Editor::default();
        let mut gateway = SyncGateway::new("1", ms(2000));
        let start = Instant::now();

        for i in 0..3u64 {
            editor.create(NewElement::text(Point::new(i as f64 * 10.0, 0.0))).unwrap();
            gateway.note_local_change(&editor, start + ms(i * 500));
        }

        let mut now = start;
        while now <= start + ms(6000) {
            let _ = block_on(gateway.tick(&backend, &editor, now));
            now += ms(100);
        }

        assert_eq!(backend.save_count(), 1);
        assert_eq!(backend.stored("1").unwrap().elements.len(), 3);
        assert_eq!(gateway.status(), &SaveStatus::Saved(start + ms(3000)));
    }

    #[test]
    fn test_save_now_bypasses_debounce() {
        let backend = MemoryBackend::new();
        let editor = Editor::default();
        let mut gateway = SyncGateway::new("1", ms(2000));
        let now = Instant::now();
        gateway.note_local_change(&editor, now);
        block_on(gateway.save_now(&backend, &editor, now)).unwrap();
        assert_eq!(backend.save_count(), 1);
        assert!(gateway.last_saved().is_some());
        assert!(block_on(gateway.tick(&backend, &editor, now + ms(5000))).is_none());
    }

    #[test]
    fn test_failed_save_reports_error() {
        let backend = MemoryBackend::new();
        backend.set_offline(true);
        let editor = Editor::default();
        let mut gateway = SyncGateway::new("1", ms(10));
        let now = Instant::now();
        gateway.note_local_change(&editor, now);

        let result = block_on(gateway.tick(&backend, &editor, now + ms(10)));
        assert!(matches!(result, Some(Err(BackendError::Network(_)))));
        assert_eq!(gateway.status_label(now), "Save failed");
        assert!(gateway.is_dirty());
    }

    #[test]
    fn test_flush_only_when_dirty() {
        let backend = MemoryBackend::new();
        let editor = Editor::default();
        let mut gateway = SyncGateway::new("1", ms(2000));
        let now = Instant::now();
        assert!(block_on(gateway.flush(&backend, &editor, now)).is_none());

        gateway.note_local_change(&editor, now);
        assert!(block_on(gateway.flush(&backend, &editor, now)).is_some());
        assert_eq!(backend.save_count(), 1);
    }

    #[test]
    fn test_join_on_connect_and_broadcast_changes() {
        let mut editor = Editor::default();
        let mut gateway = SyncGateway::new("9", ms(2000));

        editor.create(NewElement::text(Point::ZERO)).unwrap();
        gateway.note_local_change(&editor, Instant::now());
        assert!(gateway.take_outgoing().is_empty());

        gateway.handle_event(SyncEvent::Connected, &mut editor);
        assert_eq!(
            gateway.take_outgoing(),
            vec![ClientMessage::Join {
                room: "canvas_9".into()
            }]
        );

        let mut gateway = joined_gateway(&mut editor);
        gateway.note_local_change(&editor, Instant::now());
        match gateway.take_outgoing().as_slice() {
            [ClientMessage::CanvasUpdate { update }] => {
                assert_eq!(update.clone().into_snapshot(), editor.snapshot());
            }
            other => panic!("unexpected outgoing: {:?}", other),
        }
    }

    #[test]
    fn test_remote_after_unsaved_local_edit_wins() {
        let mut editor = Editor::new(History::new(50));
        let mut gateway = joined_gateway(&mut editor);
        let start = Instant::now();

        let mut remote = Editor::default();
        remote.create(NewElement::text(Point::new(300.0, 300.0))).unwrap();
        let remote_snapshot = remote.snapshot();

        editor.create(NewElement::text(Point::new(5.0, 5.0))).unwrap();
        gateway.note_local_change(&editor, start);
        let history_len = editor.history().len();
        gateway.take_outgoing();

        let replaced = gateway.handle_event(
            SyncEvent::UpdateReceived {
                from: "peer".into(),
                update: CanvasUpdate::full(remote_snapshot.clone()),
            },
            &mut editor,
        );

        assert!(replaced);
        assert!(editor.snapshot().same_elements(&remote_snapshot));
        assert_eq!(editor.history().len(), history_len);
        assert!(gateway.take_outgoing().is_empty());
    }

    #[test]
    fn test_identical_remote_is_ignored() {
        let mut editor = Editor::default();
        editor.create(NewElement::text(Point::ZERO)).unwrap();
        let mut gateway = joined_gateway(&mut editor);
        let same = editor.snapshot();
        assert!(!gateway.handle_event(
            SyncEvent::UpdateReceived {
                from: "peer".into(),
                update: CanvasUpdate::full(same),
            },
            &mut editor,
        ));
    }

    #[test]
    fn test_presence_tracking() {
        let mut editor = Editor::default();
        let mut gateway = joined_gateway(&mut editor);
        gateway.handle_event(SyncEvent::PeerJoined { peer_id: "p".into() }, &mut editor);
        gateway.handle_event(
            SyncEvent::PresenceReceived {
                from: "p".into(),
                state: PresenceState::default(),
            },
            &mut editor,
        );
        assert_eq!(gateway.peer_count(), 2);
        assert!(gateway.peers().contains_key("p"));

        gateway.handle_event(SyncEvent::PeerLeft { peer_id: "p".into() }, &mut editor);
        assert_eq!(gateway.peer_count(), 1);
        assert!(gateway.peers().is_empty());
    }
}
