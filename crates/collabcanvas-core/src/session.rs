//! A canvas session: one editor wired to persistence, realtime sync and chat.
//!
//! Everything runs on the caller's thread. The host feeds input events,
//! calls [`Session::tick`] regularly and pumps the realtime transport with
//! [`Session::pump`]. Network calls are futures the host awaits.

use crate::autosave::Ticker;
use crate::backend::{Backend, BackendResult, ChatMessage, UploadFile};
use crate::chat::ChatFeed;
use crate::config::{CanvasConfig, ConfigError};
use crate::editor::{Editor, EditorEvent};
use crate::element::{ElementId, NewElement};
use crate::gateway::SyncGateway;
use crate::history::History;
use crate::input::{KeyEvent, PointerEvent};
use crate::sync::{NativeWebSocket, PresenceState, Transport, TransportError};
use crate::tools::ToolPrompt;
use kurbo::Point;
use std::time::Instant;

/// Things the host should show.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Prompt(ToolPrompt),
    ShowShortcuts,
    /// A collaborator's document replaced the local one.
    DocumentReplaced,
    /// The save indicator text changed.
    StatusChanged(String),
    /// New chat messages arrived.
    ChatUpdated { added: usize },
    UploadFailed { file_name: String, message: String },
}

/// Result of uploading one file.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadOutcome {
    pub file_name: String,
    pub result: Result<ElementId, String>,
}

pub struct Session<B: Backend> {
    config: CanvasConfig,
    backend: B,
    editor: Editor,
    gateway: SyncGateway,
    chat: ChatFeed,
    status_refresh: Ticker,
    status_label: String,
    save_requested: bool,
    events: Vec<SessionEvent>,
}

impl<B: Backend> Session<B> {
    pub fn new(config: CanvasConfig, backend: B) -> Result<Self, ConfigError> {
        config.validate()?;
        let editor = Editor::new(History::new(config.history_capacity));
        let gateway = SyncGateway::new(config.canvas_id.clone(), config.autosave_delay());
        let chat = ChatFeed::with_poll_interval(
            config.canvas_id.clone(),
            config.user.clone(),
            config.chat_poll_interval(),
        );
        let status_refresh = Ticker::new(config.status_refresh_interval());
        Ok(Self {
            config,
            backend,
            editor,
            gateway,
            chat,
            status_refresh,
            status_label: String::new(),
            save_requested: false,
            events: Vec::new(),
        })
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn gateway(&self) -> &SyncGateway {
        &self.gateway
    }

    pub fn chat(&self) -> &ChatFeed {
        &self.chat
    }

    /// Drain pending host notifications.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    /// Load the canvas. Call once before anything else.
    pub async fn load(&mut self) -> BackendResult<()> {
        self.gateway.load(&self.backend, &mut self.editor).await
    }

    /// Run an editor operation and route whatever it produced.
    pub fn edit<R>(&mut self, now: Instant, f: impl FnOnce(&mut Editor) -> R) -> R {
        let result = f(&mut self.editor);
        self.route_editor_events(now);
        result
    }

    pub fn handle_pointer(&mut self, event: PointerEvent, now: Instant) {
        self.edit(now, |editor| editor.handle_pointer(event));
    }

    /// Returns true when the key was a shortcut.
    pub fn handle_key(&mut self, event: &KeyEvent, now: Instant) -> bool {
        self.edit(now, |editor| editor.handle_key(event))
    }

    fn route_editor_events(&mut self, now: Instant) {
        for event in self.editor.take_events() {
            match event {
                EditorEvent::DocumentChanged => self.gateway.note_local_change(&self.editor, now),
                EditorEvent::SaveRequested => self.save_requested = true,
                EditorEvent::Prompt(prompt) => self.events.push(SessionEvent::Prompt(prompt)),
                EditorEvent::ShowShortcuts => self.events.push(SessionEvent::ShowShortcuts),
            }
        }
        self.refresh_status(now);
    }

    fn refresh_status(&mut self, now: Instant) {
        let label = self.gateway.status_label(now);
        if label != self.status_label {
            self.status_label = label.clone();
            self.events.push(SessionEvent::StatusChanged(label));
        }
    }

    pub fn status_label(&self) -> &str {
        &self.status_label
    }

    /// Drive timers: debounced and requested saves, chat polling and the
    /// save indicator refresh.
    pub async fn tick(&mut self, now: Instant) {
        self.route_editor_events(now);

        let saved = if std::mem::take(&mut self.save_requested) {
            if let Err(e) = self.gateway.save_now(&self.backend, &self.editor, now).await {
                log::warn!("Requested save failed: {}", e);
            }
            true
        } else {
            self.gateway.tick(&self.backend, &self.editor, now).await.is_some()
        };

        if self.chat.poll_due(now) {
            match self.chat.refresh(&self.backend).await {
                Ok(0) => {}
                Ok(added) => self.events.push(SessionEvent::ChatUpdated { added }),
                Err(e) => log::warn!("Error loading messages: {}", e),
            }
        }

        // "Saved Nm ago" ages without any save happening.
        if self.status_refresh.tick(now) || saved {
            self.refresh_status(now);
        }
    }

    /// Save right away (toolbar button or Ctrl+S).
    pub async fn save_now(&mut self, now: Instant) -> BackendResult<()> {
        let result = self.gateway.save_now(&self.backend, &self.editor, now).await;
        self.refresh_status(now);
        result.map(|_| ())
    }

    /// The page is being hidden or closed.
    pub async fn on_page_hide(&mut self, now: Instant) {
        self.route_editor_events(now);
        if let Some(Err(e)) = self.gateway.flush(&self.backend, &self.editor, now).await {
            log::error!("Failed to save on page hide: {}", e);
        }
    }

    /// Upload files and place one element per file.
    ///
    /// Images become image elements, everything else a document element.
    /// Files land at `drop` (staggered) or the middle of the view. A failed
    /// upload is reported and does not stop the others. The active tool
    /// returns to select afterwards.
    pub async fn upload_files(&mut self, files: &[UploadFile], drop: Option<Point>, now: Instant) -> Vec<UploadOutcome> {
        let mut outcomes = Vec::with_capacity(files.len());
        for (index, file) in files.iter().enumerate() {
            let result = self.upload_one(file, drop, index).await;
            if let Err(message) = &result {
                log::error!("Upload of {} failed: {}", file.name, message);
                self.events.push(SessionEvent::UploadFailed {
                    file_name: file.name.clone(),
                    message: message.clone(),
                });
            }
            outcomes.push(UploadOutcome {
                file_name: file.name.clone(),
                result,
            });
        }
        self.editor.cancel_prompt();
        self.route_editor_events(now);
        outcomes
    }

    async fn upload_one(&mut self, file: &UploadFile, drop: Option<Point>, index: usize) -> Result<ElementId, String> {
        let uploaded = self
            .backend
            .upload(&self.config.canvas_id, file)
            .await
            .map_err(|e| e.to_string())?;
        let origin = self.editor.upload_origin(drop, index);
        let element = if file.is_image() {
            NewElement::image(origin, &uploaded.url, &uploaded.file.original_filename)
        } else {
            NewElement::document(
                origin,
                &uploaded.file.original_filename,
                &uploaded.file.file_type,
                uploaded.file.file_size,
                &uploaded.url,
            )
        };
        self.editor
            .create(element)
            .map(|element| element.id)
            .map_err(|e| e.to_string())
    }

    pub fn toggle_chat(&mut self) -> bool {
        self.chat.toggle()
    }

    pub async fn send_chat(&mut self, text: &str) -> BackendResult<Option<ChatMessage>> {
        self.chat.send(&self.backend, text).await
    }

    /// Share the pointer position and selection with collaborators.
    pub fn share_presence(&mut self, cursor: Option<Point>) {
        let state = PresenceState {
            cursor: cursor.map(|p| crate::sync::CursorPosition { x: p.x, y: p.y }),
            selection: self.editor.selection().to_vec(),
            user_name: Some(self.config.user.user_name.clone()),
        };
        self.gateway.set_presence(state);
    }

    /// Open the relay connection named by `realtime_url`.
    ///
    /// Returns `None` when no URL is configured; the session then runs
    /// without realtime sync. Feed the socket to [`Session::pump`].
    pub fn connect_realtime(&self) -> Result<Option<NativeWebSocket>, TransportError> {
        let Some(url) = self.config.realtime_url.as_deref() else {
            log::info!("No realtime URL configured, realtime sync off");
            return Ok(None);
        };
        let mut socket = NativeWebSocket::new();
        socket.connect(url)?;
        Ok(Some(socket))
    }

    /// Exchange messages with the realtime transport. Returns how many
    /// events were handled.
    pub fn pump<T: Transport + ?Sized>(&mut self, transport: &mut T) -> usize {
        let events = transport.poll_events();
        let handled = events.len();
        for event in events {
            if self.gateway.handle_event(event, &mut self.editor) {
                self.events.push(SessionEvent::DocumentReplaced);
            }
        }

        if transport.is_connected() {
            for message in self.gateway.take_outgoing() {
                if let Err(e) = transport.send(&message) {
                    log::warn!("Dropping realtime message: {}", e);
                }
            }
        }
        handled
    }
}
