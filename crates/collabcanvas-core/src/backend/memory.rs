//! In-memory backend.

use super::upload::{allowed_file, file_extension, public_url, stamped_filename};
use super::{
    Backend, BackendError, BackendResult, BoxFuture, ChatMessage, FileRecord, NewChatMessage, SaveReceipt,
    UploadFile, UploadedFile,
};
use crate::config::UserIdentity;
use crate::snapshot::DocumentSnapshot;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

#[derive(Debug, Default, Clone)]
struct CanvasRecord {
    content: DocumentSnapshot,
    files: Vec<FileRecord>,
    messages: Vec<ChatMessage>,
}

/// In-memory backend for testing and offline use.
///
/// Behaves like the REST service: unknown canvases load empty, uploads
/// are checked against the allowed extensions, chat posts are attributed
/// to the configured user.
#[derive(Default)]
pub struct MemoryBackend {
    canvases: RwLock<HashMap<String, CanvasRecord>>,
    user: UserIdentity,
    offline: AtomicBool,
    saves: AtomicUsize,
    next_message_id: AtomicU64,
}

fn lock_error(e: impl std::fmt::Display) -> BackendError {
    BackendError::Network(format!("Lock error: {}", e))
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(user: UserIdentity) -> Self {
        Self {
            user,
            ..Self::default()
        }
    }

    /// Make every call fail with a network error until switched back.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Last saved content, if any.
    pub fn stored(&self, canvas_id: &str) -> Option<DocumentSnapshot> {
        let canvases = self.canvases.read().ok()?;
        canvases.get(canvas_id).map(|record| record.content.clone())
    }

    /// Seed a canvas as if it had been saved earlier.
    pub fn insert(&self, canvas_id: &str, content: DocumentSnapshot) -> BackendResult<()> {
        let mut canvases = self.canvases.write().map_err(lock_error)?;
        canvases.entry(canvas_id.to_string()).or_default().content = content;
        Ok(())
    }

    /// Add a chat message from another user.
    pub fn push_message(&self, canvas_id: &str, from: &UserIdentity, text: &str) -> BackendResult<ChatMessage> {
        let message = self.new_message(from, &NewChatMessage::text(text));
        let mut canvases = self.canvases.write().map_err(lock_error)?;
        canvases
            .entry(canvas_id.to_string())
            .or_default()
            .messages
            .push(message.clone());
        Ok(message)
    }

    fn new_message(&self, from: &UserIdentity, message: &NewChatMessage) -> ChatMessage {
        ChatMessage {
            id: self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1,
            user_id: from.user_id.clone(),
            user_name: from.user_name.clone(),
            message: message.message.clone(),
            message_type: message.message_type,
            file_path: None,
            created_at: Utc::now().naive_utc(),
        }
    }

    fn check_online(&self) -> BackendResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(BackendError::Network("backend offline".into()));
        }
        Ok(())
    }
}

impl Backend for MemoryBackend {
    fn load(&self, canvas_id: &str) -> BoxFuture<'_, BackendResult<DocumentSnapshot>> {
        let canvas_id = canvas_id.to_string();
        Box::pin(async move {
            self.check_online()?;
            let canvases = self.canvases.read().map_err(lock_error)?;
            Ok(canvases
                .get(&canvas_id)
                .map(|record| record.content.clone())
                .unwrap_or_default())
        })
    }

    fn save(&self, canvas_id: &str, content: &DocumentSnapshot) -> BoxFuture<'_, BackendResult<SaveReceipt>> {
        let canvas_id = canvas_id.to_string();
        let content = content.clone();
        Box::pin(async move {
            self.check_online()?;
            let mut canvases = self.canvases.write().map_err(lock_error)?;
            canvases.entry(canvas_id).or_default().content = content;
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(SaveReceipt {
                last_saved: Some(Utc::now().naive_utc()),
            })
        })
    }

    fn upload(&self, canvas_id: &str, file: &UploadFile) -> BoxFuture<'_, BackendResult<UploadedFile>> {
        let canvas_id = canvas_id.to_string();
        let file = file.clone();
        Box::pin(async move {
            self.check_online()?;
            if file.name.is_empty() {
                return Err(BackendError::Rejected("No file selected".into()));
            }
            let Some(file_type) = file_extension(&file.name).filter(|_| allowed_file(&file.name)) else {
                return Err(BackendError::Rejected("File type not allowed".into()));
            };

            let now = Utc::now().naive_utc();
            let filename = stamped_filename(&file.name, now);
            let record = FileRecord {
                file_path: public_url(&filename),
                filename,
                original_filename: file.name.clone(),
                file_type,
                file_size: file.bytes.len() as u64,
                uploader_name: Some(self.user.user_name.clone()),
                uploaded_at: Some(now),
            };

            let mut canvases = self.canvases.write().map_err(lock_error)?;
            canvases.entry(canvas_id).or_default().files.insert(0, record.clone());
            Ok(UploadedFile {
                url: record.file_path.clone(),
                file: record,
            })
        })
    }

    fn list_files(&self, canvas_id: &str) -> BoxFuture<'_, BackendResult<Vec<FileRecord>>> {
        let canvas_id = canvas_id.to_string();
        Box::pin(async move {
            self.check_online()?;
            let canvases = self.canvases.read().map_err(lock_error)?;
            Ok(canvases.get(&canvas_id).map(|r| r.files.clone()).unwrap_or_default())
        })
    }

    fn list_messages(&self, canvas_id: &str) -> BoxFuture<'_, BackendResult<Vec<ChatMessage>>> {
        let canvas_id = canvas_id.to_string();
        Box::pin(async move {
            self.check_online()?;
            let canvases = self.canvases.read().map_err(lock_error)?;
            Ok(canvases.get(&canvas_id).map(|r| r.messages.clone()).unwrap_or_default())
        })
    }

    fn post_message(&self, canvas_id: &str, message: &NewChatMessage) -> BoxFuture<'_, BackendResult<ChatMessage>> {
        let canvas_id = canvas_id.to_string();
        let message = message.clone();
        Box::pin(async move {
            self.check_online()?;
            let stored = self.new_message(&self.user, &message);
            let mut canvases = self.canvases.write().map_err(lock_error)?;
            canvases.entry(canvas_id).or_default().messages.push(stored.clone());
            Ok(stored)
        })
    }
}
