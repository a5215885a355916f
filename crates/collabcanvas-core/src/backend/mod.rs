//! Backend abstraction for persistence, uploads and chat.

mod http;
mod memory;
pub mod upload;
pub mod wire;

pub use http::HttpBackend;
pub use memory::MemoryBackend;
pub use wire::{
    ChatMessage, FileRecord, MessageType, NewChatMessage, SaveReceipt, UploadFile, UploadedFile,
};

use crate::snapshot::DocumentSnapshot;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Backend errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),
    /// The server answered with `success: false`.
    #[error("{0}")]
    Rejected(String),
    /// The response body could not be understood.
    #[error("Invalid response: {0}")]
    Decode(String),
    #[error("Not found: {0}")]
    NotFound(String),
    /// The request could not be built, e.g. a header value with
    /// characters HTTP does not allow.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl BackendError {
    /// Application failure with the server's message, or `fallback` when
    /// the server gave none.
    pub fn rejected(message: Option<String>, fallback: &str) -> Self {
        BackendError::Rejected(message.unwrap_or_else(|| fallback.to_string()))
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// The REST surface the canvas page talks to.
///
/// Implementations must be Send + Sync so a backend can be shared with a
/// background runtime.
pub trait Backend: Send + Sync {
    /// Fetch the persisted document. Unknown canvases load as empty.
    fn load(&self, canvas_id: &str) -> BoxFuture<'_, BackendResult<DocumentSnapshot>>;

    /// Persist the whole document.
    fn save(&self, canvas_id: &str, content: &DocumentSnapshot) -> BoxFuture<'_, BackendResult<SaveReceipt>>;

    /// Store a file and describe where it can be fetched.
    fn upload(&self, canvas_id: &str, file: &UploadFile) -> BoxFuture<'_, BackendResult<UploadedFile>>;

    /// Files uploaded to the canvas, newest first.
    fn list_files(&self, canvas_id: &str) -> BoxFuture<'_, BackendResult<Vec<FileRecord>>>;

    /// Chat history, oldest first.
    fn list_messages(&self, canvas_id: &str) -> BoxFuture<'_, BackendResult<Vec<ChatMessage>>>;

    /// Post a chat message as the current user.
    fn post_message(&self, canvas_id: &str, message: &NewChatMessage) -> BoxFuture<'_, BackendResult<ChatMessage>>;
}

impl<B: Backend + ?Sized> Backend for std::sync::Arc<B> {
    fn load(&self, canvas_id: &str) -> BoxFuture<'_, BackendResult<DocumentSnapshot>> {
        (**self).load(canvas_id)
    }

    fn save(&self, canvas_id: &str, content: &DocumentSnapshot) -> BoxFuture<'_, BackendResult<SaveReceipt>> {
        (**self).save(canvas_id, content)
    }

    fn upload(&self, canvas_id: &str, file: &UploadFile) -> BoxFuture<'_, BackendResult<UploadedFile>> {
        (**self).upload(canvas_id, file)
    }

    fn list_files(&self, canvas_id: &str) -> BoxFuture<'_, BackendResult<Vec<FileRecord>>> {
        (**self).list_files(canvas_id)
    }

    fn list_messages(&self, canvas_id: &str) -> BoxFuture<'_, BackendResult<Vec<ChatMessage>>> {
        (**self).list_messages(canvas_id)
    }

    fn post_message(&self, canvas_id: &str, message: &NewChatMessage) -> BoxFuture<'_, BackendResult<ChatMessage>> {
        (**self).post_message(canvas_id, message)
    }
}
