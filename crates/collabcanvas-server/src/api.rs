//! REST endpoints under `/canvas/api/canvas/{id}`.
//!
//! Callers identify themselves with `x-user-id` / `x-user-name` headers.
//! Failures answer `{success: false, message}` with a matching status.

use crate::state::SharedState;
use axum::Json;
use axum::extract::{FromRequestParts, Multipart, Path, State};
use axum::http::StatusCode;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use collabcanvas_core::backend::upload::{allowed_file, file_extension, public_url, stamped_filename};
use collabcanvas_core::backend::wire::{
    ErrorResponse, FilesResponse, LoadResponse, MessagesResponse, PostMessageResponse, PostedMessage, SaveRequest,
    SaveResponse, UploadResponse,
};
use collabcanvas_core::backend::{FileRecord, NewChatMessage};
use collabcanvas_core::config::UserIdentity;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{error, info};

/// Largest accepted upload body.
pub const MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No file selected")]
    NoFile,
    #[error("File type not allowed")]
    FileTypeNotAllowed,
    #[error("Message cannot be empty")]
    EmptyMessage,
    #[error("Invalid upload: {0}")]
    BadUpload(String),
    #[error("Upload failed: {0}")]
    Storage(#[from] std::io::Error),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::NoFile | ApiError::FileTypeNotAllowed | ApiError::EmptyMessage | ApiError::BadUpload(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

/// The calling user, taken from request headers.
pub struct Caller(pub UserIdentity);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
        };
        let fallback = UserIdentity::default();
        Ok(Caller(UserIdentity {
            user_id: header("x-user-id").unwrap_or(fallback.user_id),
            user_name: header("x-user-name").unwrap_or(fallback.user_name),
        }))
    }
}

pub async fn load_canvas(State(state): State<SharedState>, Path(canvas_id): Path<String>) -> Json<LoadResponse> {
    let record = state.canvas(&canvas_id);
    Json(LoadResponse {
        success: true,
        message: None,
        content: Some(record.content),
        title: Some(format!("Canvas {}", canvas_id)),
        last_saved: record.last_saved,
    })
}

pub async fn save_canvas(
    State(state): State<SharedState>,
    Path(canvas_id): Path<String>,
    Caller(caller): Caller,
    Json(body): Json<SaveRequest>,
) -> Json<SaveResponse> {
    let count = body.content.elements.len();
    let last_saved = state.save_canvas(&canvas_id, body.content);
    info!(canvas = %canvas_id, user = %caller.user_name, elements = count, "canvas saved");
    Json(SaveResponse {
        success: true,
        message: Some("Canvas saved successfully".to_string()),
        last_saved: Some(last_saved),
    })
}

pub async fn upload_file(
    State(state): State<SharedState>,
    Path(canvas_id): Path<String>,
    Caller(caller): Caller,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadUpload(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| ApiError::BadUpload(e.to_string()))?;
        upload = Some((file_name, bytes));
        break;
    }

    let (original, bytes) = upload.ok_or(ApiError::NoFile)?;
    if original.is_empty() {
        return Err(ApiError::NoFile);
    }
    let file_type = file_extension(&original)
        .filter(|_| allowed_file(&original))
        .ok_or(ApiError::FileTypeNotAllowed)?;

    let now = Utc::now().naive_utc();
    let stored_name = stamped_filename(&original, now);
    let upload_dir = &state.config.upload_dir;
    tokio::fs::create_dir_all(upload_dir).await?;
    tokio::fs::write(upload_dir.join(&stored_name), &bytes)
        .await
        .inspect_err(|e| error!(error = %e, "file upload failed"))?;

    let record = FileRecord {
        file_path: public_url(&stored_name),
        filename: stored_name,
        original_filename: original,
        file_type,
        file_size: bytes.len() as u64,
        uploader_name: Some(caller.user_name),
        uploaded_at: Some(now),
    };
    info!(canvas = %canvas_id, file = %record.filename, size = record.file_size, "file uploaded");
    state.add_file(&canvas_id, record.clone());
    Ok(Json(UploadResponse::stored(record)))
}

pub async fn list_files(State(state): State<SharedState>, Path(canvas_id): Path<String>) -> Json<FilesResponse> {
    Json(FilesResponse {
        success: true,
        message: None,
        files: state.files(&canvas_id),
    })
}

pub async fn list_messages(State(state): State<SharedState>, Path(canvas_id): Path<String>) -> Json<MessagesResponse> {
    Json(MessagesResponse {
        success: true,
        message: None,
        messages: state.messages(&canvas_id),
    })
}

pub async fn post_message(
    State(state): State<SharedState>,
    Path(canvas_id): Path<String>,
    Caller(caller): Caller,
    Json(body): Json<NewChatMessage>,
) -> Result<Json<PostMessageResponse>, ApiError> {
    let text = body.message.trim();
    if text.is_empty() {
        return Err(ApiError::EmptyMessage);
    }
    let message = NewChatMessage {
        message: text.to_string(),
        message_type: body.message_type,
    };
    let stored = state.post_message(&canvas_id, &caller, message);
    Ok(Json(PostMessageResponse {
        success: true,
        message: Some(PostedMessage::Stored(stored)),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::state::AppState;
    use collabcanvas_core::backend::{Backend, BackendError, HttpBackend, UploadFile};
    use collabcanvas_core::element::NewElement;
    use collabcanvas_core::store::DocumentStore;
    use kurbo::Point;

    fn test_state(upload_dir: &std::path::Path) -> SharedState {
        AppState::shared(ServerConfig {
            addr: "127.0.0.1:0".parse().unwrap(),
            upload_dir: upload_dir.to_path_buf(),
        })
    }

    /// Serve the full router on an ephemeral port.
    async fn spawn_server(state: SharedState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, crate::router(state)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_load_unknown_canvas_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let Json(response) = load_canvas(State(test_state(dir.path())), Path("5".into())).await;
        assert!(response.success);
        assert!(response.content.unwrap().is_empty());
        assert!(response.last_saved.is_none());
    }

    #[tokio::test]
    async fn test_blank_chat_message_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let result = post_message(
            State(test_state(dir.path())),
            Path("1".into()),
            Caller(UserIdentity::default()),
            Json(NewChatMessage::text("   ")),
        )
        .await;
        let err = result.err().unwrap();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Message cannot be empty");
    }

    #[tokio::test]
    async fn test_http_backend_against_server() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let base = spawn_server(state.clone()).await;
        let backend = HttpBackend::new(&base, &UserIdentity::new("7", "Ada")).unwrap();

        let mut store = DocumentStore::new();
        store.create(NewElement::text(Point::new(10.0, 20.0))).unwrap();
        let snapshot = store.snapshot();

        let receipt = backend.save("1", &snapshot).await.unwrap();
        assert!(receipt.last_saved.is_some());
        assert_eq!(backend.load("1").await.unwrap(), snapshot);

        let uploaded = backend
            .upload("1", &UploadFile::new("diagram.png", "image/png", vec![1, 2, 3, 4]))
            .await
            .unwrap();
        assert!(uploaded.url.starts_with("/static/uploads/canvas/"));
        assert_eq!(uploaded.file.file_size, 4);
        assert!(dir.path().join(&uploaded.file.filename).exists());

        let rejected = backend
            .upload("1", &UploadFile::new("tool.exe", "application/octet-stream", vec![0]))
            .await;
        assert_eq!(rejected, Err(BackendError::Rejected("File type not allowed".into())));

        let files = backend.list_files("1").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].uploader_name.as_deref(), Some("Ada"));

        let posted = backend.post_message("1", &NewChatMessage::text("hello")).await.unwrap();
        assert_eq!(posted.user_id, "7");
        assert_eq!(posted.user_name, "Ada");
        let messages = backend.list_messages("1").await.unwrap();
        assert_eq!(messages, vec![posted]);
    }
}
