//! JSON bodies exchanged with the canvas REST endpoints.
//!
//! Every response carries `success`; failures add a human-readable
//! `message`. Timestamps are naive UTC in ISO-8601 form.

use crate::snapshot::DocumentSnapshot;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// `POST .../save` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    #[serde(default)]
    pub content: DocumentSnapshot,
}

/// `POST .../save` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_saved: Option<NaiveDateTime>,
}

/// Outcome of a successful save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReceipt {
    pub last_saved: Option<NaiveDateTime>,
}

/// `GET .../load` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<DocumentSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_saved: Option<NaiveDateTime>,
}

/// A stored upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Stored name, timestamp-prefixed.
    pub filename: String,
    pub original_filename: String,
    /// Public path of the stored file.
    pub file_path: String,
    /// Lowercased extension.
    pub file_type: String,
    pub file_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploader_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_at: Option<NaiveDateTime>,
}

/// `POST .../upload` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
}

impl UploadResponse {
    pub fn stored(file: FileRecord) -> Self {
        Self {
            success: true,
            message: None,
            url: Some(file.file_path.clone()),
            filename: Some(file.filename.clone()),
            original_filename: Some(file.original_filename.clone()),
            file_type: Some(file.file_type.clone()),
            file_size: Some(file.file_size),
            file: Some(file),
        }
    }
}

/// A file to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Images become image elements; anything else becomes a document.
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

/// Where an upload ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub url: String,
    pub file: FileRecord,
}

impl TryFrom<UploadResponse> for UploadedFile {
    type Error = super::BackendError;

    fn try_from(response: UploadResponse) -> Result<Self, Self::Error> {
        if !response.success {
            return Err(super::BackendError::rejected(response.message, "Upload failed"));
        }
        let file = response
            .file
            .ok_or_else(|| super::BackendError::Decode("upload response without file".into()))?;
        let url = response.url.unwrap_or_else(|| file.file_path.clone());
        Ok(UploadedFile { url, file })
    }
}

/// `GET .../files` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub files: Vec<FileRecord>,
}

/// Chat message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    File,
}

/// A chat message as stored by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    #[serde(deserialize_with = "string_or_number")]
    pub user_id: String,
    pub user_name: String,
    pub message: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub created_at: NaiveDateTime,
}

/// User ids arrive as integers from some servers and as strings from others.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

/// `POST .../chat/messages` body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewChatMessage {
    pub message: String,
    #[serde(default)]
    pub message_type: MessageType,
}

impl NewChatMessage {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            message_type: MessageType::Text,
        }
    }
}

/// `GET .../chat/messages` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// The `message` field of a post response: the stored message on success,
/// an error string otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PostedMessage {
    Stored(ChatMessage),
    Error(String),
}

/// `POST .../chat/messages` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMessageResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<PostedMessage>,
}

/// Minimal `{success: false, message}` failure body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_save_response_with_python_timestamp() {
        let response: SaveResponse = serde_json::from_value(json!({
            "success": true,
            "message": "Canvas saved successfully",
            "last_saved": "2024-05-01T10:20:30.123456"
        }))
        .unwrap();
        assert!(response.success);
        assert!(response.last_saved.is_some());
    }

    #[test]
    fn test_post_response_variants() {
        let ok: PostMessageResponse = serde_json::from_value(json!({
            "success": true,
            "message": {
                "id": 4, "user_id": 7, "user_name": "Ada", "message": "hi",
                "message_type": "text", "created_at": "2024-05-01T10:20:30"
            }
        }))
        .unwrap();
        assert!(matches!(ok.message, Some(PostedMessage::Stored(_))));

        let err: PostMessageResponse =
            serde_json::from_value(json!({ "success": false, "message": "Permission denied" })).unwrap();
        assert_eq!(err.message, Some(PostedMessage::Error("Permission denied".into())));
    }

    #[test]
    fn test_upload_response_conversion() {
        let file = FileRecord {
            filename: "20240101_120000_a.png".into(),
            original_filename: "a.png".into(),
            file_path: "/static/uploads/canvas/20240101_120000_a.png".into(),
            file_type: "png".into(),
            file_size: 3,
            uploader_name: None,
            uploaded_at: None,
        };
        let uploaded = UploadedFile::try_from(UploadResponse::stored(file.clone())).unwrap();
        assert_eq!(uploaded.url, file.file_path);

        let failed = UploadResponse {
            success: false,
            message: Some("File type not allowed".into()),
            file: None,
            url: None,
            filename: None,
            original_filename: None,
            file_type: None,
            file_size: None,
        };
        assert_eq!(
            UploadedFile::try_from(failed),
            Err(super::super::BackendError::Rejected("File type not allowed".into()))
        );
    }

    #[test]
    fn test_upload_file_kind() {
        assert!(UploadFile::new("a.png", "image/png", vec![]).is_image());
        assert!(!UploadFile::new("a.pdf", "application/pdf", vec![]).is_image());
    }
}
