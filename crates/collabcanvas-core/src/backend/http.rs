//! REST backend over HTTP.
//!
//! Endpoints live under `{base}/canvas/api/canvas/{id}/`. The acting user is
//! identified by the `x-user-id` and `x-user-name` headers on every request.
//! Response parsing is kept in `parse_body` so it can be tested without a
//! server.

use super::wire::{
    FilesResponse, LoadResponse, MessagesResponse, PostMessageResponse, PostedMessage, SaveRequest,
    SaveResponse, UploadResponse,
};
use super::{
    Backend, BackendError, BackendResult, BoxFuture, ChatMessage, FileRecord, NewChatMessage, SaveReceipt,
    UploadFile, UploadedFile,
};
use crate::config::{CanvasConfig, UserIdentity};
use crate::snapshot::DocumentSnapshot;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use std::time::Duration;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        BackendError::Network(e.to_string())
    }
}

pub struct HttpBackend {
    http: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, user: &UserIdentity) -> BackendResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, header_value(&user.user_id)?);
        headers.insert(USER_NAME_HEADER, header_value(&user.user_name)?);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| BackendError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Client for `config.api_base_url`, acting as `config.user`.
    pub fn from_config(config: &CanvasConfig) -> BackendResult<Self> {
        Self::new(&config.api_base_url, &config.user)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, canvas_id: &str, path: &str) -> String {
        format!("{}/canvas/api/canvas/{}/{}", self.base_url, canvas_id, path)
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> BackendResult<T> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        parse_body(status, &text)
    }
}

fn header_value(value: &str) -> BackendResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| BackendError::InvalidRequest(format!("header {value:?}: {e}")))
}

/// Decode a response body.
///
/// The service answers failures with a JSON body and a 4xx/5xx status, so
/// the body is tried first and the status only matters when the body is not
/// the expected shape.
pub(crate) fn parse_body<T: DeserializeOwned>(status: u16, text: &str) -> BackendResult<T> {
    match serde_json::from_str::<T>(text) {
        Ok(body) => Ok(body),
        Err(_) if status == 404 => Err(BackendError::NotFound(format!("HTTP {status}"))),
        Err(_) if status >= 400 => Err(BackendError::Network(format!("HTTP {status}"))),
        Err(e) => Err(BackendError::Decode(e.to_string())),
    }
}

impl Backend for HttpBackend {
    fn load(&self, canvas_id: &str) -> BoxFuture<'_, BackendResult<DocumentSnapshot>> {
        let url = self.endpoint(canvas_id, "load");
        Box::pin(async move {
            let response: LoadResponse = self.send(self.http.get(&url)).await?;
            if !response.success {
                return Err(BackendError::rejected(response.message, "Failed to load canvas"));
            }
            Ok(response.content.unwrap_or_default())
        })
    }

    fn save(&self, canvas_id: &str, content: &DocumentSnapshot) -> BoxFuture<'_, BackendResult<SaveReceipt>> {
        let url = self.endpoint(canvas_id, "save");
        let body = SaveRequest {
            content: content.clone(),
        };
        Box::pin(async move {
            let response: SaveResponse = self.send(self.http.post(&url).json(&body)).await?;
            if !response.success {
                return Err(BackendError::rejected(response.message, "Failed to save canvas"));
            }
            Ok(SaveReceipt {
                last_saved: response.last_saved,
            })
        })
    }

    fn upload(&self, canvas_id: &str, file: &UploadFile) -> BoxFuture<'_, BackendResult<UploadedFile>> {
        let url = self.endpoint(canvas_id, "upload");
        let file = file.clone();
        Box::pin(async move {
            let part = reqwest::multipart::Part::bytes(file.bytes)
                .file_name(file.name)
                .mime_str(&file.mime_type)
                .map_err(|e| BackendError::InvalidRequest(e.to_string()))?;
            let form = reqwest::multipart::Form::new().part("file", part);
            let response: UploadResponse = self.send(self.http.post(&url).multipart(form)).await?;
            UploadedFile::try_from(response)
        })
    }

    fn list_files(&self, canvas_id: &str) -> BoxFuture<'_, BackendResult<Vec<FileRecord>>> {
        let url = self.endpoint(canvas_id, "files");
        Box::pin(async move {
            let response: FilesResponse = self.send(self.http.get(&url)).await?;
            if !response.success {
                return Err(BackendError::rejected(response.message, "Failed to list files"));
            }
            Ok(response.files)
        })
    }

    fn list_messages(&self, canvas_id: &str) -> BoxFuture<'_, BackendResult<Vec<ChatMessage>>> {
        let url = self.endpoint(canvas_id, "chat/messages");
        Box::pin(async move {
            let response: MessagesResponse = self.send(self.http.get(&url)).await?;
            if !response.success {
                return Err(BackendError::rejected(response.message, "Failed to load messages"));
            }
            Ok(response.messages)
        })
    }

    fn post_message(&self, canvas_id: &str, message: &NewChatMessage) -> BoxFuture<'_, BackendResult<ChatMessage>> {
        let url = self.endpoint(canvas_id, "chat/messages");
        let body = message.clone();
        Box::pin(async move {
            let response: PostMessageResponse = self.send(self.http.post(&url).json(&body)).await?;
            posted_message(response)
        })
    }
}

fn posted_message(response: PostMessageResponse) -> BackendResult<ChatMessage> {
    match (response.success, response.message) {
        (true, Some(PostedMessage::Stored(message))) => Ok(message),
        (true, _) => Err(BackendError::Decode("post response without message".into())),
        (false, Some(PostedMessage::Error(message))) => Err(BackendError::Rejected(message)),
        (false, _) => Err(BackendError::Rejected("Failed to send message".into())),
    }
}
