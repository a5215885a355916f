//! Client configuration.

use crate::history::MAX_UNDO_HISTORY;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Who is editing. Sent to the backend with every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub user_id: String,
    pub user_name: String,
}

impl UserIdentity {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
        }
    }
}

impl Default for UserIdentity {
    fn default() -> Self {
        Self::new("0", "Anonymous")
    }
}

/// Settings for one canvas session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub canvas_id: String,
    /// Base URL of the REST API, e.g. `http://localhost:3030`.
    pub api_base_url: String,
    /// WebSocket relay URL. Realtime sync is off when unset.
    pub realtime_url: Option<String>,
    pub user: UserIdentity,
    pub autosave_delay_ms: u64,
    pub history_capacity: usize,
    pub chat_poll_interval_ms: u64,
    pub status_refresh_interval_ms: u64,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            canvas_id: "1".to_string(),
            api_base_url: "http://localhost:3030".to_string(),
            realtime_url: None,
            user: UserIdentity::default(),
            autosave_delay_ms: 2000,
            history_capacity: MAX_UNDO_HISTORY,
            chat_poll_interval_ms: 5000,
            status_refresh_interval_ms: 30_000,
        }
    }
}

impl CanvasConfig {
    pub fn new(canvas_id: impl Into<String>) -> Self {
        Self {
            canvas_id: canvas_id.into(),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded canvas config from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.canvas_id.trim().is_empty() {
            return Err(ConfigError::Invalid("canvas_id is empty".into()));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid("history_capacity must be at least 1".into()));
        }
        if self.chat_poll_interval_ms == 0 || self.status_refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid("intervals must be positive".into()));
        }
        Ok(())
    }

    /// Realtime room for this canvas.
    pub fn room(&self) -> String {
        format!("canvas_{}", self.canvas_id)
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_delay_ms)
    }

    pub fn chat_poll_interval(&self) -> Duration {
        Duration::from_millis(self.chat_poll_interval_ms)
    }

    pub fn status_refresh_interval(&self) -> Duration {
        Duration::from_millis(self.status_refresh_interval_ms)
    }
}
