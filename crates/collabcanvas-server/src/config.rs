//! Server settings read from the environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const ADDR_VAR: &str = "COLLABCANVAS_ADDR";
pub const UPLOAD_DIR_VAR: &str = "COLLABCANVAS_UPLOAD_DIR";

const DEFAULT_ADDR: &str = "0.0.0.0:3030";
const DEFAULT_UPLOAD_DIR: &str = "static/uploads/canvas";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {var} {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Where uploaded files are written.
    pub upload_dir: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; missing keys use defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr_text = lookup(ADDR_VAR).unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_text.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            var: ADDR_VAR,
            value: addr_text.clone(),
            reason: e.to_string(),
        })?;

        let upload_dir = lookup(UPLOAD_DIR_VAR)
            .filter(|dir| !dir.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_UPLOAD_DIR.to_string());

        Ok(Self {
            addr,
            upload_dir: PathBuf::from(upload_dir),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.addr.port(), 3030);
        assert_eq!(config.upload_dir, PathBuf::from("static/uploads/canvas"));
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(|key| match key {
            ADDR_VAR => Some("127.0.0.1:9000".into()),
            UPLOAD_DIR_VAR => Some("/tmp/canvas".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/canvas"));
    }

    #[test]
    fn test_invalid_addr() {
        let result = ServerConfig::from_lookup(|key| (key == ADDR_VAR).then(|| "nope".to_string()));
        assert!(matches!(result, Err(ConfigError::Invalid { var: ADDR_VAR, .. })));
    }
}
