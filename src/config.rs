//! Server configuration
//!
//! Defaults are usable as-is; an optional JSON file overrides them, and
//! command-line flags override the file.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};
use crate::logging::{Level, LogSink};

pub const DEFAULT_PORT: u16 = 12345;

/// Chat server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Server listen address
    pub bind_addr: SocketAddr,
    /// `"stdout"` or a file path opened in append mode
    pub log_target: String,
    /// Minimum severity written by the logging pipeline
    pub log_level: Level,
    /// Maximum lines kept in the recent-history buffer
    pub history_capacity: usize,
    /// Lines replayed by `/history`
    pub history_replay: usize,
    /// Longest accepted input line, in bytes
    pub max_line_length: usize,
    /// How long shutdown waits for sessions to close, in milliseconds
    pub shutdown_grace_ms: u64,
    /// Static credential table (username -> password)
    pub users: BTreeMap<String, String>,
    /// Words that block a chat message, matched case-insensitively
    pub banned_words: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let users = [
            ("alice", "senha123"),
            ("bob", "senha456"),
            ("charlie", "senha789"),
            ("admin", "admin123"),
        ]
        .into_iter()
        .map(|(u, p)| (u.to_string(), p.to_string()))
        .collect();

        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            log_target: "server.log".to_string(),
            log_level: Level::Debug,
            history_capacity: 100,
            history_replay: 10,
            max_line_length: 4096,
            shutdown_grace_ms: 2000,
            users,
            banned_words: vec![
                "banword".to_string(),
                "spam".to_string(),
                "palavrao".to_string(),
            ],
        }
    }
}

impl ServerConfig {
    /// Read a JSON config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ChatError::config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use the defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(ChatError::config("history_capacity must be at least 1"));
        }
        if self.history_replay == 0 {
            return Err(ChatError::config("history_replay must be at least 1"));
        }
        if self.max_line_length == 0 {
            return Err(ChatError::config("max_line_length must be at least 1"));
        }
        if self.log_target.trim().is_empty() {
            return Err(ChatError::config("log_target cannot be empty"));
        }
        Ok(())
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn log_sink(&self) -> LogSink {
        LogSink::from_target(&self.log_target)
    }
}
