//! Multi-user line-oriented chat server
//!
//! This library provides a TCP chat server speaking a plain-text line
//! protocol: a two-step login, public broadcast, private messages, and a
//! small slash-command set. All diagnostics flow through an asynchronous
//! logging pipeline with a single writer thread.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod server;
pub mod transport;

pub use cli::CliArgs;
pub use config::ServerConfig;
pub use error::{ChatError, Result};
pub use logging::{Level, LogSink, Logger, PipelineLayer};
pub use server::{ChatServer, ServerStats};

use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Generate a unique message ID
pub fn generate_message_id() -> String {
    Uuid::new_v4().to_string()
}

/// Get current timestamp in milliseconds since UNIX epoch
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A line produced by the server for one or more clients
#[derive(Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub id: String,
    /// `None` for system notices
    pub sender: Option<String>,
    /// `Some` only for private messages
    pub recipient: Option<String>,
    pub body: String,
    pub timestamp: u64,
}

impl ChatMessage {
    pub fn system(body: impl Into<String>) -> Self {
        Self::build(None, None, body.into())
    }

    pub fn chat(sender: &str, body: impl Into<String>) -> Self {
        Self::build(Some(sender.to_string()), None, body.into())
    }

    pub fn private(sender: &str, recipient: &str, body: impl Into<String>) -> Self {
        Self::build(
            Some(sender.to_string()),
            Some(recipient.to_string()),
            body.into(),
        )
    }

    fn build(sender: Option<String>, recipient: Option<String>, body: String) -> Self {
        Self {
            id: generate_message_id(),
            sender,
            recipient,
            body,
            timestamp: current_timestamp(),
        }
    }

    pub fn is_private(&self) -> bool {
        self.recipient.is_some()
    }

    /// Wire form of the message, without the trailing newline
    pub fn render(&self) -> String {
        match (&self.sender, &self.recipient) {
            (Some(sender), Some(_)) => protocol::private_line(sender, &self.body),
            (Some(sender), None) => protocol::chat_line(sender, &self.body),
            (None, _) => protocol::system(&self.body),
        }
    }
}
