//! Error handling for the chat server

use std::fmt;

use crate::protocol;

/// Result type alias for chat operations
pub type Result<T> = std::result::Result<T, ChatError>;

/// Chat server error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    /// Peer closed the connection or the transport failed
    ConnectionLost(String),
    /// Username/password pair rejected by the credential store
    InvalidCredentials(String),
    /// Another connected session already holds this username
    UsernameTaken(String),
    /// A connection id was registered twice
    DuplicateConnection(String),
    /// Private message target is not online
    UnknownRecipient(String),
    /// Message matched the banned-word filter
    ContentBlocked(String),
    /// Malformed command arguments
    UsageError(String),
    /// Line started with `/` but named no known command
    UnknownCommand(String),
    /// Listener-level network errors
    Network(String),
    /// Configuration error
    Config(String),
    /// Server internal error
    Internal(String),
}

impl ChatError {
    /// Get error code for this error type
    pub fn code(&self) -> u32 {
        match self {
            ChatError::ConnectionLost(_) => 1000,
            ChatError::InvalidCredentials(_) => 1001,
            ChatError::UsernameTaken(_) => 1002,
            ChatError::DuplicateConnection(_) => 1003,
            ChatError::UnknownRecipient(_) => 1004,
            ChatError::ContentBlocked(_) => 1005,
            ChatError::UsageError(_) => 1006,
            ChatError::UnknownCommand(_) => 1007,
            ChatError::Network(_) => 1008,
            ChatError::Config(_) => 1009,
            ChatError::Internal(_) => 1010,
        }
    }

    /// Get human-readable error message
    pub fn message(&self) -> &str {
        match self {
            ChatError::ConnectionLost(msg) => msg,
            ChatError::InvalidCredentials(msg) => msg,
            ChatError::UsernameTaken(msg) => msg,
            ChatError::DuplicateConnection(msg) => msg,
            ChatError::UnknownRecipient(msg) => msg,
            ChatError::ContentBlocked(msg) => msg,
            ChatError::UsageError(msg) => msg,
            ChatError::UnknownCommand(msg) => msg,
            ChatError::Network(msg) => msg,
            ChatError::Config(msg) => msg,
            ChatError::Internal(msg) => msg,
        }
    }

    /// The single line sent back to the originating client, if this error
    /// is one the client is allowed to see.
    pub fn notice(&self) -> Option<String> {
        match self {
            ChatError::InvalidCredentials(_) => Some(protocol::AUTH_FAILED.to_string()),
            ChatError::UsernameTaken(_) => Some(protocol::ALREADY_ONLINE.to_string()),
            ChatError::UnknownRecipient(user) => Some(protocol::unknown_recipient(user)),
            ChatError::ContentBlocked(_) => Some(protocol::MESSAGE_BLOCKED.to_string()),
            ChatError::UsageError(_) => Some(protocol::PRIVATE_USAGE.to_string()),
            ChatError::UnknownCommand(_) => Some(protocol::UNKNOWN_COMMAND.to_string()),
            _ => None,
        }
    }

    /// Whether the session survives this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ChatError::UnknownRecipient(_)
                | ChatError::ContentBlocked(_)
                | ChatError::UsageError(_)
                | ChatError::UnknownCommand(_)
        )
    }

    /// Create a connection lost error
    pub fn connection_lost<T: Into<String>>(msg: T) -> Self {
        ChatError::ConnectionLost(msg.into())
    }

    /// Create an invalid credentials error
    pub fn invalid_credentials<T: Into<String>>(msg: T) -> Self {
        ChatError::InvalidCredentials(msg.into())
    }

    /// Create a username taken error
    pub fn username_taken<T: Into<String>>(msg: T) -> Self {
        ChatError::UsernameTaken(msg.into())
    }

    /// Create a duplicate connection error
    pub fn duplicate_connection<T: Into<String>>(msg: T) -> Self {
        ChatError::DuplicateConnection(msg.into())
    }

    /// Create an unknown recipient error
    pub fn unknown_recipient<T: Into<String>>(msg: T) -> Self {
        ChatError::UnknownRecipient(msg.into())
    }

    /// Create a content blocked error
    pub fn content_blocked<T: Into<String>>(msg: T) -> Self {
        ChatError::ContentBlocked(msg.into())
    }

    /// Create a usage error
    pub fn usage<T: Into<String>>(msg: T) -> Self {
        ChatError::UsageError(msg.into())
    }

    /// Create an unknown command error
    pub fn unknown_command<T: Into<String>>(msg: T) -> Self {
        ChatError::UnknownCommand(msg.into())
    }

    /// Create a network error
    pub fn network<T: Into<String>>(msg: T) -> Self {
        ChatError::Network(msg.into())
    }

    /// Create a configuration error
    pub fn config<T: Into<String>>(msg: T) -> Self {
        ChatError::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal<T: Into<String>>(msg: T) -> Self {
        ChatError::Internal(msg.into())
    }
}

impl fmt::Display for ChatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatError::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            ChatError::InvalidCredentials(msg) => write!(f, "Invalid credentials: {}", msg),
            ChatError::UsernameTaken(msg) => write!(f, "Username taken: {}", msg),
            ChatError::DuplicateConnection(msg) => write!(f, "Duplicate connection: {}", msg),
            ChatError::UnknownRecipient(msg) => write!(f, "Unknown recipient: {}", msg),
            ChatError::ContentBlocked(msg) => write!(f, "Content blocked: {}", msg),
            ChatError::UsageError(msg) => write!(f, "Usage error: {}", msg),
            ChatError::UnknownCommand(msg) => write!(f, "Unknown command: {}", msg),
            ChatError::Network(msg) => write!(f, "Network error: {}", msg),
            ChatError::Config(msg) => write!(f, "Configuration error: {}", msg),
            ChatError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<std::io::Error> for ChatError {
    fn from(err: std::io::Error) -> Self {
        ChatError::Network(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        ChatError::Config(format!("JSON error: {}", err))
    }
}

impl From<tokio_util::codec::AnyDelimiterCodecError> for ChatError {
    fn from(err: tokio_util::codec::AnyDelimiterCodecError) -> Self {
        ChatError::ConnectionLost(format!("line framing error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct() {
        let errors = [
            ChatError::connection_lost("x"),
            ChatError::invalid_credentials("x"),
            ChatError::username_taken("x"),
            ChatError::duplicate_connection("x"),
            ChatError::unknown_recipient("x"),
            ChatError::content_blocked("x"),
            ChatError::usage("x"),
            ChatError::unknown_command("x"),
            ChatError::network("x"),
            ChatError::config("x"),
            ChatError::internal("x"),
        ];
        let mut codes: Vec<u32> = errors.iter().map(|e| e.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_notice_only_for_client_facing_errors() {
        assert_eq!(
            ChatError::unknown_recipient("dave").notice().as_deref(),
            Some("[SISTEMA] Usuário 'dave' não encontrado.")
        );
        assert!(ChatError::connection_lost("eof").notice().is_none());
        assert!(ChatError::internal("boom").notice().is_none());
        assert!(ChatError::duplicate_connection("id").notice().is_none());
    }

    #[test]
    fn test_recoverable_errors_keep_session_alive() {
        assert!(ChatError::content_blocked("spam").is_recoverable());
        assert!(ChatError::usage("/msg").is_recoverable());
        assert!(!ChatError::username_taken("alice").is_recoverable());
        assert!(!ChatError::connection_lost("eof").is_recoverable());
    }

    #[test]
    fn test_display_includes_message() {
        let err = ChatError::username_taken("alice");
        assert_eq!(err.to_string(), "Username taken: alice");
        assert_eq!(err.message(), "alice");
    }
}
