//! Line-protocol chat server
//!
//! ## Layout
//!
//! - **registry**: live sessions and the username index
//! - **handshake**: username/password login per connection
//! - **router**: broadcast, private delivery, banned words, history
//! - **commands**: slash-command parsing and dispatch
//! - **session**: the task that owns one connection
//! - **chat_server**: accept loop, shutdown and statistics

pub mod auth;
pub mod chat_server;
pub mod commands;
pub mod context;
pub mod handshake;
pub mod history;
pub mod registry;
pub mod router;
pub mod session;

pub use auth::{BannedWords, ContentFilter, CredentialStore, StaticCredentials};
pub use chat_server::{ChatServer, ServerStats};
pub use context::ServerContext;
pub use handshake::{Handshake, HandshakeState};
pub use history::History;
pub use registry::{Recipient, Session, SessionRegistry};
pub use router::MessageRouter;
pub use session::SessionHandler;
