//! Session registry
//!
//! Tracks every live connection and the username each authenticated one
//! holds. All state lives behind one lock so the "is this username free?"
//! check and the claim happen atomically.

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::current_timestamp;
use crate::error::{ChatError, Result};
use crate::transport::{ConnectionId, Outbox};

/// One connected client
#[derive(Debug, Clone)]
pub struct Session {
    pub id: ConnectionId,
    /// Peer address as reported by the acceptor
    pub remote_addr: String,
    /// Set together with `authenticated`
    pub username: Option<String>,
    pub authenticated: bool,
    pub outbox: Outbox,
    pub connected_at: u64,
}

impl Session {
    pub fn new(id: ConnectionId, remote_addr: impl Into<String>, outbox: Outbox) -> Self {
        Self {
            id,
            remote_addr: remote_addr.into(),
            username: None,
            authenticated: false,
            outbox,
            connected_at: current_timestamp(),
        }
    }
}

/// Delivery target copied out of the registry
#[derive(Debug, Clone)]
pub struct Recipient {
    pub id: ConnectionId,
    pub username: String,
    pub outbox: Outbox,
}

#[derive(Debug, Default)]
struct RegistryState {
    sessions: HashMap<ConnectionId, Session>,
    /// Authenticated username -> owning connection
    usernames: HashMap<String, ConnectionId>,
}

/// Shared table of live sessions
///
/// Every operation takes the same exclusive lock, so lookups never overlap
/// a claim or a removal.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    state: Mutex<RegistryState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a freshly accepted, unauthenticated session
    pub async fn register(&self, session: Session) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.sessions.contains_key(&session.id) {
            return Err(ChatError::duplicate_connection(session.id.to_string()));
        }
        state.sessions.insert(session.id, session);
        Ok(())
    }

    /// Claim `username` for the session `id`.
    ///
    /// Fails with `UsernameTaken` if any other session already holds the
    /// name, and with `ConnectionLost` if `id` is no longer registered.
    pub async fn authenticate(&self, id: ConnectionId, username: &str) -> Result<()> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        match state.usernames.get(username) {
            Some(owner) if *owner == id => return Ok(()),
            Some(_) => return Err(ChatError::username_taken(username)),
            None => {}
        }

        let session = state
            .sessions
            .get_mut(&id)
            .ok_or_else(|| ChatError::connection_lost(format!("session {} is gone", id)))?;
        if let Some(previous) = session.username.replace(username.to_string()) {
            state.usernames.remove(&previous);
        }
        session.authenticated = true;
        state.usernames.insert(username.to_string(), id);
        Ok(())
    }

    /// Remove a session, releasing its username. Unknown ids are ignored.
    pub async fn remove(&self, id: ConnectionId) -> Option<Session> {
        let mut state = self.state.lock().await;
        let session = state.sessions.remove(&id)?;
        if let Some(ref name) = session.username {
            state.usernames.remove(name);
        }
        Some(session)
    }

    /// Sorted names of all authenticated sessions
    pub async fn snapshot_authenticated_usernames(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut names: Vec<String> = state.usernames.keys().cloned().collect();
        names.sort();
        names
    }

    /// Connection currently holding `username`
    pub async fn lookup(&self, username: &str) -> Option<ConnectionId> {
        let state = self.state.lock().await;
        state.usernames.get(username).copied()
    }

    /// Copy of the session registered under `id`
    pub async fn session(&self, id: ConnectionId) -> Option<Session> {
        let state = self.state.lock().await;
        state.sessions.get(&id).cloned()
    }

    /// Every authenticated session except `exclude`
    pub async fn recipients(&self, exclude: Option<ConnectionId>) -> Vec<Recipient> {
        let state = self.state.lock().await;
        state
            .sessions
            .values()
            .filter(|s| s.authenticated && Some(s.id) != exclude)
            .filter_map(|s| {
                s.username.as_ref().map(|name| Recipient {
                    id: s.id,
                    username: name.clone(),
                    outbox: s.outbox.clone(),
                })
            })
            .collect()
    }

    /// The authenticated session holding `username`
    pub async fn recipient(&self, username: &str) -> Option<Recipient> {
        let state = self.state.lock().await;
        let id = state.usernames.get(username)?;
        state.sessions.get(id).map(|s| Recipient {
            id: s.id,
            username: username.to_string(),
            outbox: s.outbox.clone(),
        })
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.sessions.is_empty()
    }

    pub async fn authenticated_count(&self) -> usize {
        self.state.lock().await.usernames.len()
    }
}
