//! Credential checks and message filtering
//!
//! Both are traits so the server can be built with alternative stores; the
//! defaults are built from [`ServerConfig`](crate::config::ServerConfig).

use std::collections::HashMap;

/// Decides whether a username/password pair may log in
pub trait CredentialStore: Send + Sync {
    fn verify(&self, username: &str, password: &str) -> bool;
}

/// Fixed in-memory credential table with exact-match comparison
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    users: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.users.insert(username.into(), password.into());
        self
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

impl<U, P> FromIterator<(U, P)> for StaticCredentials
where
    U: Into<String>,
    P: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (U, P)>>(iter: I) -> Self {
        Self {
            users: iter
                .into_iter()
                .map(|(u, p)| (u.into(), p.into()))
                .collect(),
        }
    }
}

impl CredentialStore for StaticCredentials {
    fn verify(&self, username: &str, password: &str) -> bool {
        self.users
            .get(username)
            .is_some_and(|expected| expected == password)
    }
}

/// Decides whether a chat message may be broadcast
pub trait ContentFilter: Send + Sync {
    fn is_banned(&self, text: &str) -> bool;
}

/// Case-insensitive substring match against a word list
#[derive(Debug, Clone, Default)]
pub struct BannedWords {
    words: Vec<String>,
}

impl BannedWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            // an empty entry would match every message
            .filter(|w| !w.is_empty())
            .collect();
        Self { words }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }
}

impl ContentFilter for BannedWords {
    fn is_banned(&self, text: &str) -> bool {
        if self.words.is_empty() {
            return false;
        }
        let lowered = text.to_lowercase();
        self.words.iter().any(|w| lowered.contains(w.as_str()))
    }
}
