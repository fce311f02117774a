//! State shared by every session task

use std::sync::Arc;

use super::auth::{BannedWords, ContentFilter, CredentialStore, StaticCredentials};
use super::registry::SessionRegistry;
use super::router::MessageRouter;
use crate::config::ServerConfig;
use crate::logging::Logger;

/// Owned server state, handed to sessions behind an `Arc`
pub struct ServerContext {
    pub config: ServerConfig,
    pub registry: Arc<SessionRegistry>,
    pub router: MessageRouter,
    pub credentials: Arc<dyn CredentialStore>,
    pub logger: Logger,
}

impl ServerContext {
    /// Credentials and banned words come from `config`
    pub fn new(config: ServerConfig, logger: Logger) -> Self {
        let credentials: StaticCredentials = config.users.clone().into_iter().collect();
        let filter = BannedWords::new(&config.banned_words);
        Self::with_parts(config, Arc::new(credentials), Arc::new(filter), logger)
    }

    pub fn with_parts(
        config: ServerConfig,
        credentials: Arc<dyn CredentialStore>,
        filter: Arc<dyn ContentFilter>,
        logger: Logger,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let router = MessageRouter::new(
            Arc::clone(&registry),
            config.history_capacity,
            filter,
            logger.clone(),
        );
        Self {
            config,
            registry,
            router,
            credentials,
            logger,
        }
    }
}

impl std::fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerContext")
            .field("bind_addr", &self.config.bind_addr)
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}
