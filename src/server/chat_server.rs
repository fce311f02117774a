//! Accept loop and server lifecycle
//!
//! The server accepts connections until its cancellation token fires, then
//! stops accepting, lets every session send its shutdown notice, and waits
//! for the session tasks for at most the configured grace period.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;

use super::auth::{ContentFilter, CredentialStore};
use super::context::ServerContext;
use super::session::SessionHandler;
use crate::config::ServerConfig;
use crate::error::{ChatError, Result};
use crate::logging::Logger;
use crate::transport::{Acceptor, Connection};

/// Line-protocol chat server
pub struct ChatServer {
    ctx: Arc<ServerContext>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    local_addr: OnceLock<SocketAddr>,
}

impl ChatServer {
    /// Create a server whose credentials and banned words come from `config`
    pub fn new(config: ServerConfig, logger: Logger) -> Self {
        Self::with_context(ServerContext::new(config, logger))
    }

    /// Create a server with custom credential and filter implementations
    pub fn with_parts(
        config: ServerConfig,
        credentials: Arc<dyn CredentialStore>,
        filter: Arc<dyn ContentFilter>,
        logger: Logger,
    ) -> Self {
        Self::with_context(ServerContext::with_parts(config, credentials, filter, logger))
    }

    fn with_context(ctx: ServerContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            local_addr: OnceLock::new(),
        }
    }

    pub fn context(&self) -> Arc<ServerContext> {
        Arc::clone(&self.ctx)
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self) -> Result<()> {
        let addr = self.ctx.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ChatError::network(format!("failed to bind {}: {}", addr, e)))?;
        self.run_with_listener(listener).await
    }

    /// Serve connections from `acceptor` until shutdown.
    ///
    /// Returns an error only when the acceptor itself fails; session
    /// failures never reach this level.
    pub async fn run_with_listener<A: Acceptor>(&self, mut acceptor: A) -> Result<()> {
        let local = acceptor.local_addr()?;
        let _ = self.local_addr.set(local);
        self.ctx
            .logger
            .info(format!("Servidor escutando em {}", local));

        let result = self.accept_loop(&mut acceptor).await;
        drop(acceptor);

        self.shutdown.cancel();
        self.drain_sessions().await;
        result
    }

    async fn accept_loop<A: Acceptor>(&self, acceptor: &mut A) -> Result<()> {
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    self.ctx.logger.info("Encerramento solicitado; parando de aceitar conexões");
                    return Ok(());
                }
                accepted = acceptor.accept() => match accepted {
                    Ok((conn, peer)) => self.spawn_session(conn, peer),
                    Err(e) if is_transient(&e) => {
                        self.ctx.logger.error(format!("Falha no accept(): {}", e));
                    }
                    Err(e) => {
                        self.ctx.logger.error(format!("Falha fatal no accept(): {}", e));
                        return Err(ChatError::network(format!("accept failed: {}", e)));
                    }
                }
            }
        }
    }

    fn spawn_session<C: Connection>(&self, conn: C, peer: String) {
        let handler = SessionHandler::new(Arc::clone(&self.ctx), peer, self.shutdown.child_token());
        debug!(connection = %handler.id(), "spawning session task");
        self.tracker.spawn(handler.run(conn));
    }

    async fn drain_sessions(&self) {
        self.tracker.close();
        let grace = self.ctx.config.shutdown_grace();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            self.ctx.logger.warn(format!(
                "{} sessões não encerraram em {:?}",
                self.tracker.len(),
                grace
            ));
        }
        self.ctx.logger.info("Servidor encerrado");
    }

    /// Ask the server to stop. `run` returns once sessions have drained.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Address the acceptor is bound to, once `run` has started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Get server statistics
    pub async fn stats(&self) -> ServerStats {
        ServerStats {
            total_connections: self.ctx.registry.len().await,
            authenticated_connections: self.ctx.registry.authenticated_count().await,
            history_len: self.ctx.router.history_len(),
            bind_address: self.local_addr().unwrap_or(self.ctx.config.bind_addr),
        }
    }
}

/// Accept errors caused by a single peer rather than the listener
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
            | io::ErrorKind::TimedOut
    )
}

/// Server statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStats {
    pub total_connections: usize,
    pub authenticated_connections: usize,
    pub history_len: usize,
    pub bind_address: SocketAddr,
}
