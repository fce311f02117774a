//! Per-connection session task
//!
//! A session owns one connection for its whole life: it registers itself,
//! runs the login handshake, dispatches lines until the peer leaves, and
//! cleans up the registry on the way out. Outbound lines go through an
//! [`Outbox`] drained by a separate writer task.

use std::sync::Arc;

use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::commands::{self, Caller, Flow};
use super::context::ServerContext;
use super::handshake::Handshake;
use super::registry::Session;
use crate::error::ChatError;
use crate::protocol;
use crate::transport::{self, Connection, ConnectionId, Inbound, LineReader, Outbox};

/// Why a session ended
#[derive(Debug)]
enum Exit {
    /// `/quit` or `/exit`
    Quit,
    /// Clean EOF from the peer
    PeerClosed,
    /// Input line over the configured limit
    TooLong,
    /// Server shutdown
    Shutdown,
    /// Login failed; the handshake already notified and logged
    Rejected(ChatError),
    Failed(ChatError),
}

/// Handler for one accepted connection
pub struct SessionHandler {
    id: ConnectionId,
    remote_addr: String,
    ctx: Arc<ServerContext>,
    shutdown: CancellationToken,
}

impl SessionHandler {
    pub fn new(ctx: Arc<ServerContext>, remote_addr: String, shutdown: CancellationToken) -> Self {
        Self {
            id: ConnectionId::new(),
            remote_addr,
            ctx,
            shutdown,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Run the session to completion. Errors never escape the task.
    pub async fn run<C: Connection>(self, conn: C) {
        let (read_half, write_half) = tokio::io::split(conn);
        let (outbox, rx) = Outbox::channel();
        let writer = transport::spawn_writer(write_half, rx, self.id);
        let mut reader = transport::line_reader(read_half, self.ctx.config.max_line_length);

        self.ctx.logger.info(format!(
            "Nova conexão de {} ({})",
            self.remote_addr, self.id
        ));

        let session = Session::new(self.id, self.remote_addr.clone(), outbox.clone());
        if let Err(e) = self.ctx.registry.register(session).await {
            self.ctx
                .logger
                .error(format!("Falha ao registrar conexão {}: {}", self.id, e));
            drop(outbox);
            let _ = writer.await;
            return;
        }

        let exit = tokio::select! {
            _ = self.shutdown.cancelled() => Exit::Shutdown,
            exit = self.serve(&mut reader, &outbox) => exit,
        };

        self.finish(exit, &outbox).await;

        drop(outbox);
        drop(reader);
        let grace = self.ctx.config.shutdown_grace();
        if tokio::time::timeout(grace, writer).await.is_err() {
            debug!(connection = %self.id, "writer did not drain within {:?}", grace);
        }
    }

    async fn serve<R>(&self, reader: &mut LineReader<R>, outbox: &Outbox) -> Exit
    where
        R: AsyncRead + Unpin,
    {
        let mut handshake = Handshake::new(&self.ctx, self.id, outbox);
        let username = match handshake.run(reader).await {
            Ok(username) => username,
            Err(e) => return Exit::Rejected(e),
        };

        let caller = Caller {
            id: self.id,
            username,
            outbox: outbox.clone(),
        };

        loop {
            let line = match transport::read_line(reader).await {
                Ok(Inbound::Line(line)) => line,
                Ok(Inbound::Closed) => return Exit::PeerClosed,
                Ok(Inbound::TooLong) => return Exit::TooLong,
                Err(e) => return Exit::Failed(e),
            };

            match commands::dispatch(&self.ctx, &caller, &line).await {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => return Exit::Quit,
                Err(e) if e.is_recoverable() => {
                    if let Some(notice) = e.notice() {
                        if let Err(e) = outbox.send_line(notice) {
                            return Exit::Failed(e);
                        }
                    }
                }
                Err(e) => return Exit::Failed(e),
            }
        }
    }

    /// Deregister, announce the departure and log how the session ended
    async fn finish(&self, exit: Exit, outbox: &Outbox) {
        let removed = self.ctx.registry.remove(self.id).await;
        let username = removed.and_then(|s| s.username);
        let who = username.as_deref().unwrap_or(&self.remote_addr);

        match exit {
            Exit::Quit => {
                self.ctx
                    .logger
                    .info(format!("Cliente {} saiu com /quit", who));
            }
            Exit::PeerClosed => {
                self.ctx
                    .logger
                    .info(format!("Cliente {} desconectou", who));
            }
            Exit::TooLong => {
                let _ = outbox.send_line(protocol::LINE_TOO_LONG);
                self.ctx.logger.warn(format!(
                    "Linha acima de {} bytes de {}; conexão encerrada",
                    self.ctx.config.max_line_length, who
                ));
            }
            Exit::Shutdown => {
                let _ = outbox.send_line(protocol::SERVER_SHUTDOWN);
                debug!(connection = %self.id, "closed for shutdown");
            }
            Exit::Rejected(ChatError::ConnectionLost(reason)) => {
                self.ctx.logger.info(format!(
                    "Conexão de {} encerrada durante autenticação: {}",
                    who, reason
                ));
            }
            Exit::Rejected(e) => {
                debug!(connection = %self.id, "handshake rejected: {}", e);
            }
            Exit::Failed(ChatError::ConnectionLost(reason)) => {
                self.ctx
                    .logger
                    .error(format!("Erro de leitura de {}: {}", who, reason));
            }
            Exit::Failed(e) => {
                self.ctx
                    .logger
                    .error(format!("Sessão de {} encerrada: {}", who, e));
            }
        }

        if let Some(name) = username {
            if !self.shutdown.is_cancelled() {
                self.ctx
                    .router
                    .announce(&protocol::user_left(&name), None)
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::logging::Logger;
    use tokio::io::{
        AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
    };
    use tokio::task::JoinHandle;

    struct Client {
        lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
        writer: WriteHalf<DuplexStream>,
        task: JoinHandle<()>,
    }

    impl Client {
        fn start(ctx: &Arc<ServerContext>, token: &CancellationToken) -> Self {
            let (client, server) = tokio::io::duplex(4096);
            let handler = SessionHandler::new(Arc::clone(ctx), "duplex".to_string(), token.clone());
            let task = tokio::spawn(handler.run(server));
            let (read, writer) = tokio::io::split(client);
            Self {
                lines: BufReader::new(read).lines(),
                writer,
                task,
            }
        }

        async fn send(&mut self, line: &str) {
            self.send_raw(format!("{}\n", line).as_bytes()).await;
        }

        async fn send_raw(&mut self, bytes: &[u8]) {
            self.writer.write_all(bytes).await.unwrap();
        }

        async fn recv(&mut self) -> Option<String> {
            tokio::time::timeout(std::time::Duration::from_secs(2), self.lines.next_line())
                .await
                .expect("timed out waiting for a line")
                .unwrap()
        }

        async fn login(&mut self, user: &str, password: &str) {
            assert_eq!(self.recv().await.as_deref(), Some(protocol::USERNAME_PROMPT));
            self.send(user).await;
            assert_eq!(self.recv().await.as_deref(), Some(protocol::PASSWORD_PROMPT));
            self.send(password).await;
            assert_eq!(self.recv().await, Some(protocol::welcome(user)));
        }
    }

    fn context(config: ServerConfig) -> Arc<ServerContext> {
        Arc::new(ServerContext::new(config, Logger::new()))
    }

    #[tokio::test]
    async fn test_quit_deregisters_and_announces() {
        let ctx = context(ServerConfig::default());
        let token = CancellationToken::new();
        let mut alice = Client::start(&ctx, &token);
        alice.login("alice", "senha123").await;
        let mut bob = Client::start(&ctx, &token);
        bob.login("bob", "senha456").await;
        assert_eq!(alice.recv().await, Some(protocol::user_joined("bob")));

        bob.send("/quit").await;
        assert_eq!(bob.recv().await, None);
        bob.task.await.unwrap();

        assert_eq!(alice.recv().await, Some(protocol::user_left("bob")));
        assert_eq!(ctx.registry.snapshot_authenticated_usernames().await, vec!["alice"]);
    }

    #[tokio::test]
    async fn test_recoverable_errors_keep_session_open() {
        let ctx = context(ServerConfig::default());
        let token = CancellationToken::new();
        let mut alice = Client::start(&ctx, &token);
        alice.login("alice", "senha123").await;

        alice.send("/dance").await;
        assert_eq!(alice.recv().await.as_deref(), Some(protocol::UNKNOWN_COMMAND));
        alice.send("/msg").await;
        assert_eq!(alice.recv().await.as_deref(), Some(protocol::PRIVATE_USAGE));
        alice.send("spam spam").await;
        assert_eq!(alice.recv().await.as_deref(), Some(protocol::MESSAGE_BLOCKED));
        alice.send("/users").await;
        assert_eq!(
            alice.recv().await.as_deref(),
            Some("[SISTEMA] Usuários online: alice")
        );
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_relayed_lossily() {
        let ctx = context(ServerConfig::default());
        let token = CancellationToken::new();
        let mut alice = Client::start(&ctx, &token);
        alice.login("alice", "senha123").await;
        let mut bob = Client::start(&ctx, &token);
        bob.login("bob", "senha456").await;
        assert_eq!(alice.recv().await, Some(protocol::user_joined("bob")));

        bob.send_raw(b"ol\xe1\n").await;
        assert_eq!(alice.recv().await, Some(protocol::chat_line("bob", "ol\u{FFFD}")));

        bob.send("/users").await;
        assert_eq!(
            bob.recv().await.as_deref(),
            Some("[SISTEMA] Usuários online: alice, bob")
        );
        assert_eq!(ctx.registry.authenticated_count().await, 2);
    }

    #[tokio::test]
    async fn test_rejected_login_closes_connection() {
        let ctx = context(ServerConfig::default());
        let token = CancellationToken::new();
        let mut peer = Client::start(&ctx, &token);

        peer.recv().await;
        peer.send("alice").await;
        peer.recv().await;
        peer.send("nope").await;
        assert_eq!(peer.recv().await.as_deref(), Some(protocol::AUTH_FAILED));
        assert_eq!(peer.recv().await, None);
        peer.task.await.unwrap();
        assert!(ctx.registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_oversized_line_ends_session() {
        let config = ServerConfig {
            max_line_length: 16,
            ..ServerConfig::default()
        };
        let ctx = context(config);
        let token = CancellationToken::new();
        let mut alice = Client::start(&ctx, &token);
        alice.login("alice", "senha123").await;

        alice.send(&"x".repeat(64)).await;
        assert_eq!(alice.recv().await.as_deref(), Some(protocol::LINE_TOO_LONG));
        assert_eq!(alice.recv().await, None);
    }

    #[tokio::test]
    async fn test_shutdown_notifies_and_closes() {
        let ctx = context(ServerConfig::default());
        let token = CancellationToken::new();
        let mut alice = Client::start(&ctx, &token);
        alice.login("alice", "senha123").await;

        token.cancel();
        assert_eq!(alice.recv().await.as_deref(), Some(protocol::SERVER_SHUTDOWN));
        assert_eq!(alice.recv().await, None);
        alice.task.await.unwrap();
        assert!(ctx.registry.is_empty().await);
    }
}
