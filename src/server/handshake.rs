//! Two-step login: username prompt, password prompt, registry claim

use tokio::io::AsyncRead;

use super::context::ServerContext;
use crate::error::{ChatError, Result};
use crate::protocol;
use crate::transport::{self, ConnectionId, Inbound, LineReader, Outbox};

/// Login progress of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    AwaitingUsername,
    AwaitingPassword,
    Authenticated,
    /// Terminal; the connection is closed afterwards
    Rejected,
}

/// Drives the login exchange for one connection. A failed attempt is not
/// retried on the same connection.
pub struct Handshake<'a> {
    ctx: &'a ServerContext,
    id: ConnectionId,
    outbox: &'a Outbox,
    state: HandshakeState,
}

impl<'a> Handshake<'a> {
    pub fn new(ctx: &'a ServerContext, id: ConnectionId, outbox: &'a Outbox) -> Self {
        Self {
            ctx,
            id,
            outbox,
            state: HandshakeState::AwaitingUsername,
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Run the exchange to completion and return the authenticated name
    pub async fn run<R>(&mut self, reader: &mut LineReader<R>) -> Result<String>
    where
        R: AsyncRead + Unpin,
    {
        let result = self.drive(reader).await;
        self.state = match result {
            Ok(_) => HandshakeState::Authenticated,
            Err(_) => HandshakeState::Rejected,
        };
        result
    }

    async fn drive<R>(&mut self, reader: &mut LineReader<R>) -> Result<String>
    where
        R: AsyncRead + Unpin,
    {
        self.outbox.send_line(protocol::USERNAME_PROMPT)?;
        let username = self.read_field(reader).await?;

        self.state = HandshakeState::AwaitingPassword;
        self.outbox.send_line(protocol::PASSWORD_PROMPT)?;
        let password = self.read_field(reader).await?;

        if !self.ctx.credentials.verify(&username, &password) {
            self.ctx.logger.warn(format!(
                "Falha de autenticação para username: {}",
                username
            ));
            return Err(self.reject(ChatError::invalid_credentials(username)));
        }

        if let Err(e) = self.ctx.registry.authenticate(self.id, &username).await {
            if matches!(e, ChatError::UsernameTaken(_)) {
                self.ctx.logger.warn(format!(
                    "Usuário {} já está online; conexão {} recusada",
                    username, self.id
                ));
            }
            return Err(self.reject(e));
        }

        self.outbox.send_line(protocol::welcome(&username))?;
        self.ctx
            .router
            .announce(&protocol::user_joined(&username), Some(self.id))
            .await;
        self.ctx
            .logger
            .info(format!("Usuário {} autenticado com sucesso", username));
        Ok(username)
    }

    async fn read_field<R>(&self, reader: &mut LineReader<R>) -> Result<String>
    where
        R: AsyncRead + Unpin,
    {
        match transport::read_line(reader).await? {
            Inbound::Line(line) => Ok(line),
            Inbound::Closed => Err(ChatError::connection_lost(
                "peer closed during handshake",
            )),
            Inbound::TooLong => {
                let _ = self.outbox.send_line(protocol::LINE_TOO_LONG);
                Err(ChatError::connection_lost("handshake line too long"))
            }
        }
    }

    /// Queue the client-facing notice for `err`, if it has one
    fn reject(&self, err: ChatError) -> ChatError {
        if let Some(notice) = err.notice() {
            let _ = self.outbox.send_line(notice);
        }
        err
    }
}
