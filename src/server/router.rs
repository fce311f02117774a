//! Message routing: broadcast, private delivery, filtering and history

use std::sync::Arc;

use tracing::debug;

use super::auth::ContentFilter;
use super::history::History;
use super::registry::SessionRegistry;
use crate::ChatMessage;
use crate::error::{ChatError, Result};
use crate::logging::Logger;
use crate::transport::ConnectionId;

/// Delivers rendered lines to sessions
///
/// Recipient lists are copied out of the registry first, so no lock is
/// held while lines are queued on outboxes.
pub struct MessageRouter {
    registry: Arc<SessionRegistry>,
    history: History,
    filter: Arc<dyn ContentFilter>,
    logger: Logger,
}

impl MessageRouter {
    pub fn new(
        registry: Arc<SessionRegistry>,
        history_capacity: usize,
        filter: Arc<dyn ContentFilter>,
        logger: Logger,
    ) -> Self {
        Self {
            registry,
            history: History::new(history_capacity),
            filter,
            logger,
        }
    }

    /// Send `line` to every authenticated session except `exclude`.
    /// Returns the number of sessions the line was queued for.
    pub async fn broadcast(&self, line: &str, exclude: Option<ConnectionId>) -> usize {
        let recipients = self.registry.recipients(exclude).await;
        let mut delivered = 0;

        for recipient in recipients {
            match recipient.outbox.send_line(line) {
                Ok(()) => delivered += 1,
                Err(e) => self.logger.error(format!(
                    "Erro ao enviar para {} ({}): {}",
                    recipient.username, recipient.id, e
                )),
            }
        }
        delivered
    }

    /// Deliver a private message to `to` only. Never recorded in history.
    pub async fn send_private(&self, from: &str, to: &str, body: &str) -> Result<()> {
        let Some(recipient) = self.registry.recipient(to).await else {
            return Err(ChatError::unknown_recipient(to));
        };

        let message = ChatMessage::private(from, to, body);
        if let Err(e) = recipient.outbox.send_line(message.render()) {
            // Recipient is mid-disconnect; treat it as already gone.
            debug!(recipient = to, "private delivery failed: {}", e);
            return Err(ChatError::unknown_recipient(to));
        }

        self.logger
            .info(format!("Mensagem privada de {} para {}", from, to));
        Ok(())
    }

    pub fn is_banned(&self, text: &str) -> bool {
        self.filter.is_banned(text)
    }

    pub fn record(&self, line: impl Into<String>) {
        self.history.push(line);
    }

    /// Up to `n` most recent public lines, oldest first
    pub fn recent(&self, n: usize) -> Vec<String> {
        self.history.recent(n)
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Public chat path: filter, broadcast to everyone but the sender, record
    pub async fn submit_chat(
        &self,
        from_id: ConnectionId,
        from_user: &str,
        body: &str,
    ) -> Result<usize> {
        if self.is_banned(body) {
            self.logger
                .warn(format!("Mensagem de {} bloqueada pelo filtro", from_user));
            return Err(ChatError::content_blocked(from_user));
        }

        let line = ChatMessage::chat(from_user, body).render();
        self.logger
            .info(format!("Mensagem de {}: {}", from_user, body));
        let delivered = self.broadcast(&line, Some(from_id)).await;
        self.record(line);
        Ok(delivered)
    }

    /// Broadcast a system notice and keep it in history
    pub async fn announce(&self, notice: &str, exclude: Option<ConnectionId>) -> usize {
        let delivered = self.broadcast(notice, exclude).await;
        self.record(notice);
        delivered
    }
}
