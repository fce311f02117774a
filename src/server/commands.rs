//! Slash-command parsing and dispatch for authenticated sessions

use super::context::ServerContext;
use crate::error::{ChatError, Result};
use crate::protocol;
use crate::transport::{ConnectionId, Outbox};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/quit`, `/exit`
    Quit,
    /// `/users`, `/list`
    Users,
    /// `/msg`, `/pm`
    Private { to: String, body: String },
    History,
    Help,
}

/// One classified input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Blank or whitespace only; ignored
    Empty,
    Chat(String),
    Command(Command),
}

/// What the session loop does after a line has been handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// The authenticated session issuing a line
#[derive(Debug, Clone)]
pub struct Caller {
    pub id: ConnectionId,
    pub username: String,
    pub outbox: Outbox,
}

/// Classify a line. Command names are case-sensitive and must start the
/// line; anything else is chat text and is kept verbatim.
pub fn parse(line: &str) -> Result<Input> {
    if line.trim().is_empty() {
        return Ok(Input::Empty);
    }
    if !line.starts_with('/') {
        return Ok(Input::Chat(line.to_string()));
    }

    let (name, rest) = split_token(line);
    let command = match name {
        "/quit" | "/exit" => Command::Quit,
        "/users" | "/list" => Command::Users,
        "/msg" | "/pm" => {
            let (to, body) = split_token(rest);
            if to.is_empty() || body.is_empty() {
                return Err(ChatError::usage(format!("{} needs a user and a message", name)));
            }
            Command::Private {
                to: to.to_string(),
                body: body.to_string(),
            }
        }
        "/history" => Command::History,
        "/help" => Command::Help,
        other => return Err(ChatError::unknown_command(other)),
    };
    Ok(Input::Command(command))
}

/// First whitespace-delimited token and the remainder with leading
/// whitespace removed
fn split_token(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(pos) => (&text[..pos], text[pos..].trim_start()),
        None => (text, ""),
    }
}

/// Handle one line from an authenticated session.
///
/// Recoverable errors (unknown recipient, blocked content, bad usage,
/// unknown command) are returned for the caller to report; the session
/// carries on afterwards.
pub async fn dispatch(ctx: &ServerContext, caller: &Caller, line: &str) -> Result<Flow> {
    match parse(line)? {
        Input::Empty => Ok(Flow::Continue),
        Input::Chat(text) => {
            ctx.router
                .submit_chat(caller.id, &caller.username, &text)
                .await?;
            Ok(Flow::Continue)
        }
        Input::Command(command) => execute(ctx, caller, command).await,
    }
}

async fn execute(ctx: &ServerContext, caller: &Caller, command: Command) -> Result<Flow> {
    match command {
        Command::Quit => return Ok(Flow::Quit),
        Command::Users => {
            let names = ctx.registry.snapshot_authenticated_usernames().await;
            caller.outbox.send_line(protocol::online_users(&names))?;
        }
        Command::Private { to, body } => {
            ctx.router.send_private(&caller.username, &to, &body).await?;
        }
        Command::History => {
            let recent = ctx.router.recent(ctx.config.history_replay);
            caller.outbox.send_line(protocol::HISTORY_HEADER)?;
            caller.outbox.send_lines(recent)?;
        }
        Command::Help => caller.outbox.send_lines(protocol::HELP_LINES.iter().copied())?,
    }
    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::logging::Logger;
    use crate::server::registry::Session;
    use tokio::sync::mpsc::UnboundedReceiver;

    #[test]
    fn test_parse_commands_and_aliases() {
        assert_eq!(parse("/quit").unwrap(), Input::Command(Command::Quit));
        assert_eq!(parse("/exit").unwrap(), Input::Command(Command::Quit));
        assert_eq!(parse("/list").unwrap(), Input::Command(Command::Users));
        assert_eq!(parse("/users extra").unwrap(), Input::Command(Command::Users));
        assert_eq!(parse("/history").unwrap(), Input::Command(Command::History));
        assert_eq!(parse("/help").unwrap(), Input::Command(Command::Help));
        assert_eq!(
            parse("/pm bob  hello there ").unwrap(),
            Input::Command(Command::Private {
                to: "bob".to_string(),
                body: "hello there ".to_string(),
            })
        );
    }

    #[test]
    fn test_parse_chat_and_empty() {
        assert_eq!(parse("hi all").unwrap(), Input::Chat("hi all".to_string()));
        assert_eq!(parse(" /help").unwrap(), Input::Chat(" /help".to_string()));
        assert_eq!(parse("").unwrap(), Input::Empty);
        assert_eq!(parse("   \t").unwrap(), Input::Empty);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("/msg"), Err(ChatError::UsageError(_))));
        assert!(matches!(parse("/msg bob"), Err(ChatError::UsageError(_))));
        assert!(matches!(parse("/msg bob   "), Err(ChatError::UsageError(_))));
        assert_eq!(parse("/dance"), Err(ChatError::unknown_command("/dance")));
        assert_eq!(parse("/QUIT"), Err(ChatError::unknown_command("/QUIT")));
    }

    async fn caller(ctx: &ServerContext, name: &str) -> (Caller, UnboundedReceiver<String>) {
        let (outbox, rx) = Outbox::channel();
        let session = Session::new(ConnectionId::new(), name, outbox.clone());
        let id = session.id;
        ctx.registry.register(session).await.unwrap();
        ctx.registry.authenticate(id, name).await.unwrap();
        let caller = Caller {
            id,
            username: name.to_string(),
            outbox,
        };
        (caller, rx)
    }

    fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(line) = rx.try_recv() {
            lines.push(line);
        }
        lines
    }

    fn context() -> ServerContext {
        ServerContext::new(ServerConfig::default(), Logger::new())
    }

    #[tokio::test]
    async fn test_users_lists_sorted_names() {
        let ctx = context();
        let (bob, mut bob_rx) = caller(&ctx, "bob").await;
        let (_alice, _alice_rx) = caller(&ctx, "alice").await;

        assert_eq!(dispatch(&ctx, &bob, "/users").await.unwrap(), Flow::Continue);
        assert_eq!(drain(&mut bob_rx), vec!["[SISTEMA] Usuários online: alice, bob"]);
    }

    #[tokio::test]
    async fn test_history_replays_recent_lines() {
        let ctx = context();
        let (alice, mut alice_rx) = caller(&ctx, "alice").await;
        for i in 0..12 {
            dispatch(&ctx, &alice, &format!("msg {}", i)).await.unwrap();
        }

        dispatch(&ctx, &alice, "/history").await.unwrap();
        let lines = drain(&mut alice_rx);
        assert_eq!(lines.len(), 11);
        assert_eq!(lines[0], protocol::HISTORY_HEADER);
        assert_eq!(lines[1], "[alice] msg 2");
        assert_eq!(lines[10], "[alice] msg 11");
    }

    #[tokio::test]
    async fn test_help_and_quit() {
        let ctx = context();
        let (alice, mut alice_rx) = caller(&ctx, "alice").await;

        dispatch(&ctx, &alice, "/help").await.unwrap();
        assert_eq!(drain(&mut alice_rx).len(), protocol::HELP_LINES.len());
        assert_eq!(dispatch(&ctx, &alice, "/quit").await.unwrap(), Flow::Quit);
    }

    #[tokio::test]
    async fn test_private_to_missing_user_is_recoverable() {
        let ctx = context();
        let (alice, mut alice_rx) = caller(&ctx, "alice").await;
        let (_bob, mut bob_rx) = caller(&ctx, "bob").await;

        let err = dispatch(&ctx, &alice, "/msg dave hi").await.unwrap_err();
        assert!(err.is_recoverable());
        assert!(drain(&mut alice_rx).is_empty());
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[tokio::test]
    async fn test_empty_lines_do_nothing() {
        let ctx = context();
        let (alice, _alice_rx) = caller(&ctx, "alice").await;
        let (_bob, mut bob_rx) = caller(&ctx, "bob").await;

        assert_eq!(dispatch(&ctx, &alice, "   ").await.unwrap(), Flow::Continue);
        assert!(drain(&mut bob_rx).is_empty());
        assert_eq!(ctx.router.history_len(), 0);
    }
}
