//! Wire texts for the line protocol
//!
//! Every server-to-client line is one of the constants or builders below.
//! Lines carry no trailing newline; the transport's line codec appends it.

/// Prefix for prompts and system notices
pub const SYSTEM_TAG: &str = "[SISTEMA]";

pub const USERNAME_PROMPT: &str = "[SISTEMA] Digite seu username:";
pub const PASSWORD_PROMPT: &str = "[SISTEMA] Digite sua senha:";
pub const AUTH_FAILED: &str = "[SISTEMA] Autenticação falhou!";
pub const ALREADY_ONLINE: &str = "[SISTEMA] Usuário já está online!";
pub const PRIVATE_USAGE: &str = "[SISTEMA] Uso: /msg <usuario> <mensagem>";
pub const MESSAGE_BLOCKED: &str = "[SISTEMA] Mensagem bloqueada: contém palavra proibida.";
pub const UNKNOWN_COMMAND: &str = "[SISTEMA] Comando desconhecido. Use /help";
pub const HISTORY_HEADER: &str = "[SISTEMA] Últimas mensagens:";
pub const LINE_TOO_LONG: &str = "[SISTEMA] Mensagem muito longa.";
pub const SERVER_SHUTDOWN: &str = "[SISTEMA] Servidor encerrando.";

/// Static reply to `/help`
pub const HELP_LINES: &[&str] = &[
    "[SISTEMA] Comandos disponíveis:",
    "  /users, /list - Listar usuários online",
    "  /msg, /pm <user> <msg> - Mensagem privada",
    "  /history - Ver histórico recente",
    "  /help - Esta ajuda",
    "  /quit, /exit - Sair",
];

pub fn system(body: &str) -> String {
    format!("{} {}", SYSTEM_TAG, body)
}

pub fn welcome(username: &str) -> String {
    format!("[SISTEMA] Bem-vindo, {}! Use /help para comandos.", username)
}

pub fn user_joined(username: &str) -> String {
    format!("[SISTEMA] {} entrou no chat.", username)
}

pub fn user_left(username: &str) -> String {
    format!("[SISTEMA] {} saiu do chat.", username)
}

pub fn online_users(usernames: &[String]) -> String {
    format!("[SISTEMA] Usuários online: {}", usernames.join(", "))
}

pub fn unknown_recipient(username: &str) -> String {
    format!("[SISTEMA] Usuário '{}' não encontrado.", username)
}

pub fn chat_line(sender: &str, body: &str) -> String {
    format!("[{}] {}", sender, body)
}

pub fn private_line(sender: &str, body: &str) -> String {
    format!("[PRIVADO de {}] {}", sender, body)
}
