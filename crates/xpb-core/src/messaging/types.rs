use crate::domain::ChatId;

/// One inbound event from the chat backend.
#[derive(Clone, Debug)]
pub struct Update {
    pub update_id: i64,
    /// Absent for non-message events (edits, callbacks, membership changes).
    pub message: Option<IncomingMessage>,
}

#[derive(Clone, Debug)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub text: Option<String>,
}

/// A parsed `/command args` invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandCall {
    pub name: String,
    pub args: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotCommandInfo {
    pub command: String,
    pub description: String,
}

impl IncomingMessage {
    pub fn command(&self) -> Option<CommandCall> {
        self.text.as_deref().and_then(parse_command)
    }
}

/// Parse `/cmd@botname arg1 ...` into a lower-cased name and the trimmed rest.
pub fn parse_command(text: &str) -> Option<CommandCall> {
    let text = text.trim_start();
    if !text.starts_with('/') {
        return None;
    }

    let mut parts = text.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("");
    let args = parts.next().unwrap_or("").trim().to_string();

    let name = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();
    if name.is_empty() {
        return None;
    }

    Some(CommandCall { name, args })
}
