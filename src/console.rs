//! Line commands for the interactive binary.

use crate::error::ChatResult;
use crate::services::ChatSession;

pub const HELP: &str = "commands: /users | /channels | /create <channel> | /join <channel> | \
/pub <channel> <text> | /msg <user> <text> | /quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Users,
    Channels,
    Create(String),
    Join(String),
    Publish { channel: String, message: String },
    Message { to: String, message: String },
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty input")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// Split `rest` into a first word and the remaining text, both non-empty.
fn word_and_text(rest: &str) -> Option<(String, String)> {
    let (word, text) = rest.split_once(char::is_whitespace)?;
    let text = text.trim();
    if word.is_empty() || text.is_empty() {
        return None;
    }
    Some((word.to_string(), text.to_string()))
}

fn single_word(rest: &str) -> Option<String> {
    let mut words = rest.split_whitespace();
    match (words.next(), words.next()) {
        (Some(word), None) => Some(word.to_string()),
        _ => None,
    }
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim();
        if line.is_empty() {
            return Err(ParseError::Empty);
        }
        let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();

        match name {
            "/users" => Ok(Command::Users),
            "/channels" => Ok(Command::Channels),
            "/create" => single_word(rest)
                .map(Command::Create)
                .ok_or(ParseError::Usage("/create <channel>")),
            "/join" => single_word(rest)
                .map(Command::Join)
                .ok_or(ParseError::Usage("/join <channel>")),
            "/pub" => word_and_text(rest)
                .map(|(channel, message)| Command::Publish { channel, message })
                .ok_or(ParseError::Usage("/pub <channel> <text>")),
            "/msg" => word_and_text(rest)
                .map(|(to, message)| Command::Message { to, message })
                .ok_or(ParseError::Usage("/msg <user> <text>")),
            "/help" => Ok(Command::Help),
            "/quit" => Ok(Command::Quit),
            other => Err(ParseError::Unknown(other.to_string())),
        }
    }
}

/// Run one command against the session; returns the line to show the user.
pub async fn execute(session: &ChatSession, command: Command) -> ChatResult<String> {
    let output = match command {
        Command::Users => format!("users: {}", session.list_users().await?.join(", ")),
        Command::Channels => format!("channels: {}", session.list_channels().await?.join(", ")),
        Command::Create(channel) => {
            session.create_channel(&channel).await?;
            format!("channel '{}' created", channel)
        }
        Command::Join(channel) => {
            session.subscribe_to_channel(&channel).await;
            format!("listening on '{}'", channel)
        }
        Command::Publish { channel, message } => {
            session.publish(&channel, &message).await?;
            format!("sent to '{}'", channel)
        }
        Command::Message { to, message } => {
            session.send_message(&to, &message).await?;
            format!("sent to {}", to)
        }
        Command::Help => HELP.to_string(),
        Command::Quit => "bye".to_string(),
    };
    Ok(output)
}
