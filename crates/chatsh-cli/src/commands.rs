use thiserror::Error;

pub(crate) const HELP: &str = "\
Type a message to chat. Commands start with ':'
  :chat <words...>                 send a message
  :system <words...>               set the system message
  :conversation                    show the active conversation
  :conversation --all              list stored conversations
  :conversation --load <id>        load a conversation
  :conversation --new              start a new conversation
  :conversation --delete <id>      delete a conversation
  :conversation --delete-all       delete every conversation
  :help                            show this help
  :quit                            exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConversationCommand {
    Show,
    All,
    Load(i64),
    New,
    Delete(i64),
    DeleteAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    /// Blank line or `//` comment.
    Nothing,
    Chat(String),
    System(String),
    Conversation(ConversationCommand),
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("{0} needs some text")]
    MissingText(&'static str),
    #[error("{0} needs a conversation id")]
    MissingId(&'static str),
    #[error("not a conversation id: {0}")]
    BadId(String),
    #[error("unknown conversation option: {0}")]
    UnknownOption(String),
}

/// Split a line into words and decide what to do with it. Lines starting with
/// `:` are commands; anything else is a chat message.
pub(crate) fn parse(line: &str) -> Result<Command, CommandError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with("//") {
        return Ok(Command::Nothing);
    }
    let Some(command) = trimmed.strip_prefix(':') else {
        return Ok(Command::Chat(join_words(trimmed.split_whitespace())));
    };

    let mut words = command.split_whitespace();
    match words.next() {
        None => Ok(Command::Nothing),
        Some("chat") => text_command(words, "chat").map(Command::Chat),
        Some("system") => text_command(words, "system").map(Command::System),
        Some("conversation") => parse_conversation(words.collect()).map(Command::Conversation),
        Some("help") => Ok(Command::Help),
        Some("quit") | Some("exit") => Ok(Command::Quit),
        Some(other) => Err(CommandError::Unknown(other.to_string())),
    }
}

fn join_words<'a>(words: impl Iterator<Item = &'a str>) -> String {
    words.collect::<Vec<_>>().join(" ")
}

fn text_command<'a>(
    words: impl Iterator<Item = &'a str>,
    name: &'static str,
) -> Result<String, CommandError> {
    let text = join_words(words);
    if text.is_empty() {
        return Err(CommandError::MissingText(name));
    }
    Ok(text)
}

fn parse_conversation(args: Vec<&str>) -> Result<ConversationCommand, CommandError> {
    match args.as_slice() {
        [] => Ok(ConversationCommand::Show),
        ["--all"] => Ok(ConversationCommand::All),
        ["--new"] => Ok(ConversationCommand::New),
        ["--delete-all"] => Ok(ConversationCommand::DeleteAll),
        ["--load"] => Err(CommandError::MissingId("--load")),
        ["--delete"] => Err(CommandError::MissingId("--delete")),
        ["--load", id] => parse_id(id).map(ConversationCommand::Load),
        ["--delete", id] => parse_id(id).map(ConversationCommand::Delete),
        other => Err(CommandError::UnknownOption(other.join(" "))),
    }
}

fn parse_id(raw: &str) -> Result<i64, CommandError> {
    raw.parse().map_err(|_| CommandError::BadId(raw.to_string()))
}
