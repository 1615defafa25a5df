use crate::session::StoredConversation;
use std::fmt;

/// Outcome of a conversation command. `Display` is the text shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationReport {
    NoActive,
    Active { id: i64, title: String },
    Listed(Vec<StoredConversation>),
    Loaded { id: i64, title: String },
    NotFound(i64),
    Started,
    StartFirst,
    Deleted(i64),
    DeletedAll,
    SystemMessageSet,
}

fn title_or_placeholder(title: &str) -> &str {
    if title.is_empty() {
        "(untitled)"
    } else {
        title
    }
}

impl fmt::Display for ConversationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationReport::NoActive => write!(f, "No active conversation found."),
            ConversationReport::Active { id, title } => {
                write!(f, "Conversation ID: {id} | Title: {}", title_or_placeholder(title))
            }
            ConversationReport::Listed(all) if all.is_empty() => {
                write!(f, "No conversations have been stored.")
            }
            ConversationReport::Listed(all) => {
                let lines: Vec<String> = all
                    .iter()
                    .map(|c| {
                        format!(
                            "Conversation ID: {} | Title: {}",
                            c.id,
                            title_or_placeholder(&c.title)
                        )
                    })
                    .collect();
                write!(f, "{}", lines.join("\n"))
            }
            ConversationReport::Loaded { id, title } => write!(
                f,
                "Conversation loaded. ID: {id} | Title: {}",
                title_or_placeholder(title)
            ),
            ConversationReport::NotFound(id) => write!(f, "No conversation found with ID: {id}"),
            ConversationReport::Started => write!(f, "New conversation started."),
            ConversationReport::StartFirst => write!(f, "Please start a conversation first."),
            ConversationReport::Deleted(id) => write!(f, "Conversation deleted. ID: {id}"),
            ConversationReport::DeletedAll => write!(f, "All conversations are deleted."),
            ConversationReport::SystemMessageSet => write!(f, "System message updated."),
        }
    }
}
