use crate::providers::provider::{Message, Role};
use tokio::sync::RwLock;

/// Identity of the active conversation. `id` stays `None` until the first
/// turn has been persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    pub id: Option<i64>,
    pub title: String,
}

impl Conversation {
    pub fn stored(id: i64, title: impl Into<String>) -> Self {
        Self {
            id: Some(id),
            title: title.into(),
        }
    }
}

/// Ordered messages of the active conversation. A system message, when
/// present, is always at index 0.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: RwLock<Vec<Message>>,
}

impl Transcript {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages: RwLock::new(system_first(messages)),
        }
    }

    pub async fn push(&self, message: Message) {
        self.messages.write().await.push(message);
    }

    /// Owned copy, safe to hand to a request builder while the turn keeps
    /// appending.
    pub async fn snapshot(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }

    pub async fn last(&self) -> Option<Message> {
        self.messages.read().await.last().cloned()
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }

    pub async fn system_message(&self) -> Option<Message> {
        self.messages
            .read()
            .await
            .first()
            .filter(|m| m.role == Role::System)
            .cloned()
    }

    /// Drop any existing system message and put `content` at the head.
    pub async fn replace_system(&self, content: impl Into<String>) -> Message {
        let message = Message::system(content);
        let mut messages = self.messages.write().await;
        messages.retain(|m| m.role != Role::System);
        messages.insert(0, message.clone());
        message
    }

    pub async fn replace_all(&self, messages: Vec<Message>) {
        *self.messages.write().await = system_first(messages);
    }
}

/// Keep at most one system message and move it to the front; relative order
/// of everything else is preserved.
fn system_first(messages: Vec<Message>) -> Vec<Message> {
    let (system, rest): (Vec<Message>, Vec<Message>) =
        messages.into_iter().partition(|m| m.role == Role::System);
    system.into_iter().last().into_iter().chain(rest).collect()
}
