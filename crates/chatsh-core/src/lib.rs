pub mod chat;
pub mod config;
pub mod conversation;
pub mod prompts;
pub mod providers;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use chat::{ChatOrchestrator, Spinner, StdoutTerminal, Terminal, TurnEnd, TurnReport};
pub use config::ChatConfig;
pub use conversation::{Conversation, ConversationManager, ConversationReport, Transcript};
pub use prompts::SystemPrompt;
pub use providers::provider::{
    ChatModel, ChatRequest, LlmProvider, Message, ProviderError, Role, StreamChunk,
};
pub use providers::OpenAiProvider;
pub use session::{ConversationStore, StoredConversation, StoredMessage};
