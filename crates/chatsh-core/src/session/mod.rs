#[allow(clippy::module_inception)]
pub mod session;
pub use session::{ConversationStore, StoredConversation, StoredMessage};
