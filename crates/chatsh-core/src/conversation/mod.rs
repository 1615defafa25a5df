pub mod manager;
pub mod report;
pub mod title;
pub mod transcript;

pub use manager::ConversationManager;
pub use report::ConversationReport;
pub use title::{generate_title, TitleError};
pub use transcript::{Conversation, Transcript};
