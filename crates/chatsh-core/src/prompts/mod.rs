pub mod system;

pub use system::SystemPrompt;
