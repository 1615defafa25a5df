pub mod openai;
pub mod provider;

pub use openai::OpenAiProvider;
pub use provider::{
    spawn_stream, ChatModel, ChatRequest, LlmProvider, Message, ProviderError, Role, StreamChunk,
};
