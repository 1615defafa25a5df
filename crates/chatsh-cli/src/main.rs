mod commands;
mod repl;

use anyhow::Result;
use chatsh_core::{
    ChatConfig, ChatOrchestrator, ConversationManager, ConversationStore, LlmProvider,
    OpenAiProvider, StdoutTerminal, Terminal,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_logging();

    let config = ChatConfig::load()?;
    if config.api_key.is_empty() {
        warn!("no API key configured; set CHATSH_API_KEY or OPENAI_API_KEY");
    }
    info!(model = %config.model, db = %config.db_path.display(), "starting chatsh");

    let store = Arc::new(ConversationStore::open(&config.db_path).await?);
    let provider: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::new(
        config.base_url.clone(),
        config.api_key.clone(),
    ));
    let terminal: Arc<dyn Terminal> = Arc::new(StdoutTerminal);
    let conversations = Arc::new(ConversationManager::new(
        &config,
        Arc::clone(&store),
        Arc::clone(&provider),
    ));
    let chat = ChatOrchestrator::new(&config, provider, conversations, terminal);

    repl::Repl::new(chat).run().await
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("CHATSH_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
