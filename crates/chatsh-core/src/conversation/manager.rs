use super::report::ConversationReport;
use super::title::generate_title;
use super::transcript::{Conversation, Transcript};
use crate::config::ChatConfig;
use crate::providers::provider::{ChatModel, LlmProvider, Message, Role};
use crate::session::ConversationStore;
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Owns the active conversation: its transcript, its persisted identity and
/// the stored flag that gates first-turn persistence.
pub struct ConversationManager {
    store: Arc<ConversationStore>,
    provider: Arc<dyn LlmProvider>,
    title_model: ChatModel,
    title_timeout: Duration,
    default_system_message: Option<String>,
    transcript: Transcript,
    conversation: Arc<Mutex<Conversation>>,
    stored: AtomicBool,
    title_task: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ConversationManager {
    pub fn new(
        config: &ChatConfig,
        store: Arc<ConversationStore>,
        provider: Arc<dyn LlmProvider>,
    ) -> Self {
        let default_system_message = config.system_message.clone();
        Self {
            store,
            provider,
            title_model: config.title_model,
            title_timeout: config.title_timeout(),
            transcript: Transcript::new(initial_messages(default_system_message.as_deref())),
            default_system_message,
            conversation: Arc::new(Mutex::new(Conversation::default())),
            stored: AtomicBool::new(false),
            title_task: std::sync::Mutex::new(None),
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_stored(&self) -> bool {
        self.stored.load(Ordering::SeqCst)
    }

    pub async fn conversation(&self) -> Conversation {
        self.conversation.lock().await.clone()
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    pub async fn current(&self) -> ConversationReport {
        if !self.is_stored() {
            return ConversationReport::NoActive;
        }
        let conversation = self.conversation.lock().await;
        match conversation.id {
            Some(id) => ConversationReport::Active {
                id,
                title: conversation.title.clone(),
            },
            None => ConversationReport::NoActive,
        }
    }

    pub async fn list(&self) -> Result<ConversationReport> {
        Ok(ConversationReport::Listed(self.store.conversations().await?))
    }

    pub async fn load(&self, id: i64) -> Result<ConversationReport> {
        let Some(stored) = self.store.find_conversation(id).await? else {
            return Ok(ConversationReport::NotFound(id));
        };
        let messages: Vec<Message> = self
            .store
            .messages(id)
            .await?
            .iter()
            .map(|m| m.to_message())
            .collect();

        self.transcript.replace_all(messages).await;
        *self.conversation.lock().await = Conversation::stored(stored.id, stored.title.clone());
        self.stored.store(true, Ordering::SeqCst);
        info!(conversation_id = id, "loaded conversation");

        Ok(ConversationReport::Loaded {
            id: stored.id,
            title: stored.title,
        })
    }

    pub async fn new_conversation(&self) -> ConversationReport {
        if !self.is_stored() {
            return ConversationReport::StartFirst;
        }
        self.reset().await;
        ConversationReport::Started
    }

    pub async fn delete(&self, id: i64) -> Result<ConversationReport> {
        if !self.store.delete_conversation(id).await? {
            return Ok(ConversationReport::NotFound(id));
        }
        let was_active = self.conversation.lock().await.id == Some(id);
        if was_active {
            self.reset().await;
        }
        info!(conversation_id = id, was_active, "deleted conversation");
        Ok(ConversationReport::Deleted(id))
    }

    pub async fn delete_all(&self) -> Result<ConversationReport> {
        let removed = self.store.delete_all().await?;
        self.reset().await;
        info!(removed, "deleted all conversations");
        Ok(ConversationReport::DeletedAll)
    }

    /// Replace the system message at the head of the transcript. A stored
    /// conversation has its system record updated in place, or gains one.
    pub async fn set_system_message(&self, content: &str) -> Result<ConversationReport> {
        let message = self.transcript.replace_system(content).await;
        if !self.is_stored() {
            return Ok(ConversationReport::SystemMessageSet);
        }
        let Some(id) = self.conversation.lock().await.id else {
            return Ok(ConversationReport::SystemMessageSet);
        };
        match self.store.find_message_by_role(id, Role::System).await? {
            Some(record) => {
                self.store
                    .update_message_content(record.id, &message.content)
                    .await?
            }
            None => {
                self.store.insert_message(id, &message).await?;
            }
        }
        Ok(ConversationReport::SystemMessageSet)
    }

    // ── Turn bookkeeping ──────────────────────────────────────────────────────

    /// Persist a finished turn. The first turn of a conversation stores the
    /// whole transcript and kicks off title generation; later turns append
    /// the user and assistant records.
    ///
    /// Both messages must already be in the transcript.
    pub async fn record_turn(
        &self,
        prompt: &str,
        user: &Message,
        assistant: &Message,
    ) -> Result<()> {
        if self
            .stored
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            let snapshot = self.transcript.snapshot().await;
            let id = match self.store.create_conversation("", &snapshot).await {
                Ok(id) => id,
                Err(e) => {
                    // Let the next turn try again.
                    self.stored.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            };
            self.conversation.lock().await.id = Some(id);
            info!(conversation_id = id, "stored new conversation");
            self.spawn_title_generation(id, prompt);
            return Ok(());
        }

        let Some(id) = self.conversation.lock().await.id else {
            warn!("stored flag set without a conversation id; turn not persisted");
            return Ok(());
        };
        self.store.insert_message(id, user).await?;
        self.store.insert_message(id, assistant).await?;
        debug!(conversation_id = id, "persisted turn");
        Ok(())
    }

    fn spawn_title_generation(&self, id: i64, prompt: &str) {
        let provider = Arc::clone(&self.provider);
        let store = Arc::clone(&self.store);
        let conversation = Arc::clone(&self.conversation);
        let model = self.title_model;
        let timeout = self.title_timeout;
        let prompt = prompt.to_string();

        let handle = tokio::spawn(async move {
            let title = match generate_title(provider, model, &prompt, timeout).await {
                Ok(title) => title,
                Err(e) => {
                    debug!(conversation_id = id, "title generation abandoned: {e}");
                    return;
                }
            };
            if let Err(e) = store.update_title(id, &title).await {
                debug!(conversation_id = id, "failed to persist title: {e:#}");
                return;
            }
            let mut active = conversation.lock().await;
            if active.id == Some(id) {
                active.title = title;
            }
        });

        let mut slot = self.title_task.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(handle);
    }

    /// Wait for an in-flight title request, if any.
    pub async fn wait_for_title(&self) {
        let handle = self
            .title_task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    async fn reset(&self) {
        self.transcript
            .replace_all(initial_messages(self.default_system_message.as_deref()))
            .await;
        *self.conversation.lock().await = Conversation::default();
        self.stored.store(false, Ordering::SeqCst);
    }
}

fn initial_messages(system_message: Option<&str>) -> Vec<Message> {
    system_message.map(Message::system).into_iter().collect()
}
