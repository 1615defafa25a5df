use super::normalize::normalize_output;
use super::spinner::Spinner;
use super::terminal::Terminal;
use crate::config::ChatConfig;
use crate::conversation::ConversationManager;
use crate::providers::provider::{
    spawn_stream, ChatModel, ChatRequest, LlmProvider, Message, ProviderError, Role, StreamChunk,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

pub const RATE_LIMIT_HINT: &str =
    "There might be an issue with your API key. Please check your API key and try again.";
pub const GENERIC_FAILURE_HINT: &str =
    "Oops, something went wrong. Try reloading the conversation.";

/// How a turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEnd {
    Completed,
    RateLimited,
    Failed(String),
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReport {
    /// Everything that was shown to the user, possibly partial or empty.
    pub reply: String,
    pub end: TurnEnd,
}

/// Keeps the spinner honest: whatever way the turn leaves scope, the glyph
/// is cleared.
struct SpinnerGuard {
    spinner: Arc<Spinner>,
}

impl SpinnerGuard {
    fn start(spinner: Arc<Spinner>, interval: Duration) -> Self {
        spinner.start(interval);
        Self { spinner }
    }
}

impl Drop for SpinnerGuard {
    fn drop(&mut self) {
        self.spinner.stop();
    }
}

/// Runs chat turns: one prompt in, one streamed reply out, conversation state
/// settled before control returns to the caller.
#[derive(Clone)]
pub struct ChatOrchestrator {
    provider: Arc<dyn LlmProvider>,
    conversations: Arc<ConversationManager>,
    terminal: Arc<dyn Terminal>,
    spinner: Arc<Spinner>,
    model: ChatModel,
    chat_timeout: Duration,
    spinner_interval: Duration,
}

impl ChatOrchestrator {
    pub fn new(
        config: &ChatConfig,
        provider: Arc<dyn LlmProvider>,
        conversations: Arc<ConversationManager>,
        terminal: Arc<dyn Terminal>,
    ) -> Self {
        Self {
            spinner: Arc::new(Spinner::new(Arc::clone(&terminal))),
            provider,
            conversations,
            terminal,
            model: config.model,
            chat_timeout: config.chat_timeout(),
            spinner_interval: config.spinner_interval(),
        }
    }

    pub fn with_chat_timeout(mut self, timeout: Duration) -> Self {
        self.chat_timeout = timeout;
        self
    }

    pub fn conversations(&self) -> &Arc<ConversationManager> {
        &self.conversations
    }

    /// Send `prompt` and stream the reply to the terminal. Returns once the
    /// turn has been finalized, whatever the outcome.
    pub async fn chat(&self, prompt: &str) -> TurnReport {
        let user = Message::user(prompt);
        self.conversations.transcript().push(user.clone()).await;

        let (done_tx, done_rx) = oneshot::channel();
        let this = self.clone();
        let prompt = prompt.to_string();
        let turn_prompt = prompt.clone();
        let turn_user = user.clone();
        tokio::spawn(async move {
            let report = this.run_turn(turn_prompt, turn_user).await;
            let _ = done_tx.send(report);
        });

        // A dropped sender means the turn task died before reporting.
        match done_rx.await {
            Ok(report) => report,
            Err(_) => {
                error!("chat turn ended without a report");
                self.recover_lost_turn(&prompt, user).await
            }
        }
    }

    /// Settle a turn whose task died: the transcript still gets its
    /// assistant message unless the task got that far itself.
    async fn recover_lost_turn(&self, prompt: &str, user: Message) -> TurnReport {
        self.spinner.stop();
        let end = TurnEnd::Failed("turn task aborted".into());
        self.report_failure(&end, "");

        let transcript = self.conversations.transcript();
        let finalized = transcript
            .last()
            .await
            .is_some_and(|m| m.role == Role::Assistant);
        if !finalized {
            self.finalize(prompt, user, "").await;
        }
        TurnReport {
            reply: String::new(),
            end,
        }
    }

    /// `user` is already at the tail of the transcript.
    async fn run_turn(&self, prompt: String, user: Message) -> TurnReport {
        let guard = SpinnerGuard::start(Arc::clone(&self.spinner), self.spinner_interval);

        let snapshot = self.conversations.transcript().snapshot().await;
        let request = ChatRequest::new(self.model, snapshot);
        debug!(model = %self.model, messages = request.messages.len(), "starting chat turn");

        let (mut producer, mut rx) = spawn_stream(Arc::clone(&self.provider), request);
        let mut reply = String::new();

        let streamed = tokio::time::timeout(self.chat_timeout, async {
            self.consume(&mut rx, &mut reply).await;
            (&mut producer).await
        })
        .await;

        let end = match streamed {
            Err(_) => {
                producer.abort();
                TurnEnd::TimedOut
            }
            Ok(Ok(Ok(()))) => TurnEnd::Completed,
            Ok(Ok(Err(e))) => classify(e),
            Ok(Err(join)) => TurnEnd::Failed(join.to_string()),
        };
        drop(guard);

        self.report_failure(&end, &reply);
        self.finalize(&prompt, user, &reply).await;

        TurnReport { reply, end }
    }

    /// Print deltas as they arrive. Chunks without text are skipped.
    async fn consume(&self, rx: &mut mpsc::Receiver<StreamChunk>, reply: &mut String) {
        let mut first_shown = false;
        while let Some(chunk) = rx.recv().await {
            let Some(delta) = chunk.delta() else {
                continue;
            };
            self.spinner.stop();
            let text = normalize_output(delta, &mut first_shown);
            if text.is_empty() {
                continue;
            }
            reply.push_str(&text);
            self.terminal.print(&text);
        }
    }

    fn report_failure(&self, end: &TurnEnd, reply: &str) {
        let lines = match end {
            TurnEnd::Completed => return,
            TurnEnd::RateLimited => vec![RATE_LIMIT_HINT.to_string()],
            TurnEnd::Failed(_) => vec![GENERIC_FAILURE_HINT.to_string()],
            TurnEnd::TimedOut => vec![
                format!(
                    "Request timed out after {} seconds.",
                    self.chat_timeout.as_secs_f64()
                ),
                GENERIC_FAILURE_HINT.to_string(),
            ],
        };
        if !reply.is_empty() && !reply.ends_with('\n') {
            self.terminal.newline();
        }
        for line in &lines {
            self.terminal.println(line);
        }
    }

    /// Record the turn. Runs once per turn on every path out of the stream.
    async fn finalize(&self, prompt: &str, user: Message, reply: &str) {
        self.terminal.newline();
        let assistant = Message::assistant(reply);
        self.conversations
            .transcript()
            .push(assistant.clone())
            .await;
        if let Err(e) = self
            .conversations
            .record_turn(prompt, &user, &assistant)
            .await
        {
            warn!("failed to persist chat turn: {e:#}");
        }
    }
}

fn classify(e: ProviderError) -> TurnEnd {
    if e.is_benign() {
        debug!("ignoring end-of-stream decode fault: {e}");
        TurnEnd::Completed
    } else if e.is_rate_limit() {
        warn!("chat turn rate limited: {e}");
        TurnEnd::RateLimited
    } else {
        warn!("chat turn failed: {e}");
        TurnEnd::Failed(e.to_string())
    }
}
