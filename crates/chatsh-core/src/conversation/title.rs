use crate::prompts::SystemPrompt;
use crate::providers::provider::{
    spawn_stream, ChatModel, ChatRequest, LlmProvider, Message, ProviderError,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TitleError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("title request timed out after {0:?}")]
    TimedOut(Duration),
    #[error("title request task failed: {0}")]
    Aborted(String),
    #[error("model returned an empty title")]
    Empty,
}

/// Ask `model` to name a conversation from its first prompt.
pub async fn generate_title(
    provider: Arc<dyn LlmProvider>,
    model: ChatModel,
    first_prompt: &str,
    timeout: Duration,
) -> Result<String, TitleError> {
    let request = ChatRequest::new(
        model,
        vec![Message::system(
            SystemPrompt::GenerateConversationTitle.render(first_prompt),
        )],
    );
    let (mut producer, mut rx) = spawn_stream(provider, request);

    let collected = tokio::time::timeout(timeout, async {
        let mut title = String::new();
        while let Some(chunk) = rx.recv().await {
            if let Some(text) = chunk.delta() {
                title.push_str(text);
            }
        }
        (&mut producer)
            .await
            .map(|result| (title, result))
            .map_err(|e| TitleError::Aborted(e.to_string()))
    })
    .await;

    let (title, result) = match collected {
        Ok(inner) => inner?,
        Err(_) => {
            producer.abort();
            return Err(TitleError::TimedOut(timeout));
        }
    };
    if let Err(e) = result {
        if !e.is_benign() {
            return Err(e.into());
        }
    }

    let title = clean_title(&title);
    if title.is_empty() {
        return Err(TitleError::Empty);
    }
    Ok(title)
}

/// Models sometimes ignore the no-quotes rule.
fn clean_title(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Script, ScriptedProvider};

    #[tokio::test]
    async fn title_is_collected_and_cleaned() {
        let provider = Arc::new(ScriptedProvider::new(|_| {
            Script::Reply(vec!["\"Rust ", "Lifetimes\"", "\n"])
        }));
        let title = generate_title(
            provider.clone(),
            ChatModel::Gpt4oMini,
            "explain lifetimes",
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        assert_eq!(title, "Rust Lifetimes");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, ChatModel::Gpt4oMini);
        assert_eq!(requests[0].messages.len(), 1);
        assert!(requests[0].messages[0].content.contains("\"explain lifetimes\""));
    }

    #[tokio::test]
    async fn provider_failure_is_reported() {
        let provider = Arc::new(ScriptedProvider::new(|_| Script::Fail {
            deltas: vec!["Half"],
            rate_limited: true,
        }));
        let err = generate_title(provider, ChatModel::Gpt4oMini, "hi", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, TitleError::Provider(ProviderError::RateLimited(_))));
    }

    #[tokio::test]
    async fn stalled_stream_times_out() {
        let provider = Arc::new(ScriptedProvider::new(|_| Script::Stall(vec!["Par"])));
        let err = generate_title(provider, ChatModel::Gpt4oMini, "hi", Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, TitleError::TimedOut(_)));
    }

    #[tokio::test]
    async fn blank_reply_is_not_a_title() {
        let provider = Arc::new(ScriptedProvider::new(|_| Script::Reply(vec!["  ", "\"\""])));
        let err = generate_title(provider, ChatModel::Gpt4oMini, "hi", Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, TitleError::Empty));
    }
}
