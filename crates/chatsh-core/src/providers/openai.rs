use super::provider::{ChatRequest, LlmProvider, ProviderError, Role, StreamChunk};
use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::debug;

pub struct OpenAiProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

/// Turn one SSE `data:` payload into a chunk. `None` for payloads with
/// nothing to report (usage-only frames, empty choices).
fn parse_event(data: &Value) -> Option<StreamChunk> {
    let choice = data["choices"].as_array()?.first()?;
    let delta = &choice["delta"];

    if let Some(text) = delta["content"].as_str() {
        return Some(StreamChunk::Delta {
            text: text.to_string(),
        });
    }

    let role = delta["role"].as_str().and_then(|r| r.parse::<Role>().ok());
    let finish_reason = choice["finish_reason"].as_str().map(str::to_string);
    if role.is_none() && finish_reason.is_none() {
        return None;
    }
    Some(StreamChunk::Metadata {
        role,
        finish_reason,
    })
}

/// A body that breaks after the model reported its finish reason is only
/// tail noise; before that the reply is cut short.
fn body_error(e: reqwest::Error, finished: bool) -> ProviderError {
    if finished {
        ProviderError::Decode(e.to_string())
    } else {
        ProviderError::Transport(format!("stream ended early: {e}"))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn stream_complete(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamChunk>,
    ) -> Result<(), ProviderError> {
        let body = json!({
            "model": request.model,
            "messages": request.messages,
            "stream": true,
        });

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let raw_resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = raw_resp.status();
        if !status.is_success() {
            let body_text = raw_resp.text().await.unwrap_or_default();
            if status == StatusCode::TOO_MANY_REQUESTS {
                return Err(ProviderError::RateLimited(body_text));
            }
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let mut byte_stream = raw_resp.bytes_stream();
        // Raw bytes until a full line is in; a UTF-8 sequence may straddle
        // two network chunks.
        let mut buffer: Vec<u8> = Vec::new();
        let mut finished = false;

        'outer: while let Some(chunk) = byte_stream.next().await {
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => return Err(body_error(e, finished)),
            };
            buffer.extend_from_slice(&bytes);

            while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = buffer.drain(..=pos).collect();
                let line = match std::str::from_utf8(&raw) {
                    Ok(line) => line.trim_end_matches(['\r', '\n']),
                    Err(e) => {
                        debug!("skipping stream line that is not UTF-8: {e}");
                        continue;
                    }
                };

                let Some(data) = line.strip_prefix("data:") else {
                    continue;
                };
                let data = data.trim_start();
                if data == "[DONE]" {
                    break 'outer;
                }

                let event: Value = match serde_json::from_str(data) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("skipping undecodable stream frame: {e}");
                        continue;
                    }
                };

                if event["choices"][0]["finish_reason"].is_string() {
                    finished = true;
                }
                if let Some(chunk) = parse_event(&event) {
                    if tx.send(chunk).await.is_err() {
                        // Consumer gave up (timeout); nothing left to deliver to.
                        return Ok(());
                    }
                }
            }
        }

        let _ = tx.send(StreamChunk::Done).await;
        Ok(())
    }
}
