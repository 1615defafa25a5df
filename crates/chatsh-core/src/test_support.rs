//! Doubles shared by the unit tests.

use crate::chat::terminal::Terminal;
use crate::providers::provider::{ChatRequest, LlmProvider, ProviderError, Role, StreamChunk};
use crate::session::ConversationStore;
use async_trait::async_trait;
use std::sync::Mutex;
use tempfile::TempDir;
use tokio::sync::mpsc;

#[derive(Default)]
pub(crate) struct RecordingTerminal {
    writes: Mutex<Vec<String>>,
}

impl RecordingTerminal {
    pub(crate) fn writes(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    /// Everything written, minus spinner frames and carriage returns.
    pub(crate) fn text(&self) -> String {
        self.writes()
            .into_iter()
            .filter(|w| !w.starts_with('\r'))
            .collect()
    }
}

impl Terminal for RecordingTerminal {
    fn print(&self, text: &str) {
        self.writes.lock().unwrap().push(text.to_string());
    }

    fn newline(&self) {
        self.writes.lock().unwrap().push("\n".to_string());
    }
}

/// How a scripted provider answers one request.
#[derive(Clone)]
pub(crate) enum Script {
    Reply(Vec<&'static str>),
    /// Send the deltas, then fail with a rate limit or a server error.
    Fail {
        deltas: Vec<&'static str>,
        rate_limited: bool,
    },
    /// Send the deltas, then end on a body decode fault.
    DecodeTail(Vec<&'static str>),
    /// Send the deltas, then never finish.
    Stall(Vec<&'static str>),
}

type Responder = Box<dyn Fn(&ChatRequest) -> Script + Send + Sync>;

pub(crate) struct ScriptedProvider {
    respond: Responder,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    pub(crate) fn new(respond: impl Fn(&ChatRequest) -> Script + Send + Sync + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

async fn send_deltas(tx: &mpsc::Sender<StreamChunk>, deltas: &[&str]) {
    let _ = tx
        .send(StreamChunk::Metadata {
            role: Some(Role::Assistant),
            finish_reason: None,
        })
        .await;
    for d in deltas {
        let _ = tx
            .send(StreamChunk::Delta {
                text: d.to_string(),
            })
            .await;
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn stream_complete(
        &self,
        request: ChatRequest,
        tx: mpsc::Sender<StreamChunk>,
    ) -> Result<(), ProviderError> {
        let script = (self.respond)(&request);
        self.requests.lock().unwrap().push(request);

        match script {
            Script::Reply(deltas) => {
                send_deltas(&tx, &deltas).await;
                let _ = tx
                    .send(StreamChunk::Metadata {
                        role: None,
                        finish_reason: Some("stop".into()),
                    })
                    .await;
                let _ = tx.send(StreamChunk::Done).await;
                Ok(())
            }
            Script::Fail {
                deltas,
                rate_limited,
            } => {
                send_deltas(&tx, &deltas).await;
                if rate_limited {
                    Err(ProviderError::RateLimited("slow down".into()))
                } else {
                    Err(ProviderError::Status {
                        status: 500,
                        body: "boom".into(),
                    })
                }
            }
            Script::DecodeTail(deltas) => {
                send_deltas(&tx, &deltas).await;
                Err(ProviderError::Decode("unexpected EOF".into()))
            }
            Script::Stall(deltas) => {
                send_deltas(&tx, &deltas).await;
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

/// A store in a fresh temp dir. Keep the dir alive for the test's duration.
pub(crate) async fn open_temp_store() -> (ConversationStore, TempDir) {
    let dir = tempfile::tempdir().expect("temp dir");
    let store = ConversationStore::open(&dir.path().join("chatsh.db"))
        .await
        .expect("open store");
    (store, dir)
}
