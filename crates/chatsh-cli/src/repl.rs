use crate::commands::{self, Command, ConversationCommand, HELP};
use anyhow::Result;
use chatsh_core::{ChatOrchestrator, ConversationManager, ConversationReport};
use crossterm::style::Stylize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::sync::Arc;
use tracing::debug;

const PROMPT: &str = ":> ";

pub(crate) struct Repl {
    chat: ChatOrchestrator,
    conversations: Arc<ConversationManager>,
}

impl Repl {
    pub(crate) fn new(chat: ChatOrchestrator) -> Self {
        let conversations = Arc::clone(chat.conversations());
        Self {
            chat,
            conversations,
        }
    }

    pub(crate) async fn run(&self) -> Result<()> {
        let mut editor = DefaultEditor::new()?;
        let prompt = PROMPT.yellow().to_string();

        loop {
            let line = match read_blocking(|| editor.readline(&prompt)) {
                Ok(line) => line,
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break,
                Err(e) => return Err(e.into()),
            };

            let command = match commands::parse(&line) {
                Ok(command) => command,
                Err(e) => {
                    print_error(&e.to_string());
                    continue;
                }
            };
            if command != Command::Nothing {
                let _ = editor.add_history_entry(line.trim());
            }

            match command {
                Command::Nothing => {}
                Command::Quit => break,
                Command::Help => println!("{HELP}"),
                Command::Chat(prompt) => {
                    let report = self.chat.chat(&prompt).await;
                    debug!(end = ?report.end, chars = report.reply.len(), "turn finished");
                }
                Command::System(content) => {
                    self.show(self.conversations.set_system_message(&content).await)
                }
                Command::Conversation(sub) => self.conversation(sub).await,
            }
        }

        self.conversations.wait_for_title().await;
        Ok(())
    }

    async fn conversation(&self, command: ConversationCommand) {
        let manager = &self.conversations;
        let report = match command {
            ConversationCommand::Show => Ok(manager.current().await),
            ConversationCommand::All => manager.list().await,
            ConversationCommand::Load(id) => manager.load(id).await,
            ConversationCommand::New => Ok(manager.new_conversation().await),
            ConversationCommand::Delete(id) => manager.delete(id).await,
            ConversationCommand::DeleteAll => manager.delete_all().await,
        };
        self.show(report);
    }

    fn show(&self, report: Result<ConversationReport>) {
        match report {
            Ok(report) => println!("{report}"),
            Err(e) => print_error(&format!("{e:#}")),
        }
    }
}

fn print_error(message: &str) {
    eprintln!("{}", message.red());
}

/// Run a blocking terminal read without stalling the runtime's other tasks.
/// Needs the multi-threaded runtime.
fn read_blocking<T>(read: impl FnOnce() -> T) -> T {
    tokio::task::block_in_place(read)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn blocking_read_leaves_the_worker_to_other_tasks() {
        let (tx, rx) = mpsc::channel::<&str>();
        let reader = tokio::spawn(async move { read_blocking(move || rx.recv()) });
        // Only one worker: this task runs only if the reader gave it up.
        let writer = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            tx.send("hello").unwrap();
        });

        let line = tokio::time::timeout(Duration::from_secs(5), reader)
            .await
            .expect("reader stalled the runtime")
            .unwrap();
        assert_eq!(line, Ok("hello"));
        writer.await.unwrap();
    }
}
