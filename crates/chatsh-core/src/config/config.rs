use crate::providers::ChatModel;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Client configuration.
///
/// Read from `~/.chatsh/config.json`, then overlaid key-by-key with
/// `./.chatsh.json` when present:
/// ```json
/// {
///   "model": "gpt-4o",
///   "title_model": "gpt-4o-mini",
///   "system_message": "You are a terse assistant."
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_model")]
    pub model: ChatModel,
    /// Smaller model used only to name new conversations.
    #[serde(default = "default_title_model")]
    pub title_model: ChatModel,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    /// Injected at the head of every fresh conversation.
    #[serde(default)]
    pub system_message: Option<String>,
    #[serde(default = "default_chat_timeout_secs")]
    pub chat_timeout_secs: u64,
    #[serde(default = "default_title_timeout_secs")]
    pub title_timeout_secs: u64,
    #[serde(default = "default_spinner_interval_ms")]
    pub spinner_interval_ms: u64,
}

fn default_model() -> ChatModel {
    std::env::var("CHATSH_MODEL")
        .ok()
        .and_then(|m| m.parse().ok())
        .unwrap_or(ChatModel::Gpt4o)
}

fn default_title_model() -> ChatModel {
    ChatModel::Gpt4oMini
}

fn default_base_url() -> String {
    std::env::var("CHATSH_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".to_string())
}

fn default_db_path() -> PathBuf {
    ChatConfig::resolve_path("chatsh.db")
}

fn default_chat_timeout_secs() -> u64 {
    30
}

fn default_title_timeout_secs() -> u64 {
    5
}

fn default_spinner_interval_ms() -> u64 {
    100
}

fn env_api_key() -> String {
    std::env::var("CHATSH_API_KEY")
        .or_else(|_| std::env::var("OPENAI_API_KEY"))
        .unwrap_or_default()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            title_model: default_title_model(),
            base_url: default_base_url(),
            api_key: env_api_key(),
            db_path: default_db_path(),
            system_message: None,
            chat_timeout_secs: default_chat_timeout_secs(),
            title_timeout_secs: default_title_timeout_secs(),
            spinner_interval_ms: default_spinner_interval_ms(),
        }
    }
}

impl ChatConfig {
    pub fn load() -> Result<Self> {
        let local = std::env::current_dir()
            .ok()
            .map(|d| d.join(".chatsh.json"));
        Self::load_from(&Self::resolve_path("config.json"), local.as_deref())
    }

    pub fn load_from(global: &Path, local: Option<&Path>) -> Result<Self> {
        let mut config = if global.exists() {
            let data = std::fs::read_to_string(global)?;
            serde_json::from_str::<ChatConfig>(&data)?
        } else {
            ChatConfig::default()
        };

        if config.api_key.is_empty() {
            config.api_key = env_api_key();
        }

        if let Some(local) = local.filter(|p| p.exists()) {
            let data = std::fs::read_to_string(local)?;
            let override_val: serde_json::Value = serde_json::from_str(&data)?;
            let mut base = serde_json::to_value(&config)?;
            if let (Some(base_obj), Some(over_obj)) =
                (base.as_object_mut(), override_val.as_object())
            {
                for (k, v) in over_obj {
                    base_obj.insert(k.clone(), v.clone());
                }
            }
            config = serde_json::from_value(base)?;
        }

        // An empty string in a config file means "no system message".
        if config
            .system_message
            .as_deref()
            .is_some_and(|s| s.trim().is_empty())
        {
            config.system_message = None;
        }

        Ok(config)
    }

    pub fn resolve_path(relative: &str) -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".chatsh")
            .join(relative)
    }

    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.chat_timeout_secs)
    }

    pub fn title_timeout(&self) -> Duration {
        Duration::from_secs(self.title_timeout_secs)
    }

    pub fn spinner_interval(&self) -> Duration {
        Duration::from_millis(self.spinner_interval_ms)
    }
}
