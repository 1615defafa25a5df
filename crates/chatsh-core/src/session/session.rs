use crate::providers::provider::{Message, Role};
use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

// ── Schema ────────────────────────────────────────────────────────────────────

const MIGRATE: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT    NOT NULL DEFAULT '',
    created_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    conversation_id INTEGER NOT NULL REFERENCES conversations(id),
    role            TEXT    NOT NULL,
    content         TEXT    NOT NULL,
    created_at      INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS messages_by_conversation ON messages (conversation_id, id);
"#;

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct StoredConversation {
    pub id: i64,
    pub title: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub id: i64,
    pub conversation_id: i64,
    pub role: Role,
    pub content: String,
    pub created_at: i64,
}

impl StoredMessage {
    pub fn to_message(&self) -> Message {
        Message::new(self.role, self.content.clone())
    }
}

// ── ConversationStore ─────────────────────────────────────────────────────────

pub struct ConversationStore {
    pool: SqlitePool,
}

impl ConversationStore {
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = SqlitePool::connect(&url).await?;
        sqlx::query(MIGRATE).execute(&pool).await?;
        Ok(Self { pool })
    }

    // ── Conversations ─────────────────────────────────────────────────────────

    /// Create a conversation and write `messages` as its first records, in
    /// order, inside one transaction.
    pub async fn create_conversation(&self, title: &str, messages: &[Message]) -> Result<i64> {
        let mut tx = self.pool.begin().await?;
        let id = sqlx::query("INSERT INTO conversations (title, created_at) VALUES (?, ?)")
            .bind(title)
            .bind(now_ts())
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        for message in messages {
            sqlx::query(
                "INSERT INTO messages (conversation_id, role, content, created_at) \
                 VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(now_ts())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(id)
    }

    pub async fn find_conversation(&self, id: i64) -> Result<Option<StoredConversation>> {
        let row = sqlx::query("SELECT id, title, created_at FROM conversations WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Self::row_to_conversation).transpose()
    }

    pub async fn conversations(&self) -> Result<Vec<StoredConversation>> {
        let rows = sqlx::query("SELECT id, title, created_at FROM conversations ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_conversation).collect()
    }

    pub async fn update_title(&self, id: i64, title: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE conversations SET title = ? WHERE id = ?")
            .bind(title)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a conversation and every record it owns. Returns `false` when
    /// no such conversation exists.
    pub async fn delete_conversation(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM messages WHERE conversation_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all(&self) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM messages").execute(&mut *tx).await?;
        let result = sqlx::query("DELETE FROM conversations")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected())
    }

    // ── Messages ──────────────────────────────────────────────────────────────

    pub async fn insert_message(&self, conversation_id: i64, message: &Message) -> Result<i64> {
        let id = sqlx::query(
            "INSERT INTO messages (conversation_id, role, content, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(conversation_id)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(now_ts())
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        Ok(id)
    }

    pub async fn messages(&self, conversation_id: i64) -> Result<Vec<StoredMessage>> {
        let rows = sqlx::query(
            "SELECT id, conversation_id, role, content, created_at \
             FROM messages WHERE conversation_id = ? ORDER BY id ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Self::row_to_message).collect()
    }

    /// First record of `role` in a conversation.
    pub async fn find_message_by_role(
        &self,
        conversation_id: i64,
        role: Role,
    ) -> Result<Option<StoredMessage>> {
        let row = sqlx::query(
            "SELECT id, conversation_id, role, content, created_at \
             FROM messages WHERE conversation_id = ? AND role = ? ORDER BY id ASC LIMIT 1",
        )
        .bind(conversation_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Self::row_to_message).transpose()
    }

    pub async fn update_message_content(&self, id: i64, content: &str) -> Result<()> {
        sqlx::query("UPDATE messages SET content = ? WHERE id = ?")
            .bind(content)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ── Private ───────────────────────────────────────────────────────────────

    fn row_to_conversation(r: sqlx::sqlite::SqliteRow) -> Result<StoredConversation> {
        Ok(StoredConversation {
            id: r.try_get("id")?,
            title: r.try_get("title")?,
            created_at: r.try_get("created_at")?,
        })
    }

    fn row_to_message(r: sqlx::sqlite::SqliteRow) -> Result<StoredMessage> {
        let role: String = r.try_get("role")?;
        Ok(StoredMessage {
            id: r.try_get("id")?,
            conversation_id: r.try_get("conversation_id")?,
            role: role.parse()?,
            content: r.try_get("content")?,
            created_at: r.try_get("created_at")?,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::open_temp_store;

    #[tokio::test]
    async fn create_and_read_back_conversation() {
        let (store, _dir) = open_temp_store().await;
        let id = store
            .create_conversation(
                "",
                &[
                    Message::system("be terse"),
                    Message::user("hi"),
                    Message::assistant("hello"),
                ],
            )
            .await
            .unwrap();

        let conv = store.find_conversation(id).await.unwrap().expect("exists");
        assert_eq!(conv.title, "");

        let messages = store.messages(id).await.unwrap();
        let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(messages[2].to_message(), Message::assistant("hello"));

        drop(store);
    }

    #[tokio::test]
    async fn title_updates_only_touch_existing_rows() {
        let (store, _dir) = open_temp_store().await;
        let id = store.create_conversation("", &[]).await.unwrap();

        assert!(store.update_title(id, "Rust Lifetimes").await.unwrap());
        assert!(!store.update_title(id + 100, "Ghost").await.unwrap());
        assert_eq!(
            store.find_conversation(id).await.unwrap().unwrap().title,
            "Rust Lifetimes"
        );

        drop(store);
    }

    #[tokio::test]
    async fn delete_cascades_to_owned_messages_only() {
        let (store, _dir) = open_temp_store().await;
        let a = store
            .create_conversation("a", &[Message::user("one")])
            .await
            .unwrap();
        let b = store
            .create_conversation("b", &[Message::user("two")])
            .await
            .unwrap();

        assert!(store.delete_conversation(a).await.unwrap());
        assert!(!store.delete_conversation(a).await.unwrap());
        assert!(store.messages(a).await.unwrap().is_empty());
        assert!(store.find_conversation(a).await.unwrap().is_none());

        assert_eq!(store.messages(b).await.unwrap().len(), 1);
        assert_eq!(store.conversations().await.unwrap().len(), 1);

        drop(store);
    }

    #[tokio::test]
    async fn delete_all_empties_both_tables() {
        let (store, _dir) = open_temp_store().await;
        store
            .create_conversation("a", &[Message::user("one")])
            .await
            .unwrap();
        store
            .create_conversation("b", &[Message::user("two")])
            .await
            .unwrap();

        assert_eq!(store.delete_all().await.unwrap(), 2);
        assert!(store.conversations().await.unwrap().is_empty());

        drop(store);
    }

    #[tokio::test]
    async fn find_message_by_role_and_update_content() {
        let (store, _dir) = open_temp_store().await;
        let id = store
            .create_conversation("", &[Message::system("old"), Message::user("hi")])
            .await
            .unwrap();

        let system = store
            .find_message_by_role(id, Role::System)
            .await
            .unwrap()
            .expect("system record");
        store.update_message_content(system.id, "new").await.unwrap();

        let messages = store.messages(id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "new");
        assert!(store
            .find_message_by_role(id, Role::Assistant)
            .await
            .unwrap()
            .is_none());

        drop(store);
    }
}
