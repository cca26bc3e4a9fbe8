//! Chat / message persistence (spec §4.A `insertChat`, `appendMessage`).

use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;
use uuid::Uuid;

use super::store::{now_rfc3339, parse_dt, SqliteStore};
use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::models::{Chat, ChatMessage};
use crate::domain::ports::ChatStore;

#[async_trait]
impl ChatStore for SqliteStore {
    async fn insert_chat(&self, participants: &[String]) -> StoreResult<Chat> {
        let id = Uuid::new_v4().to_string();
        let now = now_rfc3339();
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO chats (id, created_at) VALUES (?, ?)")
            .bind(&id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        for uid in participants {
            sqlx::query("INSERT OR IGNORE INTO chat_participants (chat_id, uid) VALUES (?, ?)")
                .bind(&id)
                .bind(uid)
                .execute(&mut *tx)
                .await?;
            sqlx::query("INSERT OR IGNORE INTO unread (chat_id, uid, count) VALUES (?, ?, 0)")
                .bind(&id)
                .bind(uid)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(Chat { id, participants: participants.to_vec(), created_at: parse_dt(&now) })
    }

    async fn get_chat(&self, id: &str) -> StoreResult<Option<Chat>> {
        let Some(row) = sqlx::query("SELECT id, created_at FROM chats WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };
        let participants: Vec<String> = sqlx::query_scalar("SELECT uid FROM chat_participants WHERE chat_id = ?")
            .bind(id)
            .fetch_all(&self.pool)
            .await?;
        Ok(Some(Chat {
            id: row.get("id"),
            participants,
            created_at: parse_dt(&row.get::<String, _>("created_at")),
        }))
    }

    async fn get_chats_by_user(&self, uid: &str) -> StoreResult<Vec<Chat>> {
        let chat_ids: Vec<String> = sqlx::query_scalar("SELECT chat_id FROM chat_participants WHERE uid = ?")
            .bind(uid)
            .fetch_all(&self.pool)
            .await?;
        let mut chats = Vec::with_capacity(chat_ids.len());
        for id in chat_ids {
            if let Some(chat) = self.get_chat(&id).await? {
                chats.push(chat);
            }
        }
        Ok(chats)
    }

    async fn append_message(&self, chat_id: &str, from_uid: &str, text: &str, metadata: Value) -> StoreResult<ChatMessage> {
        let mut tx = self.pool.begin().await?;
        let exists: Option<String> = sqlx::query_scalar("SELECT id FROM chats WHERE id = ?")
            .bind(chat_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("chat {chat_id}")));
        }

        let now = now_rfc3339();
        let id = sqlx::query(
            "INSERT INTO messages (chat_id, from_uid, text, metadata, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(chat_id)
        .bind(from_uid)
        .bind(text)
        .bind(metadata.to_string())
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query(
            "UPDATE unread SET count = count + 1 WHERE chat_id = ? AND uid != ?",
        )
        .bind(chat_id)
        .bind(from_uid)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(ChatMessage { id, chat_id: chat_id.to_string(), from_uid: from_uid.to_string(), text: text.to_string(), metadata, created_at: parse_dt(&now) })
    }

    async fn get_messages(&self, chat_id: &str, limit: u32, after: Option<i64>) -> StoreResult<Vec<ChatMessage>> {
        let limit = limit.clamp(1, 1000);
        let rows = if let Some(after) = after {
            sqlx::query("SELECT * FROM messages WHERE chat_id = ? AND id > ? ORDER BY id ASC LIMIT ?")
                .bind(chat_id)
                .bind(after)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT * FROM messages WHERE chat_id = ? ORDER BY id ASC LIMIT ?")
                .bind(chat_id)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
        };
        Ok(rows.into_iter().map(row_to_message).collect())
    }

    async fn mark_chat_read(&self, chat_id: &str, uid: &str) -> StoreResult<()> {
        sqlx::query("UPDATE unread SET count = 0 WHERE chat_id = ? AND uid = ?")
            .bind(chat_id)
            .bind(uid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_chat_unread_count(&self, chat_id: &str, uid: &str) -> StoreResult<u32> {
        let count: Option<i64> = sqlx::query_scalar("SELECT count FROM unread WHERE chat_id = ? AND uid = ?")
            .bind(chat_id)
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(count.unwrap_or(0) as u32)
    }
}

fn row_to_message(row: sqlx::sqlite::SqliteRow) -> ChatMessage {
    ChatMessage {
        id: row.get("id"),
        chat_id: row.get("chat_id"),
        from_uid: row.get("from_uid"),
        text: row.get("text"),
        metadata: serde_json::from_str(&row.get::<String, _>("metadata")).unwrap_or(Value::Null),
        created_at: parse_dt(&row.get::<String, _>("created_at")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::tests::test_store;

    #[tokio::test]
    async fn appending_a_message_increments_other_participants_unread() {
        let store = test_store().await;
        let chat = store.insert_chat(&["alice".into(), "bob".into()]).await.unwrap();
        store.append_message(&chat.id, "alice", "hi", Value::Null).await.unwrap();
        assert_eq!(store.get_chat_unread_count(&chat.id, "bob").await.unwrap(), 1);
        assert_eq!(store.get_chat_unread_count(&chat.id, "alice").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn mark_read_resets_counter() {
        let store = test_store().await;
        let chat = store.insert_chat(&["alice".into(), "bob".into()]).await.unwrap();
        store.append_message(&chat.id, "alice", "hi", Value::Null).await.unwrap();
        store.mark_chat_read(&chat.id, "bob").await.unwrap();
        assert_eq!(store.get_chat_unread_count(&chat.id, "bob").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn messages_are_returned_in_commit_order() {
        let store = test_store().await;
        let chat = store.insert_chat(&["alice".into(), "bob".into()]).await.unwrap();
        store.append_message(&chat.id, "alice", "first", Value::Null).await.unwrap();
        store.append_message(&chat.id, "bob", "second", Value::Null).await.unwrap();
        let messages = store.get_messages(&chat.id, 10, None).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].created_at <= messages[1].created_at);
        assert_eq!(messages[0].text, "first");
    }
}
