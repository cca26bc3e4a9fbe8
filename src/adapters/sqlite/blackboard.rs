use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use super::store::{now_rfc3339, parse_dt, SqliteStore};
use crate::domain::errors::StoreResult;
use crate::domain::models::{BlackboardFilter, BlackboardMessage, MessagePriority, MessageType};
use crate::domain::ports::BlackboardStore;

#[async_trait]
impl BlackboardStore for SqliteStore {
    async fn post(&self, message: &BlackboardMessage) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO blackboard_messages (id, swarm_id, sender_handle, message_type, priority,
                payload, target_handle, created_at, expires_at, archived_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)",
        )
        .bind(message.id.to_string())
        .bind(&message.swarm_id)
        .bind(&message.sender_handle)
        .bind(message.message_type.as_str())
        .bind(message.priority.as_str())
        .bind(message.payload.to_string())
        .bind(&message.target_handle)
        .bind(message.created_at.to_rfc3339())
        .bind(message.expires_at.map(|d| d.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn read(&self, swarm_id: &str, filter: &BlackboardFilter) -> StoreResult<Vec<BlackboardMessage>> {
        let limit = filter.limit.clamp(1, 1000);
        let reader_condition = if filter.unread_only {
            "AND NOT EXISTS (SELECT 1 FROM blackboard_reads r WHERE r.message_id = m.id AND r.reader_handle = ?)"
        } else {
            ""
        };
        let sql = format!(
            "SELECT m.* FROM blackboard_messages m WHERE m.swarm_id = ? AND m.archived_at IS NULL {reader_condition}
             ORDER BY m.created_at DESC LIMIT ?"
        );
        let mut query = sqlx::query(&sql).bind(swarm_id);
        if filter.unread_only {
            query = query.bind(filter.reader_handle.clone().unwrap_or_default());
        }
        let rows = query.bind(limit as i64).fetch_all(&self.pool).await?;

        let mut messages: Vec<BlackboardMessage> = rows.into_iter().map(row_to_message).collect();
        if let Some(mt) = filter.message_type {
            messages.retain(|m| m.message_type == mt);
        }
        if let Some(min) = filter.min_priority {
            messages.retain(|m| m.priority >= min);
        }
        Ok(messages)
    }

    async fn mark_read(&self, ids: &[Uuid], reader: &str) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query(
                "INSERT OR IGNORE INTO blackboard_reads (message_id, reader_handle, read_at) VALUES (?, ?, ?)",
            )
            .bind(id.to_string())
            .bind(reader)
            .bind(now_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn archive(&self, ids: &[Uuid]) -> StoreResult<u32> {
        let mut tx = self.pool.begin().await?;
        let mut count = 0u32;
        for id in ids {
            let result = sqlx::query("UPDATE blackboard_messages SET archived_at = ? WHERE id = ? AND archived_at IS NULL")
                .bind(now_rfc3339())
                .bind(id.to_string())
                .execute(&mut *tx)
                .await?;
            count += result.rows_affected() as u32;
        }
        tx.commit().await?;
        Ok(count)
    }

    async fn archive_older_than(&self, swarm_id: &str, age_ms: i64) -> StoreResult<u32> {
        let cutoff = chrono::Utc::now() - chrono::Duration::milliseconds(age_ms);
        let result = sqlx::query(
            "UPDATE blackboard_messages SET archived_at = ? WHERE swarm_id = ? AND archived_at IS NULL AND created_at < ?",
        )
        .bind(now_rfc3339())
        .bind(swarm_id)
        .bind(cutoff.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() as u32)
    }

    async fn unread_count(&self, swarm_id: &str, reader: &str) -> StoreResult<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM blackboard_messages m WHERE m.swarm_id = ? AND m.archived_at IS NULL
             AND NOT EXISTS (SELECT 1 FROM blackboard_reads r WHERE r.message_id = m.id AND r.reader_handle = ?)",
        )
        .bind(swarm_id)
        .bind(reader)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u32)
    }
}

fn row_to_message(row: sqlx::sqlite::SqliteRow) -> BlackboardMessage {
    BlackboardMessage {
        id: Uuid::parse_str(&row.get::<String, _>("id")).unwrap_or_else(|_| Uuid::nil()),
        swarm_id: row.get("swarm_id"),
        sender_handle: row.get("sender_handle"),
        message_type: MessageType::from_str(&row.get::<String, _>("message_type")).unwrap_or(MessageType::Status),
        priority: MessagePriority::from_str(&row.get::<String, _>("priority")).unwrap_or(MessagePriority::Normal),
        payload: serde_json::from_str(&row.get::<String, _>("payload")).unwrap_or(serde_json::Value::Null),
        target_handle: row.get("target_handle"),
        created_at: parse_dt(&row.get::<String, _>("created_at")),
        expires_at: row.get::<Option<String>, _>("expires_at").map(|s| parse_dt(&s)),
        archived_at: row.get::<Option<String>, _>("archived_at").map(|s| parse_dt(&s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::tests::test_store;
    use serde_json::json;

    fn message(swarm: &str) -> BlackboardMessage {
        BlackboardMessage {
            id: Uuid::new_v4(),
            swarm_id: swarm.into(),
            sender_handle: "lead".into(),
            message_type: MessageType::Status,
            priority: MessagePriority::Normal,
            payload: json!({"k": "v"}),
            target_handle: None,
            created_at: chrono::Utc::now(),
            expires_at: None,
            archived_at: None,
        }
    }

    #[tokio::test]
    async fn mark_read_is_monotonically_non_increasing() {
        let store = test_store().await;
        let m1 = message("swarm1");
        let m2 = message("swarm1");
        store.post(&m1).await.unwrap();
        store.post(&m2).await.unwrap();
        assert_eq!(store.unread_count("swarm1", "bob").await.unwrap(), 2);
        store.mark_read(&[m1.id], "bob").await.unwrap();
        assert_eq!(store.unread_count("swarm1", "bob").await.unwrap(), 1);
        // Re-marking is idempotent.
        store.mark_read(&[m1.id], "bob").await.unwrap();
        assert_eq!(store.unread_count("swarm1", "bob").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn archived_messages_never_satisfy_unread_only() {
        let store = test_store().await;
        let m = message("swarm1");
        store.post(&m).await.unwrap();
        store.archive(&[m.id]).await.unwrap();
        let filter = BlackboardFilter { unread_only: true, reader_handle: Some("bob".into()), limit: 100, ..Default::default() };
        let results = store.read("swarm1", &filter).await.unwrap();
        assert!(results.is_empty());
    }
}
