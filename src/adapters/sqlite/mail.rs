use async_trait::async_trait;
use serde_json::Value;
use sqlx::Row;

use super::store::{now_rfc3339, parse_dt, SqliteStore};
use crate::domain::errors::StoreResult;
use crate::domain::models::{Handoff, Mail};
use crate::domain::ports::MailStore;

#[async_trait]
impl MailStore for SqliteStore {
    async fn send_mail(&self, from_handle: &str, to_handle: &str, subject: Option<String>, body: String) -> StoreResult<Mail> {
        let now = now_rfc3339();
        let id = sqlx::query(
            "INSERT INTO mailbox (from_handle, to_handle, subject, body, read_at, created_at) VALUES (?, ?, ?, ?, NULL, ?)",
        )
        .bind(from_handle)
        .bind(to_handle)
        .bind(&subject)
        .bind(&body)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Mail {
            id,
            from_handle: from_handle.to_string(),
            to_handle: to_handle.to_string(),
            subject,
            body,
            read_at: None,
            created_at: parse_dt(&now),
        })
    }

    async fn mark_mail_read(&self, id: i64) -> StoreResult<()> {
        sqlx::query("UPDATE mailbox SET read_at = COALESCE(read_at, ?) WHERE id = ?")
            .bind(now_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_all_read(&self, to_handle: &str) -> StoreResult<u32> {
        let result = sqlx::query("UPDATE mailbox SET read_at = ? WHERE to_handle = ? AND read_at IS NULL")
            .bind(now_rfc3339())
            .bind(to_handle)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as u32)
    }

    async fn get_unread(&self, to_handle: &str) -> StoreResult<Vec<Mail>> {
        let rows = sqlx::query(
            "SELECT id, from_handle, to_handle, subject, body, read_at, created_at FROM mailbox
             WHERE to_handle = ? AND read_at IS NULL ORDER BY created_at ASC",
        )
        .bind(to_handle)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_mail).collect())
    }

    async fn get_unread_count(&self, to_handle: &str) -> StoreResult<u32> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mailbox WHERE to_handle = ? AND read_at IS NULL")
            .bind(to_handle)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u32)
    }

    async fn send_handoff(&self, from_handle: &str, to_handle: &str, context: Value) -> StoreResult<Handoff> {
        let now = now_rfc3339();
        let context_str = context.to_string();
        let id = sqlx::query(
            "INSERT INTO handoffs (from_handle, to_handle, context, accepted_at, created_at) VALUES (?, ?, ?, NULL, ?)",
        )
        .bind(from_handle)
        .bind(to_handle)
        .bind(&context_str)
        .bind(&now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(Handoff {
            id,
            from_handle: from_handle.to_string(),
            to_handle: to_handle.to_string(),
            context,
            accepted_at: None,
            created_at: parse_dt(&now),
        })
    }

    async fn accept_handoff(&self, id: i64) -> StoreResult<()> {
        sqlx::query("UPDATE handoffs SET accepted_at = COALESCE(accepted_at, ?) WHERE id = ?")
            .bind(now_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_mail(row: sqlx::sqlite::SqliteRow) -> Mail {
    Mail {
        id: row.get("id"),
        from_handle: row.get("from_handle"),
        to_handle: row.get("to_handle"),
        subject: row.get("subject"),
        body: row.get("body"),
        read_at: row.get::<Option<String>, _>("read_at").map(|s| parse_dt(&s)),
        created_at: parse_dt(&row.get::<String, _>("created_at")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::tests::test_store;

    #[tokio::test]
    async fn unread_count_tracks_sends_and_mark_all() {
        let store = test_store().await;
        store.send_mail("alice", "bob", None, "hi".into()).await.unwrap();
        store.send_mail("alice", "bob", None, "hi again".into()).await.unwrap();
        assert_eq!(store.get_unread_count("bob").await.unwrap(), 2);
        let marked = store.mark_all_read("bob").await.unwrap();
        assert_eq!(marked, 2);
        assert_eq!(store.get_unread_count("bob").await.unwrap(), 0);
    }
}
