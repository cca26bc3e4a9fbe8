use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::Row;

use super::store::{now_rfc3339, parse_dt, SqliteStore};
use crate::domain::errors::StoreResult;
use crate::domain::ports::{BeliefStore, TldrCacheStore};

#[async_trait]
impl TldrCacheStore for SqliteStore {
    async fn get_tldr(&self, team_name: &str, kind: &str) -> StoreResult<Option<(String, DateTime<Utc>)>> {
        let row = sqlx::query("SELECT summary, computed_at FROM tldr_cache WHERE team_name = ? AND kind = ?")
            .bind(team_name)
            .bind(kind)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| (row.get("summary"), parse_dt(&row.get::<String, _>("computed_at")))))
    }

    async fn put_tldr(&self, team_name: &str, kind: &str, summary: &str) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO tldr_cache (team_name, kind, summary, computed_at) VALUES (?, ?, ?, ?)
             ON CONFLICT (team_name, kind) DO UPDATE SET summary = excluded.summary, computed_at = excluded.computed_at",
        )
        .bind(team_name)
        .bind(kind)
        .bind(summary)
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn invalidate_tldr(&self, team_name: &str, kind: &str) -> StoreResult<()> {
        sqlx::query("DELETE FROM tldr_cache WHERE team_name = ? AND kind = ?")
            .bind(team_name)
            .bind(kind)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BeliefStore for SqliteStore {
    async fn upsert_belief(&self, swarm_id: &str, agent_handle: &str, subject: &str, value: Value) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO agent_beliefs (swarm_id, agent_handle, subject, value, updated_at) VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (swarm_id, agent_handle, subject) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(swarm_id)
        .bind(agent_handle)
        .bind(subject)
        .bind(value.to_string())
        .bind(now_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_belief(&self, swarm_id: &str, agent_handle: &str, subject: &str) -> StoreResult<Option<Value>> {
        let row: Option<String> = sqlx::query_scalar(
            "SELECT value FROM agent_beliefs WHERE swarm_id = ? AND agent_handle = ? AND subject = ?",
        )
        .bind(swarm_id)
        .bind(agent_handle)
        .bind(subject)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|s| serde_json::from_str(&s).unwrap_or(Value::Null)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::tests::test_store;

    #[tokio::test]
    async fn tldr_round_trips_and_invalidates() {
        let store = test_store().await;
        assert!(store.get_tldr("alpha", "status").await.unwrap().is_none());
        store.put_tldr("alpha", "status", "all green").await.unwrap();
        let (summary, _) = store.get_tldr("alpha", "status").await.unwrap().unwrap();
        assert_eq!(summary, "all green");
        store.invalidate_tldr("alpha", "status").await.unwrap();
        assert!(store.get_tldr("alpha", "status").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn belief_upsert_overwrites() {
        let store = test_store().await;
        store.upsert_belief("swarm", "agent", "risk", Value::String("low".into())).await.unwrap();
        store.upsert_belief("swarm", "agent", "risk", Value::String("high".into())).await.unwrap();
        let value = store.get_belief("swarm", "agent", "risk").await.unwrap().unwrap();
        assert_eq!(value, Value::String("high".into()));
    }
}
