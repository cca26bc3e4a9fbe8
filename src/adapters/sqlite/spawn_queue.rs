use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use super::store::{now_rfc3339, parse_dt, SqliteStore};
use crate::domain::errors::StoreResult;
use crate::domain::models::{QueuePriority, SpawnQueueItem, SpawnStatus};
use crate::domain::ports::SpawnQueueStore;

#[async_trait]
impl SpawnQueueStore for SqliteStore {
    async fn enqueue_spawn(&self, item: &SpawnQueueItem) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO spawn_queue (id, requester_handle, target_agent_type, depth_level, swarm_id,
                priority, depends_on, payload, status, created_at, spawned_at, worker_id, rejection_reason)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, NULL)",
        )
        .bind(item.id.to_string())
        .bind(&item.requester_handle)
        .bind(&item.target_agent_type)
        .bind(item.depth_level as i64)
        .bind(item.swarm_id.map(|s| s.to_string()))
        .bind(priority_str(item.priority))
        .bind(serde_json::to_string(&item.depends_on)?)
        .bind(item.payload.to_string())
        .bind(item.status.as_str())
        .bind(item.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_spawn_item(&self, id: Uuid) -> StoreResult<Option<SpawnQueueItem>> {
        let row = sqlx::query("SELECT * FROM spawn_queue WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(row_to_item))
    }

    async fn get_ready_items(&self, limit: u32) -> StoreResult<Vec<SpawnQueueItem>> {
        // Priority is stored as text; order via a weight CASE so the SQL
        // ordering matches `QueuePriority::weight()` (spec §4.C).
        let rows = sqlx::query(
            "SELECT *, CASE priority
                WHEN 'critical' THEN 4 WHEN 'high' THEN 3 WHEN 'normal' THEN 2 ELSE 1 END AS weight
             FROM spawn_queue WHERE status = 'pending'
             ORDER BY weight DESC, created_at ASC, id ASC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_item).collect())
    }

    async fn update_spawn_status(
        &self,
        id: Uuid,
        status: SpawnStatus,
        worker_id: Option<Uuid>,
        rejection_reason: Option<String>,
    ) -> StoreResult<()> {
        let spawned_at = matches!(status, SpawnStatus::Spawned).then(now_rfc3339);
        sqlx::query(
            "UPDATE spawn_queue SET status = ?, worker_id = COALESCE(?, worker_id),
                rejection_reason = COALESCE(?, rejection_reason), spawned_at = COALESCE(?, spawned_at)
             WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(worker_id.map(|w| w.to_string()))
        .bind(rejection_reason)
        .bind(spawned_at)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn dependency_statuses(&self, ids: &[Uuid]) -> StoreResult<Vec<SpawnStatus>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut statuses = Vec::with_capacity(ids.len());
        for id in ids {
            let status: Option<String> = sqlx::query_scalar("SELECT status FROM spawn_queue WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;
            // A missing or unparsable row can never satisfy the planner's
            // `all(Spawned)` gate, so it counts as rejected rather than
            // being silently dropped from the vec.
            let status = status.and_then(|s| SpawnStatus::from_str(&s)).unwrap_or(SpawnStatus::Rejected);
            statuses.push(status);
        }
        Ok(statuses)
    }
}

fn priority_str(p: QueuePriority) -> &'static str {
    match p {
        QueuePriority::Low => "low",
        QueuePriority::Normal => "normal",
        QueuePriority::High => "high",
        QueuePriority::Critical => "critical",
    }
}

fn priority_from_str(s: &str) -> QueuePriority {
    match s {
        "critical" => QueuePriority::Critical,
        "high" => QueuePriority::High,
        "low" => QueuePriority::Low,
        _ => QueuePriority::Normal,
    }
}

fn row_to_item(row: sqlx::sqlite::SqliteRow) -> SpawnQueueItem {
    SpawnQueueItem {
        id: Uuid::parse_str(&row.get::<String, _>("id")).unwrap_or_else(|_| Uuid::nil()),
        requester_handle: row.get("requester_handle"),
        target_agent_type: row.get("target_agent_type"),
        depth_level: row.get::<i64, _>("depth_level") as u32,
        swarm_id: row.get::<Option<String>, _>("swarm_id").and_then(|s| Uuid::parse_str(&s).ok()),
        priority: priority_from_str(&row.get::<String, _>("priority")),
        depends_on: serde_json::from_str(&row.get::<String, _>("depends_on")).unwrap_or_default(),
        payload: serde_json::from_str(&row.get::<String, _>("payload")).unwrap_or(serde_json::Value::Null),
        status: SpawnStatus::from_str(&row.get::<String, _>("status")).unwrap_or(SpawnStatus::Pending),
        created_at: parse_dt(&row.get::<String, _>("created_at")),
        spawned_at: row.get::<Option<String>, _>("spawned_at").map(|s| parse_dt(&s)),
        worker_id: row.get::<Option<String>, _>("worker_id").and_then(|s| Uuid::parse_str(&s).ok()),
        rejection_reason: row.get("rejection_reason"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::tests::test_store;
    use chrono::Utc;
    use serde_json::Value;

    fn item(priority: QueuePriority, offset_secs: i64) -> SpawnQueueItem {
        SpawnQueueItem {
            id: Uuid::new_v4(),
            requester_handle: "lead".into(),
            target_agent_type: "worker".into(),
            depth_level: 1,
            swarm_id: None,
            priority,
            depends_on: Vec::new(),
            payload: Value::Null,
            status: SpawnStatus::Pending,
            created_at: Utc::now() + chrono::Duration::seconds(offset_secs),
            spawned_at: None,
            worker_id: None,
            rejection_reason: None,
        }
    }

    #[tokio::test]
    async fn ready_items_ordered_by_priority_then_age() {
        let store = test_store().await;
        store.enqueue_spawn(&item(QueuePriority::Low, 0)).await.unwrap();
        store.enqueue_spawn(&item(QueuePriority::Critical, 1)).await.unwrap();
        store.enqueue_spawn(&item(QueuePriority::High, 2)).await.unwrap();
        store.enqueue_spawn(&item(QueuePriority::Normal, 3)).await.unwrap();

        let ready = store.get_ready_items(16).await.unwrap();
        let priorities: Vec<QueuePriority> = ready.iter().map(|i| i.priority).collect();
        assert_eq!(
            priorities,
            vec![QueuePriority::Critical, QueuePriority::High, QueuePriority::Normal, QueuePriority::Low]
        );
    }
}
