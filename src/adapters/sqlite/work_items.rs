use async_trait::async_trait;
use sqlx::Row;
use std::collections::HashMap;
use uuid::Uuid;

use super::store::{now_rfc3339, parse_dt, SqliteStore};
use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::models::{work_item::would_create_cycle, Priority, WorkItem, WorkItemStatus};
use crate::domain::ports::WorkItemStore;

#[async_trait]
impl WorkItemStore for SqliteStore {
    async fn create_work_item(&self, item: &WorkItem) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO work_items (id, title, description, status, assigned_to, created_by_handle,
                priority, created_at, updated_at, completed_at, convoy_id, metadata, team_name)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(item.id.to_string())
        .bind(&item.title)
        .bind(&item.description)
        .bind(item.status.as_str())
        .bind(&item.assigned_to)
        .bind(&item.created_by_handle)
        .bind(item.priority.0 as i64)
        .bind(item.created_at.to_rfc3339())
        .bind(item.updated_at.to_rfc3339())
        .bind(item.completed_at.map(|d| d.to_rfc3339()))
        .bind(item.convoy_id.map(|c| c.to_string()))
        .bind(item.metadata.to_string())
        .bind(item.metadata.get("teamName").and_then(|v| v.as_str()).unwrap_or(""))
        .execute(&self.pool)
        .await?;

        for dep in &item.blocked_by {
            self.add_dependency(item.id, *dep).await?;
        }
        Ok(())
    }

    async fn get_work_item(&self, id: Uuid) -> StoreResult<Option<WorkItem>> {
        let row = sqlx::query("SELECT * FROM work_items WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            None => Ok(None),
            Some(row) => Ok(Some(self.hydrate(row).await?)),
        }
    }

    async fn list_by_team(&self, team_name: &str) -> StoreResult<Vec<WorkItem>> {
        let rows = sqlx::query("SELECT * FROM work_items WHERE team_name = ? ORDER BY created_at DESC")
            .bind(team_name)
            .fetch_all(&self.pool)
            .await?;
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            items.push(self.hydrate(row).await?);
        }
        Ok(items)
    }

    async fn update_status(&self, id: Uuid, status: WorkItemStatus) -> StoreResult<()> {
        let current: Option<String> = sqlx::query_scalar("SELECT status FROM work_items WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        let Some(current) = current else {
            return Err(StoreError::NotFound(format!("work item {id}")));
        };
        // No-op idempotently when the transition targets the current status.
        if current == status.as_str() {
            return Ok(());
        }
        let completed_at = matches!(status, WorkItemStatus::Completed).then(now_rfc3339);
        sqlx::query("UPDATE work_items SET status = ?, updated_at = ?, completed_at = COALESCE(?, completed_at) WHERE id = ?")
            .bind(status.as_str())
            .bind(now_rfc3339())
            .bind(completed_at)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_dependency(&self, id: Uuid, depends_on: Uuid) -> StoreResult<()> {
        let edges = self.dependency_edges().await?;
        if would_create_cycle(id, depends_on, &edges) {
            return Err(StoreError::Integrity(format!(
                "adding dependency {depends_on} to {id} would create a cycle"
            )));
        }
        sqlx::query("INSERT OR IGNORE INTO work_item_deps (item_id, depends_on) VALUES (?, ?)")
            .bind(id.to_string())
            .bind(depends_on.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn blocker_statuses(&self, id: Uuid) -> StoreResult<Vec<WorkItemStatus>> {
        let rows: Vec<String> = sqlx::query_scalar(
            "SELECT wi.status FROM work_item_deps d JOIN work_items wi ON wi.id = d.depends_on WHERE d.item_id = ?",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().filter_map(|s| WorkItemStatus::from_str(s)).collect())
    }

    async fn assign_work_item(&self, id: Uuid, handle: &str) -> StoreResult<bool> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE work_items SET assigned_to = ?, status = 'in_progress', updated_at = ?
             WHERE id = ? AND status = 'pending' AND assigned_to IS NULL",
        )
        .bind(handle)
        .bind(now_rfc3339())
        .bind(id.to_string())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected() == 1)
    }

    async fn dispatch_batch(&self, convoy_id: Uuid, handle: &str) -> StoreResult<u32> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE work_items SET assigned_to = ?, status = 'in_progress', updated_at = ?
             WHERE convoy_id = ? AND status = 'pending' AND assigned_to IS NULL",
        )
        .bind(handle)
        .bind(now_rfc3339())
        .bind(convoy_id.to_string())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(result.rows_affected() as u32)
    }
}

impl SqliteStore {
    async fn dependency_edges(&self) -> StoreResult<HashMap<Uuid, Vec<Uuid>>> {
        let rows = sqlx::query("SELECT item_id, depends_on FROM work_item_deps")
            .fetch_all(&self.pool)
            .await?;
        let mut edges: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for row in rows {
            let item_id: Uuid = Uuid::parse_str(&row.get::<String, _>("item_id")).unwrap_or_else(|_| Uuid::nil());
            let depends_on: Uuid = Uuid::parse_str(&row.get::<String, _>("depends_on")).unwrap_or_else(|_| Uuid::nil());
            edges.entry(item_id).or_default().push(depends_on);
        }
        Ok(edges)
    }

    async fn hydrate(&self, row: sqlx::sqlite::SqliteRow) -> StoreResult<WorkItem> {
        let id = Uuid::parse_str(&row.get::<String, _>("id")).unwrap_or_else(|_| Uuid::nil());
        let blocked_by: Vec<Uuid> = sqlx::query_scalar("SELECT depends_on FROM work_item_deps WHERE item_id = ?")
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .filter_map(|s: String| Uuid::parse_str(&s).ok())
            .collect();
        let blocks: Vec<Uuid> = sqlx::query_scalar("SELECT item_id FROM work_item_deps WHERE depends_on = ?")
            .bind(id.to_string())
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .filter_map(|s: String| Uuid::parse_str(&s).ok())
            .collect();
        let metadata: String = row.get("metadata");

        Ok(WorkItem {
            id,
            title: row.get("title"),
            description: row.get("description"),
            status: WorkItemStatus::from_str(&row.get::<String, _>("status")).unwrap_or(WorkItemStatus::Pending),
            assigned_to: row.get("assigned_to"),
            created_by_handle: row.get("created_by_handle"),
            priority: Priority::new(row.get::<i64, _>("priority") as u8).unwrap_or(Priority(3)),
            created_at: parse_dt(&row.get::<String, _>("created_at")),
            updated_at: parse_dt(&row.get::<String, _>("updated_at")),
            completed_at: row.get::<Option<String>, _>("completed_at").map(|s| parse_dt(&s)),
            blocked_by,
            blocks,
            convoy_id: row
                .get::<Option<String>, _>("convoy_id")
                .and_then(|s| Uuid::parse_str(&s).ok()),
            metadata: serde_json::from_str(&metadata).unwrap_or(serde_json::Value::Null),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::tests::test_store;
    use serde_json::json;

    fn item(team: &str, convoy: Option<Uuid>) -> WorkItem {
        WorkItem::new(
            "t".into(),
            None,
            "lead".into(),
            Priority::new(3).unwrap(),
            convoy,
            json!({"teamName": team}),
        )
    }

    #[tokio::test]
    async fn double_assign_is_a_no_op() {
        let store = test_store().await;
        let x = item("t", None);
        store.create_work_item(&x).await.unwrap();
        assert!(store.assign_work_item(x.id, "a").await.unwrap());
        assert!(!store.assign_work_item(x.id, "b").await.unwrap());
        let fetched = store.get_work_item(x.id).await.unwrap().unwrap();
        assert_eq!(fetched.assigned_to.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn dispatch_batch_assigns_all_pending_members() {
        let store = test_store().await;
        let convoy = Uuid::new_v4();
        let a = item("t", Some(convoy));
        let b = item("t", Some(convoy));
        store.create_work_item(&a).await.unwrap();
        store.create_work_item(&b).await.unwrap();
        let count = store.dispatch_batch(convoy, "w1").await.unwrap();
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn rejects_dependency_cycle() {
        let store = test_store().await;
        let a = item("t", None);
        let b = item("t", None);
        store.create_work_item(&a).await.unwrap();
        store.create_work_item(&b).await.unwrap();
        store.add_dependency(a.id, b.id).await.unwrap();
        let result = store.add_dependency(b.id, a.id).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn status_transition_to_same_value_is_idempotent() {
        let store = test_store().await;
        let a = item("t", None);
        store.create_work_item(&a).await.unwrap();
        store.update_status(a.id, WorkItemStatus::Pending).await.unwrap();
        let fetched = store.get_work_item(a.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, WorkItemStatus::Pending);
    }
}
