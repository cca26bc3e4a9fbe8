use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use super::store::{parse_dt, SqliteStore};
use crate::domain::errors::StoreResult;
use crate::domain::models::{Checkpoint, CheckpointStatus, DoneItem};
use crate::domain::ports::CheckpointStore;

#[async_trait]
impl CheckpointStore for SqliteStore {
    async fn create_checkpoint(&self, checkpoint: &Checkpoint) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO checkpoints (id, worker_handle, from_handle, to_handle, goal, now_text, test,
                done_this_session, blockers, questions, next_steps, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(checkpoint.id.to_string())
        .bind(&checkpoint.worker_handle)
        .bind(&checkpoint.from_handle)
        .bind(&checkpoint.to_handle)
        .bind(&checkpoint.goal)
        .bind(&checkpoint.now)
        .bind(&checkpoint.test)
        .bind(serde_json::to_string(&checkpoint.done_this_session)?)
        .bind(serde_json::to_string(&checkpoint.blockers)?)
        .bind(serde_json::to_string(&checkpoint.questions)?)
        .bind(serde_json::to_string(&checkpoint.next)?)
        .bind(checkpoint.status.as_str())
        .bind(checkpoint.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn latest_for_worker(&self, worker_handle: &str) -> StoreResult<Option<Checkpoint>> {
        let row = sqlx::query("SELECT * FROM checkpoints WHERE worker_handle = ? ORDER BY created_at DESC LIMIT 1")
            .bind(worker_handle)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(row_to_checkpoint))
    }

    async fn list_checkpoints(&self, status: Option<CheckpointStatus>, limit: u32) -> StoreResult<Vec<Checkpoint>> {
        let rows = if let Some(status) = status {
            sqlx::query("SELECT * FROM checkpoints WHERE status = ? ORDER BY created_at DESC LIMIT ?")
                .bind(status.as_str())
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT * FROM checkpoints ORDER BY created_at DESC LIMIT ?")
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
        };
        Ok(rows.into_iter().map(row_to_checkpoint).collect())
    }

    async fn set_checkpoint_status(&self, id: Uuid, status: CheckpointStatus) -> StoreResult<()> {
        sqlx::query("UPDATE checkpoints SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_checkpoint(row: sqlx::sqlite::SqliteRow) -> Checkpoint {
    Checkpoint {
        id: Uuid::parse_str(&row.get::<String, _>("id")).unwrap_or_else(|_| Uuid::nil()),
        worker_handle: row.get("worker_handle"),
        from_handle: row.get("from_handle"),
        to_handle: row.get("to_handle"),
        goal: row.get("goal"),
        now: row.get("now_text"),
        test: row.get("test"),
        done_this_session: serde_json::from_str::<Vec<DoneItem>>(&row.get::<String, _>("done_this_session")).unwrap_or_default(),
        blockers: serde_json::from_str(&row.get::<String, _>("blockers")).unwrap_or_default(),
        questions: serde_json::from_str(&row.get::<String, _>("questions")).unwrap_or_default(),
        next: serde_json::from_str(&row.get::<String, _>("next_steps")).unwrap_or_default(),
        status: CheckpointStatus::from_str(&row.get::<String, _>("status")).unwrap_or(CheckpointStatus::Pending),
        created_at: parse_dt(&row.get::<String, _>("created_at")),
    }
}
