use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use super::store::{parse_dt, SqliteStore};
use crate::domain::errors::StoreResult;
use crate::domain::models::{SpawnMode, Worker, WorkerHealth, WorkerState};
use crate::domain::ports::WorkerStore;

#[async_trait]
impl WorkerStore for SqliteStore {
    async fn insert_worker(&self, worker: &Worker) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO workers (id, handle, team_name, state, health, pid, session_id, role,
                swarm_id, depth_level, restart_count, restart_cap, current_task_id, working_dir,
                spawn_mode, spawned_at, dismissed_at, last_heartbeat)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(worker.id.to_string())
        .bind(&worker.handle)
        .bind(&worker.team_name)
        .bind(worker.state.as_str())
        .bind(worker.health.as_str())
        .bind(worker.pid)
        .bind(&worker.session_id)
        .bind(&worker.role)
        .bind(worker.swarm_id.map(|s| s.to_string()))
        .bind(worker.depth_level as i64)
        .bind(worker.restart_count as i64)
        .bind(worker.restart_cap as i64)
        .bind(worker.current_task_id.map(|t| t.to_string()))
        .bind(&worker.working_dir)
        .bind(spawn_mode_str(worker.spawn_mode))
        .bind(worker.spawned_at.to_rfc3339())
        .bind(worker.dismissed_at.map(|d| d.to_rfc3339()))
        .bind(worker.last_heartbeat.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_worker(&self, handle: &str, team_name: &str) -> StoreResult<Option<Worker>> {
        let row = sqlx::query(
            "SELECT * FROM workers WHERE handle = ? AND team_name = ? AND state != 'stopped' ORDER BY spawned_at DESC LIMIT 1",
        )
        .bind(handle)
        .bind(team_name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_worker))
    }

    async fn get_worker_by_id(&self, id: Uuid) -> StoreResult<Option<Worker>> {
        let row = sqlx::query("SELECT * FROM workers WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(row_to_worker))
    }

    async fn get_worker_by_handle(&self, handle: &str) -> StoreResult<Option<Worker>> {
        let row = sqlx::query(
            "SELECT * FROM workers WHERE handle = ? AND state != 'stopped' ORDER BY spawned_at DESC LIMIT 1",
        )
        .bind(handle)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(row_to_worker))
    }

    async fn update_worker(&self, worker: &Worker) -> StoreResult<()> {
        sqlx::query(
            "UPDATE workers SET state = ?, health = ?, pid = ?, session_id = ?, restart_count = ?,
                current_task_id = ?, spawn_mode = ?, dismissed_at = ?, last_heartbeat = ? WHERE id = ?",
        )
        .bind(worker.state.as_str())
        .bind(worker.health.as_str())
        .bind(worker.pid)
        .bind(&worker.session_id)
        .bind(worker.restart_count as i64)
        .bind(worker.current_task_id.map(|t| t.to_string()))
        .bind(spawn_mode_str(worker.spawn_mode))
        .bind(worker.dismissed_at.map(|d| d.to_rfc3339()))
        .bind(worker.last_heartbeat.to_rfc3339())
        .bind(worker.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_workers(&self, team_name: Option<&str>) -> StoreResult<Vec<Worker>> {
        let rows = if let Some(team) = team_name {
            sqlx::query("SELECT * FROM workers WHERE team_name = ? ORDER BY spawned_at DESC")
                .bind(team)
                .fetch_all(&self.pool)
                .await?
        } else {
            sqlx::query("SELECT * FROM workers ORDER BY spawned_at DESC")
                .fetch_all(&self.pool)
                .await?
        };
        Ok(rows.into_iter().map(row_to_worker).collect())
    }

    async fn count_live_workers(&self, swarm_id: Option<Uuid>) -> StoreResult<u32> {
        let live_states = ["starting", "ready", "working"];
        let count: i64 = if let Some(swarm) = swarm_id {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM workers WHERE swarm_id = ? AND state IN (?, ?, ?)",
            )
            .bind(swarm.to_string())
            .bind(live_states[0])
            .bind(live_states[1])
            .bind(live_states[2])
            .fetch_one(&self.pool)
            .await?
        } else {
            sqlx::query_scalar("SELECT COUNT(*) FROM workers WHERE state IN (?, ?, ?)")
                .bind(live_states[0])
                .bind(live_states[1])
                .bind(live_states[2])
                .fetch_one(&self.pool)
                .await?
        };
        Ok(count as u32)
    }
}

fn spawn_mode_str(mode: SpawnMode) -> &'static str {
    match mode {
        SpawnMode::Process => "process",
        SpawnMode::Multiplexer => "multiplexer",
        SpawnMode::InMemory => "in_memory",
    }
}

fn spawn_mode_from_str(s: &str) -> SpawnMode {
    match s {
        "multiplexer" => SpawnMode::Multiplexer,
        "in_memory" => SpawnMode::InMemory,
        _ => SpawnMode::Process,
    }
}

fn row_to_worker(row: sqlx::sqlite::SqliteRow) -> Worker {
    Worker {
        id: Uuid::parse_str(&row.get::<String, _>("id")).unwrap_or_else(|_| Uuid::nil()),
        handle: row.get("handle"),
        team_name: row.get("team_name"),
        state: WorkerState::from_str(&row.get::<String, _>("state")).unwrap_or(WorkerState::Error),
        health: match row.get::<String, _>("health").as_str() {
            "degraded" => WorkerHealth::Degraded,
            "unhealthy" => WorkerHealth::Unhealthy,
            _ => WorkerHealth::Healthy,
        },
        pid: row.get("pid"),
        session_id: row.get("session_id"),
        role: row.get("role"),
        swarm_id: row
            .get::<Option<String>, _>("swarm_id")
            .and_then(|s| Uuid::parse_str(&s).ok()),
        depth_level: row.get::<i64, _>("depth_level") as u32,
        restart_count: row.get::<i64, _>("restart_count") as u32,
        restart_cap: row.get::<i64, _>("restart_cap") as u32,
        current_task_id: row
            .get::<Option<String>, _>("current_task_id")
            .and_then(|s| Uuid::parse_str(&s).ok()),
        working_dir: row.get("working_dir"),
        spawn_mode: spawn_mode_from_str(&row.get::<String, _>("spawn_mode")),
        spawned_at: parse_dt(&row.get::<String, _>("spawned_at")),
        dismissed_at: row
            .get::<Option<String>, _>("dismissed_at")
            .map(|s| parse_dt(&s)),
        last_heartbeat: parse_dt(&row.get::<String, _>("last_heartbeat")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::tests::test_store;

    #[tokio::test]
    async fn insert_and_fetch_worker() {
        let store = test_store().await;
        let worker = Worker::new("w1".into(), "team1".into(), "worker".into(), "/tmp".into(), 1, None, 3);
        store.insert_worker(&worker).await.unwrap();
        let fetched = store.get_worker("w1", "team1").await.unwrap().unwrap();
        assert_eq!(fetched.id, worker.id);
        assert_eq!(fetched.state, WorkerState::Pending);
    }

    #[tokio::test]
    async fn count_live_workers_excludes_stopped() {
        let store = test_store().await;
        let mut worker = Worker::new("w1".into(), "team1".into(), "worker".into(), "/tmp".into(), 1, None, 3);
        worker.state = WorkerState::Working;
        store.insert_worker(&worker).await.unwrap();
        assert_eq!(store.count_live_workers(None).await.unwrap(), 1);
        worker.state = WorkerState::Stopped;
        store.update_worker(&worker).await.unwrap();
        assert_eq!(store.count_live_workers(None).await.unwrap(), 0);
    }
}
