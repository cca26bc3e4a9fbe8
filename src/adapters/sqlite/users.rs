use async_trait::async_trait;
use sqlx::Row;

use super::store::{now_rfc3339, parse_dt, SqliteStore};
use crate::domain::errors::StoreResult;
use crate::domain::models::{derive_uid, AgentType, User};
use crate::domain::ports::TeamStore;

#[async_trait]
impl TeamStore for SqliteStore {
    async fn upsert_user(&self, team_name: &str, handle: &str, agent_type: AgentType) -> StoreResult<User> {
        let uid = derive_uid(team_name, handle);
        if let Some(existing) = self.get_user(&uid).await? {
            // Agents may never escalate their type on re-registration.
            if !agent_type.may_succeed(existing.agent_type) {
                return Err(crate::domain::errors::StoreError::Conflict(format!(
                    "agent {handle} cannot change type from {} to {}",
                    existing.agent_type.as_str(),
                    agent_type.as_str()
                )));
            }
            return Ok(existing);
        }
        let now = now_rfc3339();
        sqlx::query(
            "INSERT INTO users (uid, handle, team_name, agent_type, created_at, last_seen)
             VALUES (?, ?, ?, ?, ?, NULL)
             ON CONFLICT (team_name, handle) DO NOTHING",
        )
        .bind(&uid)
        .bind(handle)
        .bind(team_name)
        .bind(agent_type.as_str())
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get_user(&uid)
            .await?
            .ok_or_else(|| crate::domain::errors::StoreError::Fatal("user vanished after insert".into()))
    }

    async fn get_user(&self, uid: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query("SELECT uid, handle, team_name, agent_type, created_at, last_seen FROM users WHERE uid = ?")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(row_to_user))
    }

    async fn get_users_by_team(&self, team_name: &str) -> StoreResult<Vec<User>> {
        let rows = sqlx::query("SELECT uid, handle, team_name, agent_type, created_at, last_seen FROM users WHERE team_name = ?")
            .bind(team_name)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(row_to_user).collect())
    }

    async fn touch_last_seen(&self, uid: &str) -> StoreResult<()> {
        sqlx::query("UPDATE users SET last_seen = ? WHERE uid = ?")
            .bind(now_rfc3339())
            .bind(uid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_user(row: sqlx::sqlite::SqliteRow) -> User {
    User {
        uid: row.get("uid"),
        handle: row.get("handle"),
        team_name: row.get("team_name"),
        agent_type: AgentType::from_str(row.get::<String, _>("agent_type").as_str()).unwrap_or(AgentType::Worker),
        created_at: parse_dt(&row.get::<String, _>("created_at")),
        last_seen: row
            .get::<Option<String>, _>("last_seen")
            .map(|s| parse_dt(&s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::tests::test_store;

    #[tokio::test]
    async fn upsert_is_idempotent_by_team_and_handle() {
        let store = test_store().await;
        let a = store.upsert_user("team1", "alice", AgentType::Worker).await.unwrap();
        let b = store.upsert_user("team1", "alice", AgentType::Worker).await.unwrap();
        assert_eq!(a.uid, b.uid);
    }

    #[tokio::test]
    async fn cannot_escalate_agent_type() {
        let store = test_store().await;
        store.upsert_user("team1", "alice", AgentType::Worker).await.unwrap();
        let result = store.upsert_user("team1", "alice", AgentType::TeamLead).await;
        assert!(result.is_err());
    }
}
