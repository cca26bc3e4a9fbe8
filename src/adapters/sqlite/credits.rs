use async_trait::async_trait;
use sqlx::{Row, SqliteConnection};

use super::store::{now_rfc3339, parse_dt, SqliteStore};
use crate::domain::errors::StoreResult;
use crate::domain::models::credit::apply_delta;
use crate::domain::models::{CreditAccount, LeaderboardMetric, TransactionType};
use crate::domain::ports::CreditStore;

#[async_trait]
impl CreditStore for SqliteStore {
    async fn get_or_create_account(&self, swarm_id: &str, agent_handle: &str) -> StoreResult<CreditAccount> {
        let mut conn = self.pool.acquire().await?;
        get_or_create(&mut conn, swarm_id, agent_handle).await
    }

    async fn record_credit_tx(
        &self,
        swarm_id: &str,
        agent_handle: &str,
        tx_type: TransactionType,
        amount: i64,
        reference_type: Option<String>,
        reference_id: Option<String>,
        reason: Option<String>,
    ) -> StoreResult<CreditAccount> {
        let mut tx = self.pool.begin().await?;
        let account = apply_tx(&mut tx, swarm_id, agent_handle, tx_type, amount, reference_type, reference_id, reason).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn transfer(&self, swarm_id: &str, from: &str, to: &str, amount: i64) -> StoreResult<(CreditAccount, CreditAccount)> {
        let mut tx = self.pool.begin().await?;
        let from_account = apply_tx(
            &mut tx,
            swarm_id,
            from,
            TransactionType::Transfer,
            -amount,
            Some("transfer".into()),
            Some(to.into()),
            None,
        )
        .await?;
        let to_account = apply_tx(
            &mut tx,
            swarm_id,
            to,
            TransactionType::Transfer,
            amount,
            Some("transfer".into()),
            Some(from.into()),
            None,
        )
        .await?;
        tx.commit().await?;
        Ok((from_account, to_account))
    }

    async fn record_outcome(&self, swarm_id: &str, agent_handle: &str, outcome: bool, weight: f64) -> StoreResult<CreditAccount> {
        let mut tx = self.pool.begin().await?;
        let mut account = get_or_create(&mut tx, swarm_id, agent_handle).await?;
        account.record_outcome(outcome, weight);
        save_account(&mut tx, &account).await?;
        tx.commit().await?;
        Ok(account)
    }

    async fn decay_reputation(&self, rate: f64, inactivity_ms: i64) -> StoreResult<u32> {
        let cutoff = (chrono::Utc::now() - chrono::Duration::milliseconds(inactivity_ms)).to_rfc3339();
        let stale = sqlx::query("SELECT swarm_id, agent_handle FROM agent_credits WHERE updated_at < ?")
            .bind(&cutoff)
            .fetch_all(&self.pool)
            .await?;
        let mut tx = self.pool.begin().await?;
        let mut count = 0u32;
        for row in stale {
            let swarm_id: String = row.get("swarm_id");
            let agent_handle: String = row.get("agent_handle");
            let mut account = get_or_create(&mut tx, &swarm_id, &agent_handle).await?;
            account.decay(rate);
            save_account(&mut tx, &account).await?;
            count += 1;
        }
        tx.commit().await?;
        Ok(count)
    }

    async fn leaderboard(&self, swarm_id: &str, metric: LeaderboardMetric, limit: u32) -> StoreResult<Vec<CreditAccount>> {
        let column = match metric {
            LeaderboardMetric::Balance => "balance",
            LeaderboardMetric::Reputation => "reputation_score",
            LeaderboardMetric::TotalEarned => "total_earned",
            LeaderboardMetric::TaskCount => "task_count",
        };
        let sql = format!("SELECT * FROM agent_credits WHERE swarm_id = ? ORDER BY {column} DESC LIMIT ?");
        let rows = sqlx::query(&sql).bind(swarm_id).bind(limit as i64).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(row_to_account).collect())
    }
}

async fn get_or_create(conn: &mut SqliteConnection, swarm_id: &str, agent_handle: &str) -> StoreResult<CreditAccount> {
    if let Some(row) = sqlx::query("SELECT * FROM agent_credits WHERE swarm_id = ? AND agent_handle = ?")
        .bind(swarm_id)
        .bind(agent_handle)
        .fetch_optional(&mut *conn)
        .await?
    {
        return Ok(row_to_account(row));
    }
    let account = CreditAccount::new(swarm_id.to_string(), agent_handle.to_string());
    save_account(conn, &account).await?;
    Ok(account)
}

async fn save_account(conn: &mut SqliteConnection, account: &CreditAccount) -> StoreResult<()> {
    sqlx::query(
        "INSERT INTO agent_credits (swarm_id, agent_handle, balance, reputation_score, total_earned,
            total_spent, task_count, success_count, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT (swarm_id, agent_handle) DO UPDATE SET
            balance = excluded.balance, reputation_score = excluded.reputation_score,
            total_earned = excluded.total_earned, total_spent = excluded.total_spent,
            task_count = excluded.task_count, success_count = excluded.success_count,
            updated_at = excluded.updated_at",
    )
    .bind(&account.swarm_id)
    .bind(&account.agent_handle)
    .bind(account.balance)
    .bind(account.reputation_score)
    .bind(account.total_earned)
    .bind(account.total_spent)
    .bind(account.task_count as i64)
    .bind(account.success_count as i64)
    .bind(account.updated_at.to_rfc3339())
    .execute(conn)
    .await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn apply_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    swarm_id: &str,
    agent_handle: &str,
    tx_type: TransactionType,
    amount: i64,
    reference_type: Option<String>,
    reference_id: Option<String>,
    reason: Option<String>,
) -> StoreResult<CreditAccount> {
    let mut account = get_or_create(tx, swarm_id, agent_handle).await?;
    let (recorded_delta, new_balance) = apply_delta(&mut account, tx_type, amount);
    save_account(tx, &account).await?;

    sqlx::query(
        "INSERT INTO credit_transactions (swarm_id, agent_handle, tx_type, amount, balance_after,
            reference_type, reference_id, reason, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(swarm_id)
    .bind(agent_handle)
    .bind(tx_type.as_str())
    .bind(recorded_delta)
    .bind(new_balance)
    .bind(reference_type)
    .bind(reference_id)
    .bind(reason)
    .bind(now_rfc3339())
    .execute(&mut **tx)
    .await?;
    Ok(account)
}

fn row_to_account(row: sqlx::sqlite::SqliteRow) -> CreditAccount {
    CreditAccount {
        swarm_id: row.get("swarm_id"),
        agent_handle: row.get("agent_handle"),
        balance: row.get("balance"),
        reputation_score: row.get("reputation_score"),
        total_earned: row.get("total_earned"),
        total_spent: row.get("total_spent"),
        task_count: row.get::<i64, _>("task_count") as u64,
        success_count: row.get::<i64, _>("success_count") as u64,
        updated_at: parse_dt(&row.get::<String, _>("updated_at")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::tests::test_store;

    #[tokio::test]
    async fn new_account_has_defaults() {
        let store = test_store().await;
        let acc = store.get_or_create_account("swarm", "agent").await.unwrap();
        assert_eq!(acc.balance, 100);
        assert_eq!(acc.reputation_score, 0.5);
    }

    #[tokio::test]
    async fn round_trip_transfer_leaves_balances_unchanged() {
        let store = test_store().await;
        store.get_or_create_account("swarm", "a").await.unwrap();
        store.get_or_create_account("swarm", "b").await.unwrap();
        store.transfer("swarm", "a", "b", 30).await.unwrap();
        store.transfer("swarm", "b", "a", 30).await.unwrap();
        let a = store.get_or_create_account("swarm", "a").await.unwrap();
        let b = store.get_or_create_account("swarm", "b").await.unwrap();
        assert_eq!(a.balance, 100);
        assert_eq!(b.balance, 100);
    }

    #[tokio::test]
    async fn spend_beyond_balance_clamps_at_zero() {
        let store = test_store().await;
        store.get_or_create_account("swarm", "a").await.unwrap();
        let acc = store
            .record_credit_tx("swarm", "a", TransactionType::Spend, 500, None, None, None)
            .await
            .unwrap();
        assert_eq!(acc.balance, 0);
    }
}
