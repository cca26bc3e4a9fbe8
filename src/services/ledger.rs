//! Credit & Reputation Ledger service (spec §4.E): wraps `CreditStore` with
//! the task-outcome correlation policy and scheduled reputation decay.

use std::sync::Arc;

use crate::domain::errors::StoreResult;
use crate::domain::models::{CreditAccount, LeaderboardMetric, TransactionType};
use crate::domain::ports::store::CreditStore;

/// EMA weight applied to every task-completion outcome (spec §4.E).
const OUTCOME_WEIGHT: f64 = 0.1;

pub struct Ledger {
    store: Arc<dyn CreditStore>,
}

impl Ledger {
    pub fn new(store: Arc<dyn CreditStore>) -> Self {
        Self { store }
    }

    pub async fn account(&self, swarm_id: &str, agent_handle: &str) -> StoreResult<CreditAccount> {
        self.store.get_or_create_account(swarm_id, agent_handle).await
    }

    pub async fn earn(&self, swarm_id: &str, agent_handle: &str, amount: i64, reason: Option<String>) -> StoreResult<CreditAccount> {
        self.store
            .record_credit_tx(swarm_id, agent_handle, TransactionType::Earn, amount, None, None, reason)
            .await
    }

    pub async fn spend(&self, swarm_id: &str, agent_handle: &str, amount: i64, reason: Option<String>) -> StoreResult<CreditAccount> {
        self.store
            .record_credit_tx(swarm_id, agent_handle, TransactionType::Spend, amount, None, None, reason)
            .await
    }

    pub async fn transfer(&self, swarm_id: &str, from: &str, to: &str, amount: i64) -> StoreResult<(CreditAccount, CreditAccount)> {
        self.store.transfer(swarm_id, from, to, amount).await
    }

    /// Called when a work item assigned to `agent_handle` completes or
    /// fails: earns/penalizes a fixed stipend and folds the outcome into the
    /// EMA reputation score in one policy step (spec §4.E "Task completion
    /// correlation").
    pub async fn record_task_outcome(&self, swarm_id: &str, agent_handle: &str, work_item_id: &str, success: bool) -> StoreResult<CreditAccount> {
        let tx_type = if success { TransactionType::Earn } else { TransactionType::Penalty };
        let stipend = if success { 10 } else { 5 };
        self.store
            .record_credit_tx(
                swarm_id,
                agent_handle,
                tx_type,
                stipend,
                Some("work_item".into()),
                Some(work_item_id.into()),
                Some(if success { "task completed".into() } else { "task failed".into() }),
            )
            .await?;
        self.store.record_outcome(swarm_id, agent_handle, success, OUTCOME_WEIGHT).await
    }

    /// Pull every account's reputation toward neutral when inactive for
    /// `inactivity_ms`; run periodically alongside the auto-scheduler tick
    /// (spec §4.E "Decay").
    pub async fn decay_tick(&self, rate: f64, inactivity_ms: i64) -> StoreResult<u32> {
        self.store.decay_reputation(rate, inactivity_ms).await
    }

    pub async fn leaderboard(&self, swarm_id: &str, metric: LeaderboardMetric, limit: u32) -> StoreResult<Vec<CreditAccount>> {
        self.store.leaderboard(swarm_id, metric, limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::tests::test_store;

    #[tokio::test]
    async fn task_outcome_pays_stipend_and_updates_reputation() {
        let store = Arc::new(test_store().await);
        let ledger = Ledger::new(store);
        let before = ledger.account("swarm", "alice").await.unwrap();
        let after = ledger.record_task_outcome("swarm", "alice", "item-1", true).await.unwrap();
        assert_eq!(after.balance, before.balance + 10);
        assert_eq!(after.task_count, 1);
        assert_eq!(after.success_count, 1);
    }

    #[tokio::test]
    async fn failed_task_applies_penalty() {
        let store = Arc::new(test_store().await);
        let ledger = Ledger::new(store);
        let before = ledger.account("swarm", "bob").await.unwrap();
        let after = ledger.record_task_outcome("swarm", "bob", "item-2", false).await.unwrap();
        assert_eq!(after.balance, before.balance - 5);
        assert_eq!(after.success_count, 0);
    }
}
