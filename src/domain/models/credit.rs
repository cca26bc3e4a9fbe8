//! Credit & Reputation Ledger entities (spec §3, §4.E).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const INITIAL_BALANCE: i64 = 100;
pub const INITIAL_REPUTATION: f64 = 0.5;
pub const NEUTRAL_REPUTATION: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Earn,
    Spend,
    Bonus,
    Penalty,
    Transfer,
    Adjustment,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Earn => "earn",
            Self::Spend => "spend",
            Self::Bonus => "bonus",
            Self::Penalty => "penalty",
            Self::Transfer => "transfer",
            Self::Adjustment => "adjustment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "earn" => Some(Self::Earn),
            "spend" => Some(Self::Spend),
            "bonus" => Some(Self::Bonus),
            "penalty" => Some(Self::Penalty),
            "transfer" => Some(Self::Transfer),
            "adjustment" => Some(Self::Adjustment),
            _ => None,
        }
    }

    /// Whether this transaction type earns/spends are counted toward
    /// `totalEarned`/`totalSpent`. `adjustment` is explicitly excluded
    /// (spec §9 open question, resolved in DESIGN.md).
    pub fn counts_toward_totals(&self) -> bool {
        !matches!(self, Self::Adjustment)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditAccount {
    pub swarm_id: String,
    pub agent_handle: String,
    pub balance: i64,
    pub reputation_score: f64,
    pub total_earned: i64,
    pub total_spent: i64,
    pub task_count: u64,
    pub success_count: u64,
    pub updated_at: DateTime<Utc>,
}

impl CreditAccount {
    pub fn new(swarm_id: String, agent_handle: String) -> Self {
        Self {
            swarm_id,
            agent_handle,
            balance: INITIAL_BALANCE,
            reputation_score: INITIAL_REPUTATION,
            total_earned: 0,
            total_spent: 0,
            task_count: 0,
            success_count: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn success_rate(&self) -> f64 {
        self.success_count as f64 / self.task_count.max(1) as f64
    }

    /// EMA reputation update with weight `w` on a 0/1 outcome (spec §4.E).
    pub fn record_outcome(&mut self, outcome: bool, w: f64) {
        let o = if outcome { 1.0 } else { 0.0 };
        self.reputation_score = self.reputation_score * (1.0 - w) + o * w;
        self.task_count += 1;
        if outcome {
            self.success_count += 1;
        }
        self.updated_at = Utc::now();
    }

    /// Pull reputation toward neutral by `rate` (spec §4.E "Decay").
    pub fn decay(&mut self, rate: f64) {
        self.reputation_score =
            self.reputation_score * (1.0 - rate) + NEUTRAL_REPUTATION * rate;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub swarm_id: String,
    pub agent_handle: String,
    pub tx_type: TransactionType,
    pub amount: i64,
    pub balance_after: i64,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Apply one transaction's delta to an account balance, clamped at zero
/// (spec §4.E "Balance semantics"). Returns the signed amount actually
/// recorded and the resulting balance.
///
/// `amount` is a non-negative magnitude for `Earn`/`Bonus`/`Spend`/`Penalty`
/// (the type determines the sign); for `Transfer`/`Adjustment` it is already
/// signed by the caller.
pub fn apply_delta(account: &mut CreditAccount, tx_type: TransactionType, amount: i64) -> (i64, i64) {
    let signed = match tx_type {
        TransactionType::Earn | TransactionType::Bonus => amount,
        TransactionType::Spend | TransactionType::Penalty => -amount,
        TransactionType::Transfer | TransactionType::Adjustment => amount,
    };
    let new_balance = (account.balance + signed).max(0);
    let recorded_delta = new_balance - account.balance;
    account.balance = new_balance;
    match tx_type {
        TransactionType::Earn | TransactionType::Bonus => account.total_earned += amount,
        TransactionType::Spend | TransactionType::Penalty => account.total_spent += amount,
        _ => {}
    }
    account.updated_at = Utc::now();
    (recorded_delta, new_balance)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardMetric {
    Balance,
    Reputation,
    TotalEarned,
    TaskCount,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spend_clamps_at_zero() {
        let mut acc = CreditAccount::new("swarm".into(), "a".into());
        acc.balance = 10;
        let (_, bal) = apply_delta(&mut acc, TransactionType::Spend, 50);
        assert_eq!(bal, 0);
        assert_eq!(acc.balance, 0);
    }

    #[test]
    fn earn_increases_total_earned() {
        let mut acc = CreditAccount::new("swarm".into(), "a".into());
        apply_delta(&mut acc, TransactionType::Earn, 20);
        assert_eq!(acc.balance, 120);
        assert_eq!(acc.total_earned, 20);
    }

    #[test]
    fn ema_reputation_stays_in_bounds() {
        let mut acc = CreditAccount::new("swarm".into(), "a".into());
        for _ in 0..50 {
            acc.record_outcome(true, 0.1);
        }
        assert!(acc.reputation_score <= 1.0);
        assert!(acc.reputation_score > 0.9);
    }

    #[test]
    fn decay_matches_worked_example() {
        let mut acc = CreditAccount::new("swarm".into(), "a".into());
        acc.reputation_score = 0.8;
        acc.decay(0.1);
        assert!((acc.reputation_score - 0.77).abs() < 1e-9);
    }
}
