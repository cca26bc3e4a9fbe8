//! Spawn queue item (spec §3, §4.C).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnStatus {
    Pending,
    Approved,
    Spawned,
    Rejected,
    Cancelled,
}

impl SpawnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Spawned => "spawned",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "spawned" => Some(Self::Spawned),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueuePriority {
    Low,
    Normal,
    High,
    Critical,
}

impl QueuePriority {
    /// `critical=4 > high=3 > normal=2 > low=1` (spec §4.C).
    pub fn weight(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Normal => 2,
            Self::High => 3,
            Self::Critical => 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnQueueItem {
    pub id: Uuid,
    pub requester_handle: String,
    pub target_agent_type: String,
    pub depth_level: u32,
    pub swarm_id: Option<Uuid>,
    pub priority: QueuePriority,
    pub depends_on: Vec<Uuid>,
    pub payload: Value,
    pub status: SpawnStatus,
    pub created_at: DateTime<Utc>,
    pub spawned_at: Option<DateTime<Utc>>,
    pub worker_id: Option<Uuid>,
    pub rejection_reason: Option<String>,
}

/// Ordering key for the planner: `(priority DESC, createdAt ASC)`, ties
/// broken by `id` (spec §4.C, §5).
pub fn ordering_key(item: &SpawnQueueItem) -> (std::cmp::Reverse<u8>, DateTime<Utc>, Uuid) {
    (std::cmp::Reverse(item.priority.weight()), item.created_at, item.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_weight_ordering() {
        assert!(QueuePriority::Critical.weight() > QueuePriority::High.weight());
        assert!(QueuePriority::High.weight() > QueuePriority::Normal.weight());
        assert!(QueuePriority::Normal.weight() > QueuePriority::Low.weight());
    }
}
