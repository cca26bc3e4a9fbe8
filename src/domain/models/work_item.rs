//! Task / WorkItem / Bead — the "work unit" entity (spec §3) and its
//! convoy/batch grouping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    Pending,
    InProgress,
    Completed,
    Blocked,
    Cancelled,
}

impl WorkItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Blocked => "blocked",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" | "open" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "completed" | "resolved" => Some(Self::Completed),
            "blocked" => Some(Self::Blocked),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Priority(pub u8);

impl Priority {
    pub fn new(value: u8) -> Option<Self> {
        (1..=5).contains(&value).then_some(Self(value))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: WorkItemStatus,
    pub assigned_to: Option<String>,
    pub created_by_handle: String,
    pub priority: Priority,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub blocked_by: Vec<Uuid>,
    pub blocks: Vec<Uuid>,
    pub convoy_id: Option<Uuid>,
    pub metadata: Value,
}

impl WorkItem {
    pub fn new(
        title: String,
        description: Option<String>,
        created_by_handle: String,
        priority: Priority,
        convoy_id: Option<Uuid>,
        metadata: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title,
            description,
            status: WorkItemStatus::Pending,
            assigned_to: None,
            created_by_handle,
            priority,
            created_at: now,
            updated_at: now,
            completed_at: None,
            blocked_by: Vec::new(),
            blocks: Vec::new(),
            convoy_id,
            metadata,
        }
    }

    /// Invariant (spec §8.1): if `assigned_to` is set, status is never
    /// `Pending`.
    pub fn assignment_invariant_holds(&self) -> bool {
        self.assigned_to.is_none() || self.status != WorkItemStatus::Pending
    }

    /// Whether every entry in `blocked_by` has completed, i.e. this item is
    /// unblocked (spec §3 "Task / WorkItem / Bead" invariant).
    pub fn unblocked(&self, blocker_statuses: &[WorkItemStatus]) -> bool {
        blocker_statuses.iter().all(|s| *s == WorkItemStatus::Completed)
    }
}

/// Whether adding the edge `from -> to` (meaning `from` is blocked by `to`)
/// would create a cycle in the `blocked_by` DAG, i.e. whether `to` can
/// already reach `from` through existing edges. Used by the Store before
/// accepting a new dependency (spec §3 invariant: `blockedBy` is a DAG).
pub fn would_create_cycle(
    from: Uuid,
    to: Uuid,
    edges: &std::collections::HashMap<Uuid, Vec<Uuid>>,
) -> bool {
    if from == to {
        return true;
    }
    let mut stack = vec![to];
    let mut visited = std::collections::HashSet::new();
    while let Some(node) = stack.pop() {
        if node == from {
            return true;
        }
        if !visited.insert(node) {
            continue;
        }
        if let Some(next) = edges.get(&node) {
            stack.extend(next.iter().copied());
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assignment_invariant() {
        let mut item = WorkItem::new(
            "t".into(),
            None,
            "lead".into(),
            Priority::new(3).unwrap(),
            None,
            Value::Null,
        );
        assert!(item.assignment_invariant_holds());
        item.assigned_to = Some("worker-1".into());
        assert!(!item.assignment_invariant_holds());
        item.status = WorkItemStatus::InProgress;
        assert!(item.assignment_invariant_holds());
    }

    #[test]
    fn priority_bounds() {
        assert!(Priority::new(0).is_none());
        assert!(Priority::new(6).is_none());
        assert!(Priority::new(1).is_some());
        assert!(Priority::new(5).is_some());
    }

    #[test]
    fn detects_cycle() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        // b is already blocked_by a; adding "a blocked_by b" would cycle.
        let mut edges = std::collections::HashMap::new();
        edges.insert(b, vec![a]);
        assert!(would_create_cycle(a, b, &edges));
    }

    #[test]
    fn no_cycle_on_dag() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let mut edges = std::collections::HashMap::new();
        edges.insert(b, vec![c]);
        assert!(!would_create_cycle(a, b, &edges));
    }
}
