//! In-memory audit log of every mutating HTTP call (SPEC_FULL.md
//! supplemented feature): a fixed-capacity ring buffer summarized at
//! `GET /health`, not persisted to the store.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub method: String,
    pub path: String,
    pub status: u16,
    pub actor_uid: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct AuditSummary {
    pub total: usize,
    pub errors: usize,
    pub recent: Vec<AuditEntry>,
}

pub struct AuditLog {
    capacity: usize,
    entries: RwLock<VecDeque<AuditEntry>>,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self { capacity, entries: RwLock::new(VecDeque::with_capacity(capacity)) }
    }

    /// Records one mutating call. Non-mutating methods (GET/HEAD/OPTIONS)
    /// are filtered by the caller before reaching here.
    pub async fn record(&self, method: &str, path: &str, status: u16, actor_uid: Option<String>) {
        let mut entries = self.entries.write().await;
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(AuditEntry { method: method.to_string(), path: path.to_string(), status, actor_uid, at: Utc::now() });
    }

    /// Summary surfaced at `GET /health`: running totals plus the most
    /// recent `limit` entries, newest first.
    pub async fn summary(&self, limit: usize) -> AuditSummary {
        let entries = self.entries.read().await;
        let errors = entries.iter().filter(|e| e.status >= 400).count();
        let recent = entries.iter().rev().take(limit).cloned().collect();
        AuditSummary { total: entries.len(), errors, recent }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ring_buffer_drops_oldest_past_capacity() {
        let log = AuditLog::new(2);
        log.record("POST", "/a", 200, None).await;
        log.record("POST", "/b", 200, None).await;
        log.record("POST", "/c", 200, None).await;
        let summary = log.summary(10).await;
        assert_eq!(summary.total, 2);
        assert_eq!(summary.recent[0].path, "/c");
        assert_eq!(summary.recent[1].path, "/b");
    }

    #[tokio::test]
    async fn summary_counts_error_statuses() {
        let log = AuditLog::new(10);
        log.record("POST", "/a", 200, None).await;
        log.record("DELETE", "/b", 409, None).await;
        let summary = log.summary(10).await;
        assert_eq!(summary.errors, 1);
    }
}
