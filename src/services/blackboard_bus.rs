//! Blackboard Bus service (spec §4.D): wraps `BlackboardStore` and fans out
//! every posted message to WebSocket subscribers on the `blackboard:{swarmId}`
//! topic (spec §6 "WebSocket server frames").

use std::sync::Arc;

use uuid::Uuid;

use tokio::sync::broadcast;

use crate::domain::errors::StoreResult;
use crate::domain::models::{BlackboardFilter, BlackboardMessage};
use crate::domain::ports::store::BlackboardStore;

#[derive(Debug, Clone)]
pub struct BlackboardPosted {
    pub swarm_id: String,
    pub message: BlackboardMessage,
}

pub struct BlackboardBus {
    store: Arc<dyn BlackboardStore>,
    posted: broadcast::Sender<BlackboardPosted>,
}

impl BlackboardBus {
    pub fn new(store: Arc<dyn BlackboardStore>) -> Self {
        let (posted, _) = broadcast::channel(1024);
        Self { store, posted }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BlackboardPosted> {
        self.posted.subscribe()
    }

    pub async fn post(&self, message: BlackboardMessage) -> StoreResult<()> {
        self.store.post(&message).await?;
        let _ = self.posted.send(BlackboardPosted { swarm_id: message.swarm_id.clone(), message });
        Ok(())
    }

    pub async fn read(&self, swarm_id: &str, filter: &BlackboardFilter) -> StoreResult<Vec<BlackboardMessage>> {
        self.store.read(swarm_id, filter).await
    }

    pub async fn mark_read(&self, ids: &[Uuid], reader: &str) -> StoreResult<()> {
        self.store.mark_read(ids, reader).await
    }

    pub async fn archive(&self, ids: &[Uuid]) -> StoreResult<u32> {
        self.store.archive(ids).await
    }

    /// Sweeps messages older than `age_ms` into the archive; intended to run
    /// on the auto-scheduler's housekeeping cadence (spec §4.D "Retention").
    pub async fn archive_older_than(&self, swarm_id: &str, age_ms: i64) -> StoreResult<u32> {
        self.store.archive_older_than(swarm_id, age_ms).await
    }

    pub async fn unread_count(&self, swarm_id: &str, reader: &str) -> StoreResult<u32> {
        self.store.unread_count(swarm_id, reader).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::tests::test_store;
    use crate::domain::models::{MessagePriority, MessageType};

    fn sample(swarm_id: &str) -> BlackboardMessage {
        BlackboardMessage {
            id: Uuid::new_v4(),
            swarm_id: swarm_id.to_string(),
            sender_handle: "alice".into(),
            message_type: MessageType::Status,
            priority: MessagePriority::Normal,
            payload: serde_json::json!({"note": "hi"}),
            target_handle: None,
            created_at: chrono::Utc::now(),
            expires_at: None,
            archived_at: None,
        }
    }

    #[tokio::test]
    async fn posting_fans_out_to_subscribers() {
        let store: Arc<dyn BlackboardStore> = Arc::new(test_store().await);
        let bus = BlackboardBus::new(store);
        let mut rx = bus.subscribe();
        let message = sample("swarm-1");
        bus.post(message.clone()).await.unwrap();
        let posted = rx.recv().await.unwrap();
        assert_eq!(posted.swarm_id, "swarm-1");
        assert_eq!(posted.message.id, message.id);
    }

    #[tokio::test]
    async fn read_returns_posted_message() {
        let store: Arc<dyn BlackboardStore> = Arc::new(test_store().await);
        let bus = BlackboardBus::new(store);
        bus.post(sample("swarm-2")).await.unwrap();
        let found = bus.read("swarm-2", &BlackboardFilter::default()).await.unwrap();
        assert_eq!(found.len(), 1);
    }
}
