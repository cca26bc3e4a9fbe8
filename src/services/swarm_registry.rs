//! In-memory swarm registry backing `/swarms` CRUD (SPEC_FULL.md
//! supplemented feature; see DESIGN.md for why this isn't store-backed).

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::models::Swarm;

#[derive(Default)]
pub struct SwarmRegistry {
    swarms: RwLock<HashMap<Uuid, Swarm>>,
}

impl SwarmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, name: String, max_agents: u32) -> Swarm {
        let swarm = Swarm::new(name, max_agents);
        self.swarms.write().await.insert(swarm.id, swarm.clone());
        swarm
    }

    pub async fn list(&self) -> Vec<Swarm> {
        self.swarms.read().await.values().cloned().collect()
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.swarms.write().await.remove(&id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_list_remove_round_trips() {
        let registry = SwarmRegistry::new();
        let swarm = registry.create("alpha".to_string(), 10).await;
        assert_eq!(registry.list().await.len(), 1);
        assert!(registry.remove(swarm.id).await);
        assert!(registry.list().await.is_empty());
    }
}
