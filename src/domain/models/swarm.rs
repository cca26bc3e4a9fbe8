//! Swarm: a lightweight administrative grouping of workers, referenced by
//! `swarmId` across workers, blackboard messages, credit accounts, and
//! spawn-queue items, but not itself part of the durable coordination store
//! (spec §6 "`/swarms`"); see DESIGN.md for why it lives in memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Swarm {
    pub id: Uuid,
    pub name: String,
    pub max_agents: u32,
    pub created_at: DateTime<Utc>,
}

impl Swarm {
    pub fn new(name: String, max_agents: u32) -> Self {
        Self { id: Uuid::new_v4(), name, max_agents, created_at: Utc::now() }
    }
}
