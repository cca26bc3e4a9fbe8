//! Shared application state for the HTTP/WS front (spec §4.G, §5).

use std::sync::Arc;
use std::time::Instant;

use crate::domain::ports::store::Store;
use crate::services::audit_log::AuditLog;
use crate::services::blackboard_bus::BlackboardBus;
use crate::services::ledger::Ledger;
use crate::services::scheduler::Scheduler;
use crate::services::spawn_queue_planner::SpawnQueuePlanner;
use crate::services::swarm_registry::SwarmRegistry;
use crate::services::worker_supervisor::WorkerSupervisor;

use super::auth::TokenRegistry;
use super::ws::TopicRegistry;

pub struct AppState {
    pub store: Arc<dyn Store>,
    pub supervisor: Arc<WorkerSupervisor>,
    pub planner: Arc<SpawnQueuePlanner>,
    pub ledger: Arc<Ledger>,
    pub blackboard: Arc<BlackboardBus>,
    pub scheduler: Arc<Scheduler>,
    pub audit_log: Arc<AuditLog>,
    pub swarms: SwarmRegistry,
    pub tokens: TokenRegistry,
    pub topics: TopicRegistry,
    pub fleet_url: String,
    pub started_at: Instant,
    pub version: &'static str,
}

impl AppState {
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
