//! Spawn Queue Planner (spec §4.C): pulls ready items in priority order,
//! checks dependencies and role/cap limits, and hands approved items to the
//! supervisor.

use std::sync::Arc;

use crate::domain::errors::StoreResult;
use crate::domain::models::config::PlannerConfig;
use crate::domain::models::{SpawnQueueItem, SpawnStatus};
use crate::domain::ports::store::Store;

use super::role_matrix;
use super::worker_supervisor::WorkerSupervisor;

pub struct SpawnQueuePlanner {
    store: Arc<dyn Store>,
    supervisor: Arc<WorkerSupervisor>,
    config: PlannerConfig,
}

/// Outcome of processing a single spawn-queue item, for callers that want to
/// report what the tick did.
#[derive(Debug)]
pub enum PlanOutcome {
    Spawned,
    Rejected(String),
    Deferred,
}

impl SpawnQueuePlanner {
    pub fn new(store: Arc<dyn Store>, supervisor: Arc<WorkerSupervisor>, config: PlannerConfig) -> Self {
        Self { store, supervisor, config }
    }

    /// Process up to `batch_size` ready items in priority order (spec §4.C
    /// "Planner tick").
    pub async fn tick(&self, fleet_url: &str) -> StoreResult<Vec<PlanOutcome>> {
        let items = self.store.get_ready_items(self.config.batch_size).await?;
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            outcomes.push(self.process_item(item, fleet_url).await?);
        }
        Ok(outcomes)
    }

    async fn process_item(&self, item: SpawnQueueItem, fleet_url: &str) -> StoreResult<PlanOutcome> {
        if !item.depends_on.is_empty() {
            let statuses = self.store.dependency_statuses(&item.depends_on).await?;
            // Dependencies only need to have been spawned, not succeeded
            // (spec §9 Open Question, resolved in DESIGN.md).
            if !statuses.iter().all(|s| matches!(s, SpawnStatus::Spawned)) {
                return Ok(PlanOutcome::Deferred);
            }
        }

        let Some(requester) = self.store.get_worker_by_handle(&item.requester_handle).await? else {
            return self.reject(item.id, "requester not found".into()).await;
        };

        if !role_matrix::can_spawn(&requester.role) {
            return self.reject(item.id, format!("role {} is not permitted to spawn", requester.role)).await;
        }

        let child_depth = requester.depth_level + 1;
        if child_depth > role_matrix::max_depth(&requester.role) {
            return self.reject(item.id, "spawn-tree depth cap exceeded".into()).await;
        }

        let swarm_cap = self.config.default_swarm_max_agents;
        let live_in_swarm = self.store.count_live_workers(item.swarm_id).await?;
        if live_in_swarm >= swarm_cap {
            return self.reject(item.id, "swarm agent cap reached".into()).await;
        }

        let handle = format!("{}-{}", item.target_agent_type, &item.id.to_string()[..8]);
        let spawn_result = self
            .supervisor
            .spawn_worker(
                handle,
                requester.team_name.clone(),
                item.target_agent_type.clone(),
                requester.working_dir.clone(),
                child_depth,
                item.swarm_id,
                fleet_url,
                requester.session_id.clone(),
            )
            .await;

        match spawn_result {
            Ok(worker) => {
                self.store
                    .update_spawn_status(item.id, SpawnStatus::Spawned, Some(worker.id), None)
                    .await?;
                Ok(PlanOutcome::Spawned)
            }
            Err(err) => self.reject(item.id, err.to_string()).await,
        }
    }

    async fn reject(&self, id: uuid::Uuid, reason: String) -> StoreResult<PlanOutcome> {
        self.store.update_spawn_status(id, SpawnStatus::Rejected, None, Some(reason.clone())).await?;
        Ok(PlanOutcome::Rejected(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_debug_is_readable() {
        let outcome = PlanOutcome::Rejected("no".into());
        assert!(format!("{outcome:?}").contains("no"));
    }
}
