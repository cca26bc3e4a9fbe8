//! Fixed role/permission matrix (spec §9 "Role/permission matrix is a
//! compile-time table, not dynamic dispatch"; glossary "Role matrix").

use crate::domain::models::AgentType;

/// Spawn-tree depth cap and spawn authorization per worker role (glossary).
pub fn max_depth(role: &str) -> u32 {
    match role {
        "lead" => 1,
        "worker" | "kraken" | "architect" => 2,
        "scout" | "oracle" | "critic" => 3,
        _ => 0,
    }
}

pub fn can_spawn(role: &str) -> bool {
    role == "lead"
}

/// Mutating HTTP operations gated by the caller's `agentType` (spec §4.G
/// "Auth"). `TeamLead`/`Coordinator` may do anything; other agent types are
/// restricted to their own lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    SpawnWorker,
    DismissWorker,
    ManageSchedule,
    ManageSwarm,
    PostBlackboard,
    PostMail,
    CreateTask,
    UpdateTask,
    Broadcast,
    ManageCheckpoint,
}

pub fn agent_type_allows(agent_type: AgentType, permission: Permission) -> bool {
    use AgentType::*;
    use Permission::*;
    match agent_type {
        TeamLead | Coordinator => true,
        Worker => matches!(permission, PostBlackboard | PostMail | CreateTask | UpdateTask | ManageCheckpoint),
        Merger => matches!(permission, UpdateTask | PostBlackboard | PostMail | ManageCheckpoint),
        Monitor | Notifier => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_has_depth_one_and_can_spawn() {
        assert_eq!(max_depth("lead"), 1);
        assert!(can_spawn("lead"));
    }

    #[test]
    fn workers_cannot_spawn() {
        assert!(!can_spawn("worker"));
        assert!(!can_spawn("kraken"));
        assert_eq!(max_depth("scout"), 3);
    }

    #[test]
    fn monitor_has_no_mutating_permissions() {
        assert!(!agent_type_allows(AgentType::Monitor, Permission::PostMail));
        assert!(agent_type_allows(AgentType::TeamLead, Permission::SpawnWorker));
        assert!(!agent_type_allows(AgentType::Worker, Permission::SpawnWorker));
    }
}
