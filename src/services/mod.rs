pub mod audit_log;
pub mod blackboard_bus;
pub mod ledger;
pub mod role_matrix;
pub mod scheduler;
pub mod spawn_queue_planner;
pub mod swarm_registry;
pub mod worker_supervisor;
