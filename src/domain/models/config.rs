//! Process configuration (ambient stack, SPEC_FULL.md "Configuration").

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub http: HttpConfig,
    pub database: DatabaseConfig,
    pub supervisor: SupervisorConfig,
    pub planner: PlannerConfig,
    pub scheduler: SchedulerConfig,
    pub logging: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            database: DatabaseConfig::default(),
            supervisor: SupervisorConfig::default(),
            planner: PlannerConfig::default(),
            scheduler: SchedulerConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub bind_addr: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self { bind_addr: "0.0.0.0:8080".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: ".fleet/fleet.db".to_string(), max_connections: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Directories new workers are allowed to be spawned in.
    pub allowed_working_dir_roots: Vec<String>,
    pub default_restart_cap: u32,
    pub dismiss_grace_period_ms: u64,
    pub ring_buffer_capacity: usize,
    pub global_worker_cap: u32,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            allowed_working_dir_roots: vec!["/tmp/fleet-workers".to_string()],
            default_restart_cap: 3,
            dismiss_grace_period_ms: 10_000,
            ring_buffer_capacity: 500,
            global_worker_cap: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    pub tick_interval_ms: u64,
    pub batch_size: u32,
    pub default_swarm_max_agents: u32,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self { tick_interval_ms: 1_000, batch_size: 16, default_swarm_max_agents: 10 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub max_concurrent_tasks: u32,
    pub tick_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_concurrent_tasks: 10, tick_interval_ms: 1_000 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub log_dir: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty, log_dir: None }
    }
}
