//! Composition root: loads configuration, opens the store, wires the
//! services together, and serves the HTTP/WS front with graceful shutdown
//! (spec §5 "Process lifecycle").

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast;

use fleet_core::adapters::notifier::WebhookNotifier;
use fleet_core::adapters::process::OsProcessTransport;
use fleet_core::adapters::sqlite::{DatabaseConnection, SqliteStore};
use fleet_core::domain::ports::NullNotifier;
use fleet_core::infrastructure::config;
use fleet_core::infrastructure::http::{build_router, AppState};
use fleet_core::infrastructure::logging;
use fleet_core::services::audit_log::AuditLog;
use fleet_core::services::blackboard_bus::BlackboardBus;
use fleet_core::services::ledger::Ledger;
use fleet_core::services::scheduler::Scheduler;
use fleet_core::services::spawn_queue_planner::SpawnQueuePlanner;
use fleet_core::services::worker_supervisor::WorkerSupervisor;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = config::load().context("loading configuration")?;
    let _logger_guard = logging::init(&cfg.logging).context("initializing logger")?;

    tracing::info!(bind_addr = %cfg.http.bind_addr, "starting fleet-core");

    let db = DatabaseConnection::connect(&cfg.database.path, cfg.database.max_connections)
        .await
        .context("connecting to sqlite database")?;
    db.migrate().await.context("running migrations")?;
    let store: Arc<SqliteStore> = Arc::new(SqliteStore::new(db.pool().clone()));

    let notifier: Arc<dyn fleet_core::domain::ports::Notifier> = match std::env::var("FLEET_WEBHOOK_URL") {
        Ok(url) if !url.is_empty() => Arc::new(WebhookNotifier::new(url)),
        _ => Arc::new(NullNotifier),
    };

    let transport = Arc::new(OsProcessTransport);
    let supervisor = Arc::new(WorkerSupervisor::new(store.clone(), transport, notifier.clone(), cfg.supervisor.clone()));
    let planner = Arc::new(SpawnQueuePlanner::new(store.clone(), supervisor.clone(), cfg.planner.clone()));
    let ledger = Arc::new(Ledger::new(store.clone()));
    let blackboard = Arc::new(BlackboardBus::new(store.clone()));
    let scheduler = Arc::new(Scheduler::new(store.clone(), store.clone(), notifier.clone(), cfg.scheduler.max_concurrent_tasks));
    let audit_log = Arc::new(AuditLog::new(500));

    let fleet_url = format!("http://{}", cfg.http.bind_addr);
    let state = Arc::new(AppState {
        store: store.clone(),
        supervisor: supervisor.clone(),
        planner: planner.clone(),
        ledger,
        blackboard: blackboard.clone(),
        scheduler: scheduler.clone(),
        audit_log,
        swarms: Default::default(),
        tokens: Default::default(),
        topics: Default::default(),
        fleet_url: fleet_url.clone(),
        started_at: Instant::now(),
        version: env!("CARGO_PKG_VERSION"),
    });

    spawn_background_loops(state.clone(), &cfg, fleet_url);

    let listener = tokio::net::TcpListener::bind(&cfg.http.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.http.bind_addr))?;
    let router = build_router(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    tracing::info!("fleet-core shut down cleanly");
    Ok(())
}

/// Spawns the planner tick, scheduler tick, supervisor housekeeping, and
/// event-fanout loops as independent background tasks.
fn spawn_background_loops(state: Arc<AppState>, cfg: &fleet_core::domain::models::config::Config, fleet_url: String) {
    let planner_interval = Duration::from_millis(cfg.planner.tick_interval_ms);
    let scheduler_interval = Duration::from_millis(cfg.scheduler.tick_interval_ms);

    {
        let state = state.clone();
        let fleet_url = fleet_url.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(planner_interval);
            loop {
                ticker.tick().await;
                if let Err(err) = state.planner.tick(&fleet_url).await {
                    tracing::warn!(error = %err, "spawn queue planner tick failed");
                }
            }
        });
    }

    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(5));
            loop {
                ticker.tick().await;
                if let Err(err) = state.supervisor.housekeeping_tick().await {
                    tracing::warn!(error = %err, "supervisor housekeeping tick failed");
                }
            }
        });
    }

    {
        let state = state.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(scheduler_interval);
            loop {
                ticker.tick().await;
                for team in distinct_teams(&state).await {
                    if let Err(err) = state.scheduler.tick(&team).await {
                        tracing::warn!(error = %err, team_name = %team, "scheduler tick failed");
                    }
                }
            }
        });
    }

    spawn_event_fanout(state.clone());
}

async fn distinct_teams(state: &Arc<AppState>) -> Vec<String> {
    use std::collections::HashSet;
    match state.store.list_workers(None).await {
        Ok(workers) => workers.into_iter().map(|w| w.team_name).collect::<HashSet<_>>().into_iter().collect(),
        Err(err) => {
            tracing::warn!(error = %err, "failed to list workers for scheduler sweep");
            Vec::new()
        }
    }
}

/// Republishes supervisor and blackboard events onto the WebSocket topics
/// clients subscribe to (spec §4.G "Fan-out").
fn spawn_event_fanout(state: Arc<AppState>) {
    {
        let state = state.clone();
        let mut events = state.supervisor.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => publish_supervisor_event(&state, event).await,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "supervisor event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    {
        let state = state.clone();
        let mut posted = state.blackboard.subscribe();
        tokio::spawn(async move {
            loop {
                match posted.recv().await {
                    Ok(event) => {
                        let topic = format!("swarm:{}", event.swarm_id);
                        state.topics.publish(&topic, serde_json::json!({ "type": "broadcast", "message": event.message })).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "blackboard event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

async fn publish_supervisor_event(state: &Arc<AppState>, event: fleet_core::services::worker_supervisor::SupervisorEvent) {
    use fleet_core::services::worker_supervisor::SupervisorEvent;

    let (team_name, handle, payload) = match event {
        SupervisorEvent::Ready { team_name, handle } => (team_name.clone(), handle.clone(), serde_json::json!({ "type": "ready", "handle": handle })),
        SupervisorEvent::Output { team_name, handle, text } => {
            (team_name.clone(), handle.clone(), serde_json::json!({ "type": "output", "handle": handle, "text": text }))
        }
        SupervisorEvent::Tool { team_name, handle, tool_name } => {
            (team_name.clone(), handle.clone(), serde_json::json!({ "type": "tool", "handle": handle, "tool_name": tool_name }))
        }
        SupervisorEvent::Result { team_name, handle } => (team_name.clone(), handle.clone(), serde_json::json!({ "type": "result", "handle": handle })),
        SupervisorEvent::Error { team_name, handle, message } => {
            (team_name.clone(), handle.clone(), serde_json::json!({ "type": "error", "handle": handle, "message": message }))
        }
        SupervisorEvent::Exit { team_name, handle } => (team_name.clone(), handle.clone(), serde_json::json!({ "type": "exit", "handle": handle })),
    };
    let topic = format!("team:{team_name}");
    state.topics.publish(&topic, payload.clone()).await;
    let topic = format!("worker:{team_name}:{handle}");
    state.topics.publish(&topic, payload).await;
}

/// Waits for SIGTERM or SIGINT, per spec §5's SIGTERM-first process lifecycle.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("install ctrl-c handler");
    };

    let terminate = async {
        signal(SignalKind::terminate()).expect("install SIGTERM handler").recv().await;
    };

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received, draining connections");
}
