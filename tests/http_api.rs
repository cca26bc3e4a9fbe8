//! HTTP front integration tests (grounded on
//! `FlexNetOS-noa_ark_os/server/api/src/routes.rs`'s `tower::ServiceExt::oneshot`
//! harness): drives the real axum `Router` against an in-memory sqlite store,
//! with no live worker processes involved.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use fleet_core::adapters::sqlite::{DatabaseConnection, SqliteStore};
use fleet_core::domain::ports::NullNotifier;
use fleet_core::infrastructure::http::{build_router, AppState};
use fleet_core::services::audit_log::AuditLog;
use fleet_core::services::blackboard_bus::BlackboardBus;
use fleet_core::services::ledger::Ledger;
use fleet_core::services::scheduler::Scheduler;
use fleet_core::services::spawn_queue_planner::SpawnQueuePlanner;
use fleet_core::services::worker_supervisor::WorkerSupervisor;

/// A `ProcessTransport` that always fails to spawn; fine for every test here
/// since none of them exercise `/orchestrate/workers`.
struct NoProcessTransport;

#[async_trait::async_trait]
impl fleet_core::domain::ports::ProcessTransport for NoProcessTransport {
    async fn spawn(
        &self,
        _handle: &str,
        _working_dir: &str,
        _env: &[(String, String)],
        _output_tx: tokio::sync::mpsc::UnboundedSender<fleet_core::domain::ports::OutputEvent>,
    ) -> fleet_core::domain::errors::StoreResult<Box<dyn fleet_core::domain::ports::ProcessHandle>> {
        Err(fleet_core::domain::errors::StoreError::Fatal("no process transport in tests".into()))
    }
}

async fn build_test_router() -> Router {
    let db = DatabaseConnection::connect("sqlite::memory:", 1).await.expect("open in-memory sqlite");
    db.migrate().await.expect("run migrations");
    let store: Arc<SqliteStore> = Arc::new(SqliteStore::new(db.pool().clone()));

    let notifier = Arc::new(NullNotifier);
    let transport = Arc::new(NoProcessTransport);
    let supervisor = Arc::new(WorkerSupervisor::new(store.clone(), transport, notifier.clone(), Default::default()));
    let planner = Arc::new(SpawnQueuePlanner::new(store.clone(), supervisor.clone(), Default::default()));
    let ledger = Arc::new(Ledger::new(store.clone()));
    let blackboard = Arc::new(BlackboardBus::new(store.clone()));
    let scheduler = Arc::new(Scheduler::new(store.clone(), store.clone(), notifier, 10));
    let audit_log = Arc::new(AuditLog::new(100));

    let state = Arc::new(AppState {
        store,
        supervisor,
        planner,
        ledger,
        blackboard,
        scheduler,
        audit_log,
        swarms: Default::default(),
        tokens: Default::default(),
        topics: Default::default(),
        fleet_url: "http://localhost:8080".to_string(),
        started_at: Instant::now(),
        version: "test",
    });
    build_router(state)
}

async fn send_json(router: &Router, method: &str, path: &str, body: Option<Value>) -> (StatusCode, Value) {
    send_json_with_token(router, method, path, body, None).await
}

async fn send_json_with_token(router: &Router, method: &str, path: &str, body: Option<Value>, token: Option<&str>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(path).header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(v) => Body::from(v.to_string()),
        None => Body::from("{}".to_string()),
    };
    let response = router.clone().oneshot(request.body(body).expect("valid request")).await.expect("router responds");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body to bytes").to_bytes();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).expect("json body") };
    (status, value)
}

/// Authenticates as a `team-lead` (every permission) and returns the bearer
/// token, for tests that exercise a gated mutating route.
async fn authenticate(router: &Router, team_name: &str) -> String {
    let (status, payload) = send_json(
        router,
        "POST",
        "/auth",
        Some(json!({ "handle": "alice", "team_name": team_name, "agent_type": "team-lead" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    payload["token"].as_str().expect("token").to_string()
}

#[tokio::test]
async fn health_reports_ok_and_zero_workers() {
    let router = build_test_router().await;
    let (status, payload) = send_json(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["status"], Value::String("ok".into()));
    assert_eq!(payload["workers"]["total"], json!(0));
}

#[tokio::test]
async fn auth_issues_a_bearer_token() {
    let router = build_test_router().await;
    let (status, payload) = send_json(
        &router,
        "POST",
        "/auth",
        Some(json!({ "handle": "alice", "team_name": "dev-team", "agent_type": "team-lead" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payload["handle"], Value::String("alice".into()));
    assert!(payload["token"].as_str().is_some_and(|t| !t.is_empty()));
}

#[tokio::test]
async fn auth_rejects_invalid_handle() {
    let router = build_test_router().await;
    let (status, _) = send_json(&router, "POST", "/auth", Some(json!({ "handle": "", "team_name": "dev-team", "agent_type": "lead" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_task_then_list_by_team() {
    let router = build_test_router().await;
    let token = authenticate(&router, "dev-team").await;
    let (status, created) = send_json_with_token(
        &router,
        "POST",
        "/tasks",
        Some(json!({ "title": "fix the build", "created_by_handle": "alice", "team_name": "dev-team", "priority": 3 })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(created["id"].is_string());

    let (status, tasks) = send_json(&router, "GET", "/teams/dev-team/tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tasks.as_array().expect("array").len(), 1);
}

#[tokio::test]
async fn blackboard_post_then_read_back() {
    let router = build_test_router().await;
    let token = authenticate(&router, "dev-team").await;
    let (status, _) = send_json_with_token(
        &router,
        "POST",
        "/blackboard",
        Some(json!({
            "swarm_id": "swarm-1",
            "sender_handle": "alice",
            "message_type": "status",
            "priority": "normal",
            "payload": { "note": "progress" },
        })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, messages) = send_json(&router, "GET", "/blackboard?swarm_id=swarm-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(messages.as_array().expect("array").len(), 1);
}

#[tokio::test]
async fn swarm_crud_round_trips() {
    let router = build_test_router().await;
    let token = authenticate(&router, "dev-team").await;
    let (status, swarm) =
        send_json_with_token(&router, "POST", "/swarms", Some(json!({ "name": "alpha-swarm", "max_agents": 5 })), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    let id = swarm["id"].as_str().expect("id").to_string();

    let (status, list) = send_json(&router, "GET", "/swarms", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().expect("array").len(), 1);

    let (status, _) = send_json_with_token(&router, "DELETE", &format!("/swarms/{id}"), None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, list) = send_json(&router, "GET", "/swarms", None).await;
    assert!(list.as_array().expect("array").is_empty());
}

#[tokio::test]
async fn spawn_queue_enqueue_then_list_ready() {
    let router = build_test_router().await;
    let token = authenticate(&router, "dev-team").await;
    let (status, _) = send_json_with_token(
        &router,
        "POST",
        "/spawn-queue",
        Some(json!({
            "requester_handle": "alice",
            "target_agent_type": "worker",
            "depth_level": 1,
            "priority": "normal",
        })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, items) = send_json(&router, "GET", "/spawn-queue", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(items.as_array().expect("array").len(), 1);
}

#[tokio::test]
async fn scheduler_rejects_bad_cron_expression() {
    let router = build_test_router().await;
    let token = authenticate(&router, "dev-team").await;
    let (status, _) = send_json_with_token(
        &router,
        "POST",
        "/scheduler/schedules",
        Some(json!({ "name": "nightly", "cron_expr": "not a cron expression", "task_template_ids": [] })),
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
