//! Route table (spec §4.G, §6 "HTTP API"). Each handler: validate → resolve
//! auth → call a component operation → serialize.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::domain::models::{
    AgentType, BlackboardFilter, BlackboardMessage, Checkpoint, CheckpointStatus, DoneItem, MessagePriority, MessageType, Priority, QueuePriority,
    Schedule, SpawnQueueItem, SpawnStatus, Template, WorkItem, WorkItemStatus, WorkerHealth,
};

use super::auth::{AuthContext, Authed};
use super::error::ApiError;
use super::state::AppState;
use super::validators;
use super::ws;
use crate::services::role_matrix::Permission;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/auth", post(auth))
        .route("/health", get(health))
        .route("/users/:uid", get(get_user))
        .route("/teams/:team/agents", get(get_team_agents))
        .route("/users/:uid/chats", get(get_user_chats))
        .route("/chats", post(create_chat))
        .route("/chats/:id/messages", get(get_chat_messages).post(post_chat_message))
        .route("/chats/:id/read", post(mark_chat_read))
        .route("/teams/:team/broadcast", post(team_broadcast))
        .route("/tasks", post(create_task))
        .route("/teams/:team/tasks", get(get_team_tasks))
        .route("/tasks/:id", patch(patch_task))
        .route("/orchestrate/workers", get(list_workers).post(spawn_worker))
        .route("/orchestrate/workers/:handle", delete(dismiss_worker))
        .route("/orchestrate/workers/:handle/message", post(message_worker))
        .route("/orchestrate/workers/:handle/output", get(worker_output))
        .route("/blackboard", get(read_blackboard).post(post_blackboard))
        .route("/blackboard/mark-read", post(blackboard_mark_read))
        .route("/blackboard/archive", post(blackboard_archive))
        .route("/blackboard/archive-old", post(blackboard_archive_old))
        .route("/spawn-queue", get(list_spawn_queue).post(enqueue_spawn))
        .route("/spawn-queue/:id", get(get_spawn_item).delete(cancel_spawn_item))
        .route("/checkpoints", post(create_checkpoint).get(list_checkpoints))
        .route("/checkpoints/:handle/latest", get(latest_checkpoint))
        .route("/checkpoints/:id/accept", post(accept_checkpoint))
        .route("/checkpoints/:id/reject", post(reject_checkpoint))
        .route("/scheduler/status", get(scheduler_status))
        .route("/scheduler/start", post(start_scheduler))
        .route("/scheduler/stop", post(stop_scheduler))
        .route("/scheduler/schedules", get(list_schedules).post(create_schedule))
        .route("/scheduler/schedules/:id", patch(update_schedule).delete(delete_schedule))
        .route("/scheduler/templates", get(list_templates).post(create_template))
        .route("/scheduler/templates/:id", patch(update_template).delete(delete_template))
        .route("/swarms", get(list_swarms).post(create_swarm))
        .route("/swarms/:id", delete(delete_swarm))
        .route("/ws", get(ws::handler))
        .with_state(state)
}

fn team_topic(team: &str) -> String {
    format!("team:{team}")
}
fn swarm_topic(swarm_id: &str) -> String {
    format!("swarm:{swarm_id}")
}
fn worker_topic(team: &str, handle: &str) -> String {
    format!("worker:{team}:{handle}")
}

// ---- Auth ----

#[derive(Deserialize)]
struct AuthRequest {
    handle: String,
    team_name: String,
    agent_type: String,
}

#[derive(Serialize)]
struct AuthResponse {
    uid: String,
    handle: String,
    team_name: String,
    agent_type: String,
    token: String,
}

async fn auth(State(state): State<Arc<AppState>>, Json(body): Json<AuthRequest>) -> Result<Json<AuthResponse>, ApiError> {
    validators::identifier("handle", &body.handle)?;
    validators::identifier("teamName", &body.team_name)?;
    let agent_type = AgentType::from_str(&body.agent_type).ok_or_else(|| ApiError::validation("unknown agentType"))?;

    let user = state.store.upsert_user(&body.team_name, &body.handle, agent_type).await?;
    let token = state
        .tokens
        .issue(AuthContext { uid: user.uid.clone(), team_name: user.team_name.clone(), agent_type })
        .await;

    Ok(Json(AuthResponse { uid: user.uid, handle: user.handle, team_name: user.team_name, agent_type: agent_type.as_str().to_string(), token }))
}

// ---- Health ----

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime: u64,
    workers: WorkerCounts,
    audit: crate::services::audit_log::AuditSummary,
}

#[derive(Serialize, Default)]
struct WorkerCounts {
    total: usize,
    healthy: usize,
    degraded: usize,
    unhealthy: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Result<Json<HealthResponse>, ApiError> {
    let workers = state.store.list_workers(None).await?;
    let mut counts = WorkerCounts::default();
    counts.total = workers.len();
    for worker in &workers {
        match worker.health {
            WorkerHealth::Healthy => counts.healthy += 1,
            WorkerHealth::Degraded => counts.degraded += 1,
            WorkerHealth::Unhealthy => counts.unhealthy += 1,
        }
    }
    let audit = state.audit_log.summary(20).await;
    Ok(Json(HealthResponse { status: "ok", version: state.version, uptime: state.uptime_seconds(), workers: counts, audit }))
}

// ---- Users / teams ----

async fn get_user(State(state): State<Arc<AppState>>, Path(uid): Path<String>) -> Result<Json<Value>, ApiError> {
    validators::uid(&uid)?;
    let user = state.store.get_user(&uid).await?.ok_or_else(|| ApiError::validation("user not found"))?;
    Ok(Json(serde_json::to_value(user).map_err(|e| ApiError::validation(e.to_string()))?))
}

async fn get_team_agents(State(state): State<Arc<AppState>>, Path(team): Path<String>) -> Result<Json<Value>, ApiError> {
    validators::identifier("teamName", &team)?;
    let users = state.store.get_users_by_team(&team).await?;
    Ok(Json(serde_json::to_value(users).map_err(|e| ApiError::validation(e.to_string()))?))
}

// ---- Chats ----

async fn get_user_chats(State(state): State<Arc<AppState>>, Path(uid): Path<String>) -> Result<Json<Value>, ApiError> {
    validators::uid(&uid)?;
    let chats = state.store.get_chats_by_user(&uid).await?;
    Ok(Json(serde_json::to_value(chats).map_err(|e| ApiError::validation(e.to_string()))?))
}

#[derive(Deserialize)]
struct CreateChatRequest {
    uid1: String,
    uid2: String,
}

async fn create_chat(ctx: Authed, Json(body): Json<CreateChatRequest>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::PostMail)?;
    validators::uid(&body.uid1)?;
    validators::uid(&body.uid2)?;
    let chat = ctx.state.store.insert_chat(&[body.uid1, body.uid2]).await?;
    Ok(Json(json!({ "chatId": chat.id })))
}

#[derive(Deserialize)]
struct MessagesQuery {
    limit: Option<u32>,
    after: Option<i64>,
}

async fn get_chat_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<Value>, ApiError> {
    let messages = state.store.get_messages(&id, query.limit.unwrap_or(50), query.after).await?;
    Ok(Json(serde_json::to_value(messages).map_err(|e| ApiError::validation(e.to_string()))?))
}

#[derive(Deserialize)]
struct PostMessageRequest {
    from: String,
    text: String,
    #[serde(default)]
    metadata: Value,
}

async fn post_chat_message(ctx: Authed, Path(id): Path<String>, Json(body): Json<PostMessageRequest>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::PostMail)?;
    validators::bounded_string("text", &body.text, 1, 50_000)?;
    let message = ctx.state.store.append_message(&id, &body.from, &body.text, body.metadata).await?;
    ctx.state
        .topics
        .publish(&format!("chat:{id}"), json!({ "type": "new_message", "message": message, "handle": body.from }))
        .await;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
struct MarkReadRequest {
    uid: String,
}

async fn mark_chat_read(ctx: Authed, Path(id): Path<String>, Json(body): Json<MarkReadRequest>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::PostMail)?;
    validators::uid(&body.uid)?;
    ctx.state.store.mark_chat_read(&id, &body.uid).await?;
    Ok(Json(json!({ "success": true })))
}

// ---- Team broadcast ----

#[derive(Deserialize)]
struct BroadcastRequest {
    from: String,
    text: String,
    #[serde(default)]
    metadata: Value,
}

async fn team_broadcast(ctx: Authed, Path(team): Path<String>, Json(body): Json<BroadcastRequest>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_team(&team)?;
    ctx.ctx.require_permission(Permission::Broadcast)?;
    validators::identifier("teamName", &team)?;
    validators::bounded_string("text", &body.text, 1, 50_000)?;
    ctx.state
        .topics
        .publish(&team_topic(&team), json!({ "type": "broadcast", "message": { "text": body.text, "metadata": body.metadata }, "handle": body.from }))
        .await;
    Ok(Json(json!({ "success": true })))
}

// ---- Tasks (work items) ----

#[derive(Deserialize)]
struct CreateTaskRequest {
    title: String,
    description: Option<String>,
    created_by_handle: String,
    team_name: String,
    #[serde(default = "default_priority")]
    priority: u8,
    #[serde(default)]
    metadata: Value,
}

fn default_priority() -> u8 {
    3
}

async fn create_task(ctx: Authed, Json(body): Json<CreateTaskRequest>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_team(&body.team_name)?;
    ctx.ctx.require_permission(Permission::CreateTask)?;
    validators::bounded_string("title", &body.title, 3, 200)?;
    validators::priority(body.priority)?;
    let priority = Priority::new(body.priority).ok_or_else(|| ApiError::validation("priority out of bounds"))?;
    let mut metadata = body.metadata;
    metadata["teamName"] = json!(body.team_name);
    let item = WorkItem::new(body.title, body.description, body.created_by_handle, priority, None, metadata);
    ctx.state.store.create_work_item(&item).await?;
    Ok(Json(serde_json::to_value(item).map_err(|e| ApiError::validation(e.to_string()))?))
}

async fn get_team_tasks(State(state): State<Arc<AppState>>, Path(team): Path<String>) -> Result<Json<Value>, ApiError> {
    let items = state.store.list_by_team(&team).await?;
    Ok(Json(serde_json::to_value(items).map_err(|e| ApiError::validation(e.to_string()))?))
}

#[derive(Deserialize)]
struct PatchTaskRequest {
    status: String,
}

async fn patch_task(ctx: Authed, Path(id): Path<Uuid>, Json(body): Json<PatchTaskRequest>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::UpdateTask)?;
    let existing = ctx.state.store.get_work_item(id).await?.ok_or_else(|| ApiError::validation("task not found"))?;
    if let Some(team) = existing.metadata.get("teamName").and_then(|v| v.as_str()) {
        ctx.ctx.require_team(team)?;
    }
    let status = WorkItemStatus::from_str(&body.status).ok_or_else(|| ApiError::validation("unknown status"))?;
    ctx.state.store.update_status(id, status).await?;
    let item = ctx.state.store.get_work_item(id).await?.ok_or_else(|| ApiError::validation("task not found"))?;
    if let Some(team) = item.metadata.get("teamName").and_then(|v| v.as_str()) {
        ctx.state
            .topics
            .publish(&team_topic(team), json!({ "type": "task_assigned", "task": item, "handle": item.assigned_to }))
            .await;
    }
    Ok(Json(json!({ "success": true })))
}

// ---- Worker orchestration ----

#[derive(Deserialize)]
struct SpawnWorkerRequest {
    handle: String,
    team_name: String,
    role: String,
    working_dir: String,
    #[serde(default)]
    depth_level: u32,
    #[serde(default)]
    swarm_id: Option<Uuid>,
}

async fn spawn_worker(ctx: Authed, Json(body): Json<SpawnWorkerRequest>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_team(&body.team_name)?;
    ctx.ctx.require_permission(Permission::SpawnWorker)?;
    validators::identifier("handle", &body.handle)?;
    let worker = ctx
        .state
        .supervisor
        .spawn_worker(body.handle, body.team_name, body.role, body.working_dir, body.depth_level, body.swarm_id, &ctx.state.fleet_url, None)
        .await?;
    Ok(Json(serde_json::to_value(worker).map_err(|e| ApiError::validation(e.to_string()))?))
}

async fn dismiss_worker(ctx: Authed, Path(handle): Path<String>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::DismissWorker)?;
    ctx.state.supervisor.dismiss_worker(&ctx.ctx.team_name, &handle).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
struct MessageWorkerRequest {
    message: String,
}

async fn message_worker(ctx: Authed, Path(handle): Path<String>, Json(body): Json<MessageWorkerRequest>) -> Result<Json<Value>, ApiError> {
    ctx.state.supervisor.send_message(&ctx.ctx.team_name, &handle, &body.message).await?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
struct OutputQuery {
    lines: Option<usize>,
}

async fn worker_output(ctx: Authed, Path(handle): Path<String>, Query(query): Query<OutputQuery>) -> Result<Json<Value>, ApiError> {
    let lines = ctx.state.supervisor.capture_output(&ctx.ctx.team_name, &handle, query.lines).await;
    Ok(Json(json!({ "handle": handle, "lines": lines })))
}

#[derive(Deserialize)]
struct ListWorkersQuery {
    team_name: Option<String>,
}

async fn list_workers(State(state): State<Arc<AppState>>, Query(query): Query<ListWorkersQuery>) -> Result<Json<Value>, ApiError> {
    let workers = state.store.list_workers(query.team_name.as_deref()).await?;
    Ok(Json(serde_json::to_value(workers).map_err(|e| ApiError::validation(e.to_string()))?))
}

// ---- Blackboard ----

#[derive(Deserialize)]
struct PostBlackboardRequest {
    swarm_id: String,
    sender_handle: String,
    message_type: String,
    #[serde(default = "default_blackboard_priority")]
    priority: String,
    payload: Value,
    target_handle: Option<String>,
}

fn default_blackboard_priority() -> String {
    "normal".to_string()
}

async fn post_blackboard(ctx: Authed, Json(body): Json<PostBlackboardRequest>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::PostBlackboard)?;
    let message_type = MessageType::from_str(&body.message_type).ok_or_else(|| ApiError::validation("unknown messageType"))?;
    let priority = MessagePriority::from_str(&body.priority).ok_or_else(|| ApiError::validation("unknown priority"))?;
    let message = BlackboardMessage {
        id: Uuid::new_v4(),
        swarm_id: body.swarm_id.clone(),
        sender_handle: body.sender_handle,
        message_type,
        priority,
        payload: body.payload,
        target_handle: body.target_handle.clone(),
        created_at: chrono::Utc::now(),
        expires_at: None,
        archived_at: None,
    };
    ctx.state.blackboard.post(message.clone()).await?;

    // Broadcast targeting: a set targetHandle narrows fan-out to that
    // handle's topic; otherwise every swarm subscriber sees it (spec §4.D).
    let topic = match &body.target_handle {
        Some(handle) => worker_topic(&body.swarm_id, handle),
        None => swarm_topic(&body.swarm_id),
    };
    ctx.state.topics.publish(&topic, json!({ "type": "broadcast", "message": message })).await;
    Ok(Json(json!({ "success": true, "id": message.id })))
}

#[derive(Deserialize)]
struct BlackboardQuery {
    swarm_id: String,
    message_type: Option<String>,
    unread_only: Option<bool>,
    reader_handle: Option<String>,
    priority: Option<String>,
    limit: Option<u32>,
}

async fn read_blackboard(State(state): State<Arc<AppState>>, Query(query): Query<BlackboardQuery>) -> Result<Json<Value>, ApiError> {
    let filter = BlackboardFilter {
        message_type: query.message_type.as_deref().and_then(MessageType::from_str),
        min_priority: query.priority.as_deref().and_then(MessagePriority::from_str),
        unread_only: query.unread_only.unwrap_or(false),
        reader_handle: query.reader_handle,
        limit: query.limit.unwrap_or(50),
    };
    let messages = state.blackboard.read(&query.swarm_id, &filter).await?;
    Ok(Json(serde_json::to_value(messages).map_err(|e| ApiError::validation(e.to_string()))?))
}

#[derive(Deserialize)]
struct BlackboardIdsRequest {
    ids: Vec<Uuid>,
    #[serde(default)]
    reader: String,
}

async fn blackboard_mark_read(ctx: Authed, Json(body): Json<BlackboardIdsRequest>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::PostBlackboard)?;
    ctx.state.blackboard.mark_read(&body.ids, &body.reader).await?;
    Ok(Json(json!({ "success": true })))
}

async fn blackboard_archive(ctx: Authed, Json(body): Json<BlackboardIdsRequest>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::PostBlackboard)?;
    let archived = ctx.state.blackboard.archive(&body.ids).await?;
    Ok(Json(json!({ "archived": archived })))
}

#[derive(Deserialize)]
struct ArchiveOldRequest {
    swarm_id: String,
    age_ms: i64,
}

async fn blackboard_archive_old(ctx: Authed, Json(body): Json<ArchiveOldRequest>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::PostBlackboard)?;
    let archived = ctx.state.blackboard.archive_older_than(&body.swarm_id, body.age_ms).await?;
    Ok(Json(json!({ "archived": archived })))
}

// ---- Spawn queue ----

#[derive(Deserialize)]
struct EnqueueSpawnRequest {
    requester_handle: String,
    target_agent_type: String,
    depth_level: u32,
    swarm_id: Option<Uuid>,
    #[serde(default = "default_queue_priority")]
    priority: String,
    #[serde(default)]
    depends_on: Vec<Uuid>,
    #[serde(default)]
    payload: Value,
}

fn default_queue_priority() -> String {
    "normal".to_string()
}

async fn enqueue_spawn(ctx: Authed, Json(body): Json<EnqueueSpawnRequest>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::SpawnWorker)?;
    let priority = match body.priority.as_str() {
        "low" => QueuePriority::Low,
        "normal" => QueuePriority::Normal,
        "high" => QueuePriority::High,
        "critical" => QueuePriority::Critical,
        _ => return Err(ApiError::validation("unknown priority")),
    };
    let item = SpawnQueueItem {
        id: Uuid::new_v4(),
        requester_handle: body.requester_handle,
        target_agent_type: body.target_agent_type,
        depth_level: body.depth_level,
        swarm_id: body.swarm_id,
        priority,
        depends_on: body.depends_on,
        payload: body.payload,
        status: SpawnStatus::Pending,
        created_at: chrono::Utc::now(),
        spawned_at: None,
        worker_id: None,
        rejection_reason: None,
    };
    ctx.state.store.enqueue_spawn(&item).await?;
    Ok(Json(serde_json::to_value(item).map_err(|e| ApiError::validation(e.to_string()))?))
}

#[derive(Deserialize)]
struct SpawnQueueQuery {
    limit: Option<u32>,
}

async fn list_spawn_queue(State(state): State<Arc<AppState>>, Query(query): Query<SpawnQueueQuery>) -> Result<Json<Value>, ApiError> {
    let items = state.store.get_ready_items(query.limit.unwrap_or(100)).await?;
    Ok(Json(serde_json::to_value(items).map_err(|e| ApiError::validation(e.to_string()))?))
}

async fn get_spawn_item(State(state): State<Arc<AppState>>, Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    let item = state.store.get_spawn_item(id).await?.ok_or_else(|| ApiError::validation("spawn item not found"))?;
    Ok(Json(serde_json::to_value(item).map_err(|e| ApiError::validation(e.to_string()))?))
}

async fn cancel_spawn_item(ctx: Authed, Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::SpawnWorker)?;
    ctx.state.store.update_spawn_status(id, SpawnStatus::Cancelled, None, None).await?;
    Ok(Json(json!({ "success": true })))
}

// ---- Checkpoints ----

#[derive(Deserialize)]
struct CreateCheckpointRequest {
    worker_handle: String,
    from_handle: String,
    to_handle: String,
    goal: String,
    now: String,
    test: Option<String>,
    done_this_session: Vec<DoneItem>,
    blockers: Vec<String>,
    questions: Vec<String>,
    next: Vec<String>,
}

async fn create_checkpoint(ctx: Authed, Json(body): Json<CreateCheckpointRequest>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::ManageCheckpoint)?;
    let checkpoint = Checkpoint {
        id: Uuid::new_v4(),
        worker_handle: body.worker_handle,
        from_handle: body.from_handle,
        to_handle: body.to_handle,
        goal: body.goal,
        now: body.now,
        test: body.test,
        done_this_session: body.done_this_session,
        blockers: body.blockers,
        questions: body.questions,
        next: body.next,
        status: CheckpointStatus::Pending,
        created_at: chrono::Utc::now(),
    };
    ctx.state.store.create_checkpoint(&checkpoint).await?;
    Ok(Json(serde_json::to_value(checkpoint).map_err(|e| ApiError::validation(e.to_string()))?))
}

#[derive(Deserialize)]
struct ListCheckpointsQuery {
    status: Option<String>,
    limit: Option<u32>,
}

async fn list_checkpoints(State(state): State<Arc<AppState>>, Query(query): Query<ListCheckpointsQuery>) -> Result<Json<Value>, ApiError> {
    let status = query.status.as_deref().and_then(CheckpointStatus::from_str);
    let checkpoints = state.store.list_checkpoints(status, query.limit.unwrap_or(50)).await?;
    Ok(Json(serde_json::to_value(checkpoints).map_err(|e| ApiError::validation(e.to_string()))?))
}

async fn latest_checkpoint(State(state): State<Arc<AppState>>, Path(handle): Path<String>) -> Result<Json<Value>, ApiError> {
    let checkpoint = state.store.latest_for_worker(&handle).await?;
    Ok(Json(serde_json::to_value(checkpoint).map_err(|e| ApiError::validation(e.to_string()))?))
}

async fn accept_checkpoint(ctx: Authed, Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::ManageCheckpoint)?;
    ctx.state.store.set_checkpoint_status(id, CheckpointStatus::Accepted).await?;
    Ok(Json(json!({ "success": true })))
}

async fn reject_checkpoint(ctx: Authed, Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::ManageCheckpoint)?;
    ctx.state.store.set_checkpoint_status(id, CheckpointStatus::Rejected).await?;
    Ok(Json(json!({ "success": true })))
}

// ---- Scheduler ----

async fn scheduler_status(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let schedules = state.scheduler.list_schedules(false).await?;
    Ok(Json(json!({ "scheduleCount": schedules.len() })))
}

async fn list_schedules(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let schedules = state.scheduler.list_schedules(false).await?;
    Ok(Json(serde_json::to_value(schedules).map_err(|e| ApiError::validation(e.to_string()))?))
}

#[derive(Deserialize)]
struct CreateScheduleRequest {
    name: String,
    cron_expr: String,
    task_template_ids: Vec<Uuid>,
    repository: Option<String>,
    #[serde(default)]
    retries: u32,
    #[serde(default)]
    retry_delay_ms: u64,
}

async fn create_schedule(ctx: Authed, Json(body): Json<CreateScheduleRequest>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::ManageSchedule)?;
    let schedule = Schedule {
        id: Uuid::new_v4(),
        name: body.name,
        cron_expr: body.cron_expr,
        task_template_ids: body.task_template_ids,
        repository: body.repository,
        enabled: true,
        last_run: None,
        next_run: None,
        retries: body.retries,
        retry_delay_ms: body.retry_delay_ms,
    };
    ctx.state.scheduler.create_schedule(&schedule).await?;
    Ok(Json(serde_json::to_value(schedule).map_err(|e| ApiError::validation(e.to_string()))?))
}

#[derive(Deserialize)]
struct UpdateScheduleRequest {
    name: String,
    cron_expr: String,
    task_template_ids: Vec<Uuid>,
    repository: Option<String>,
    enabled: bool,
    #[serde(default)]
    retries: u32,
    #[serde(default)]
    retry_delay_ms: u64,
}

async fn update_schedule(ctx: Authed, Path(id): Path<Uuid>, Json(body): Json<UpdateScheduleRequest>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::ManageSchedule)?;
    let existing = ctx.state.scheduler.list_schedules(false).await?.into_iter().find(|s| s.id == id).ok_or_else(|| ApiError::validation("schedule not found"))?;
    let schedule = Schedule {
        id,
        name: body.name,
        cron_expr: body.cron_expr,
        task_template_ids: body.task_template_ids,
        repository: body.repository,
        enabled: body.enabled,
        last_run: existing.last_run,
        next_run: existing.next_run,
        retries: body.retries,
        retry_delay_ms: body.retry_delay_ms,
    };
    ctx.state.scheduler.update_schedule(&schedule).await?;
    Ok(Json(serde_json::to_value(schedule).map_err(|e| ApiError::validation(e.to_string()))?))
}

async fn delete_schedule(ctx: Authed, Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::ManageSchedule)?;
    ctx.state.scheduler.delete_schedule(id).await?;
    Ok(Json(json!({ "success": true })))
}

async fn list_templates(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let templates = state.scheduler.list_templates().await?;
    Ok(Json(serde_json::to_value(templates).map_err(|e| ApiError::validation(e.to_string()))?))
}

#[derive(Deserialize)]
struct CreateTemplateRequest {
    name: String,
    description: String,
    category: String,
    role: String,
    prompt_template: String,
    estimated_minutes: Option<u32>,
    #[serde(default)]
    required_context: Vec<String>,
}

async fn create_template(ctx: Authed, Json(body): Json<CreateTemplateRequest>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::ManageSchedule)?;
    let template = Template {
        id: Uuid::new_v4(),
        name: body.name,
        description: body.description,
        category: body.category,
        role: body.role,
        prompt_template: body.prompt_template,
        estimated_minutes: body.estimated_minutes,
        required_context: body.required_context,
    };
    ctx.state.scheduler.create_template(&template).await?;
    Ok(Json(serde_json::to_value(template).map_err(|e| ApiError::validation(e.to_string()))?))
}

async fn update_template(ctx: Authed, Path(id): Path<Uuid>, Json(body): Json<CreateTemplateRequest>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::ManageSchedule)?;
    let template = Template {
        id,
        name: body.name,
        description: body.description,
        category: body.category,
        role: body.role,
        prompt_template: body.prompt_template,
        estimated_minutes: body.estimated_minutes,
        required_context: body.required_context,
    };
    ctx.state.scheduler.update_template(&template).await?;
    Ok(Json(serde_json::to_value(template).map_err(|e| ApiError::validation(e.to_string()))?))
}

async fn delete_template(ctx: Authed, Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::ManageSchedule)?;
    ctx.state.scheduler.delete_template(id).await?;
    Ok(Json(json!({ "success": true })))
}

async fn start_scheduler(ctx: Authed) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::ManageSchedule)?;
    ctx.state.scheduler.start();
    Ok(Json(json!({ "running": true })))
}

async fn stop_scheduler(ctx: Authed) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::ManageSchedule)?;
    ctx.state.scheduler.stop();
    Ok(Json(json!({ "running": false })))
}

// ---- Swarms ----

#[derive(Deserialize)]
struct CreateSwarmRequest {
    name: String,
    #[serde(default = "default_max_agents")]
    max_agents: u32,
}

fn default_max_agents() -> u32 {
    10
}

async fn create_swarm(ctx: Authed, Json(body): Json<CreateSwarmRequest>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::ManageSwarm)?;
    validators::identifier("name", &body.name)?;
    validators::max_agents(body.max_agents)?;
    let swarm = ctx.state.swarms.create(body.name, body.max_agents).await;
    Ok(Json(serde_json::to_value(swarm).map_err(|e| ApiError::validation(e.to_string()))?))
}

async fn list_swarms(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let swarms = state.swarms.list().await;
    Ok(Json(serde_json::to_value(swarms).map_err(|e| ApiError::validation(e.to_string()))?))
}

async fn delete_swarm(ctx: Authed, Path(id): Path<Uuid>) -> Result<Json<Value>, ApiError> {
    ctx.ctx.require_permission(Permission::ManageSwarm)?;
    let removed = ctx.state.swarms.remove(id).await;
    if !removed {
        return Err(ApiError::validation("swarm not found"));
    }
    Ok(Json(json!({ "success": true })))
}
