//! Store sub-interfaces (spec §4.A). Each sub-interface is a port the
//! `adapters::sqlite` module implements against a transactional SQL store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::errors::StoreResult;
use crate::domain::models::*;

#[async_trait]
pub trait TeamStore: Send + Sync {
    async fn upsert_user(&self, team_name: &str, handle: &str, agent_type: AgentType) -> StoreResult<User>;
    async fn get_user(&self, uid: &str) -> StoreResult<Option<User>>;
    async fn get_users_by_team(&self, team_name: &str) -> StoreResult<Vec<User>>;
    async fn touch_last_seen(&self, uid: &str) -> StoreResult<()>;
}

#[async_trait]
pub trait WorkerStore: Send + Sync {
    async fn insert_worker(&self, worker: &Worker) -> StoreResult<()>;
    async fn get_worker(&self, handle: &str, team_name: &str) -> StoreResult<Option<Worker>>;
    async fn get_worker_by_id(&self, id: Uuid) -> StoreResult<Option<Worker>>;
    /// Looks up a worker by handle alone, irrespective of team (the spawn
    /// queue planner only has the requester's handle to go on).
    async fn get_worker_by_handle(&self, handle: &str) -> StoreResult<Option<Worker>>;
    async fn update_worker(&self, worker: &Worker) -> StoreResult<()>;
    async fn list_workers(&self, team_name: Option<&str>) -> StoreResult<Vec<Worker>>;
    async fn count_live_workers(&self, swarm_id: Option<Uuid>) -> StoreResult<u32>;
}

/// Atomic compare-and-swap assignment and batch dispatch for work items.
#[async_trait]
pub trait WorkItemStore: Send + Sync {
    async fn create_work_item(&self, item: &WorkItem) -> StoreResult<()>;
    async fn get_work_item(&self, id: Uuid) -> StoreResult<Option<WorkItem>>;
    async fn list_by_team(&self, team_name: &str) -> StoreResult<Vec<WorkItem>>;
    async fn update_status(&self, id: Uuid, status: WorkItemStatus) -> StoreResult<()>;
    async fn add_dependency(&self, id: Uuid, depends_on: Uuid) -> StoreResult<()>;
    async fn blocker_statuses(&self, id: Uuid) -> StoreResult<Vec<WorkItemStatus>>;

    /// Atomically sets `assignedTo` and flips `status` pending -> in_progress.
    /// Returns `false` if the item is already assigned (CAS semantics,
    /// spec §8 scenario S2).
    async fn assign_work_item(&self, id: Uuid, handle: &str) -> StoreResult<bool>;

    /// Assigns every pending member of `convoy_id` to `handle` in one
    /// transaction, returning the count assigned (spec §4.A `dispatchBatch`).
    async fn dispatch_batch(&self, convoy_id: Uuid, handle: &str) -> StoreResult<u32>;
}

#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn insert_chat(&self, participants: &[String]) -> StoreResult<Chat>;
    async fn get_chat(&self, id: &str) -> StoreResult<Option<Chat>>;
    async fn get_chats_by_user(&self, uid: &str) -> StoreResult<Vec<Chat>>;

    /// Atomic under `(chatId, timestamp)`; increments every other
    /// participant's unread counter for this chat in the same transaction
    /// (spec §4.A `appendMessage`).
    async fn append_message(&self, chat_id: &str, from_uid: &str, text: &str, metadata: Value) -> StoreResult<ChatMessage>;
    async fn get_messages(&self, chat_id: &str, limit: u32, after: Option<i64>) -> StoreResult<Vec<ChatMessage>>;
    async fn mark_chat_read(&self, chat_id: &str, uid: &str) -> StoreResult<()>;
    async fn get_chat_unread_count(&self, chat_id: &str, uid: &str) -> StoreResult<u32>;
}

#[async_trait]
pub trait MailStore: Send + Sync {
    async fn send_mail(&self, from_handle: &str, to_handle: &str, subject: Option<String>, body: String) -> StoreResult<Mail>;
    async fn mark_mail_read(&self, id: i64) -> StoreResult<()>;
    async fn mark_all_read(&self, to_handle: &str) -> StoreResult<u32>;
    async fn get_unread(&self, to_handle: &str) -> StoreResult<Vec<Mail>>;
    async fn get_unread_count(&self, to_handle: &str) -> StoreResult<u32>;

    async fn send_handoff(&self, from_handle: &str, to_handle: &str, context: Value) -> StoreResult<Handoff>;
    async fn accept_handoff(&self, id: i64) -> StoreResult<()>;
}

#[async_trait]
pub trait BlackboardStore: Send + Sync {
    async fn post(&self, message: &BlackboardMessage) -> StoreResult<()>;
    async fn read(&self, swarm_id: &str, filter: &BlackboardFilter) -> StoreResult<Vec<BlackboardMessage>>;
    async fn mark_read(&self, ids: &[Uuid], reader: &str) -> StoreResult<()>;
    async fn archive(&self, ids: &[Uuid]) -> StoreResult<u32>;
    async fn archive_older_than(&self, swarm_id: &str, age_ms: i64) -> StoreResult<u32>;
    async fn unread_count(&self, swarm_id: &str, reader: &str) -> StoreResult<u32>;
}

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn create_checkpoint(&self, checkpoint: &Checkpoint) -> StoreResult<()>;
    async fn latest_for_worker(&self, worker_handle: &str) -> StoreResult<Option<Checkpoint>>;
    async fn list_checkpoints(&self, status: Option<CheckpointStatus>, limit: u32) -> StoreResult<Vec<Checkpoint>>;
    async fn set_checkpoint_status(&self, id: Uuid, status: CheckpointStatus) -> StoreResult<()>;
}

#[async_trait]
pub trait SpawnQueueStore: Send + Sync {
    async fn enqueue_spawn(&self, item: &SpawnQueueItem) -> StoreResult<()>;
    async fn get_spawn_item(&self, id: Uuid) -> StoreResult<Option<SpawnQueueItem>>;
    /// Items ordered `(priority DESC, createdAt ASC)`, ties by id, capped at
    /// `limit` (spec §4.A index requirement, §4.C ordering key).
    async fn get_ready_items(&self, limit: u32) -> StoreResult<Vec<SpawnQueueItem>>;
    async fn update_spawn_status(
        &self,
        id: Uuid,
        status: SpawnStatus,
        worker_id: Option<Uuid>,
        rejection_reason: Option<String>,
    ) -> StoreResult<()>;
    async fn dependency_statuses(&self, ids: &[Uuid]) -> StoreResult<Vec<SpawnStatus>>;
}

#[async_trait]
pub trait CreditStore: Send + Sync {
    async fn get_or_create_account(&self, swarm_id: &str, agent_handle: &str) -> StoreResult<CreditAccount>;

    /// In one transaction: recompute balance (clamped at zero), write the
    /// transaction row, return the new account snapshot (spec §4.A
    /// `recordCreditTx`).
    async fn record_credit_tx(
        &self,
        swarm_id: &str,
        agent_handle: &str,
        tx_type: TransactionType,
        amount: i64,
        reference_type: Option<String>,
        reference_id: Option<String>,
        reason: Option<String>,
    ) -> StoreResult<CreditAccount>;

    /// Two `record_credit_tx` calls under one transaction; either both
    /// succeed or neither (spec §4.A `transfer`).
    async fn transfer(&self, swarm_id: &str, from: &str, to: &str, amount: i64) -> StoreResult<(CreditAccount, CreditAccount)>;

    async fn record_outcome(&self, swarm_id: &str, agent_handle: &str, outcome: bool, weight: f64) -> StoreResult<CreditAccount>;
    async fn decay_reputation(&self, rate: f64, inactivity_ms: i64) -> StoreResult<u32>;
    async fn leaderboard(&self, swarm_id: &str, metric: LeaderboardMetric, limit: u32) -> StoreResult<Vec<CreditAccount>>;
}

#[async_trait]
pub trait ScheduleStore: Send + Sync {
    async fn create_schedule(&self, schedule: &Schedule) -> StoreResult<()>;
    async fn list_schedules(&self, enabled_only: bool) -> StoreResult<Vec<Schedule>>;
    async fn update_schedule_run(&self, id: Uuid, last_run: DateTime<Utc>, next_run: Option<DateTime<Utc>>) -> StoreResult<()>;
    async fn set_schedule_enabled(&self, id: Uuid, enabled: bool) -> StoreResult<()>;
    /// Full-row replace, used by `PATCH /scheduler/schedules/:id` (spec §6
    /// "CRUD under `/scheduler/schedules`").
    async fn update_schedule(&self, schedule: &Schedule) -> StoreResult<()>;
    async fn delete_schedule(&self, id: Uuid) -> StoreResult<()>;

    async fn create_template(&self, template: &Template) -> StoreResult<()>;
    async fn get_template(&self, id: Uuid) -> StoreResult<Option<Template>>;
    async fn list_templates(&self) -> StoreResult<Vec<Template>>;
    async fn update_template(&self, template: &Template) -> StoreResult<()>;
    async fn delete_template(&self, id: Uuid) -> StoreResult<()>;
}

/// Cache of pre-computed, text-only summaries (SPEC_FULL.md, supplemented
/// feature). The summarization logic itself lives outside the core.
#[async_trait]
pub trait TldrCacheStore: Send + Sync {
    async fn get_tldr(&self, team_name: &str, kind: &str) -> StoreResult<Option<(String, DateTime<Utc>)>>;
    async fn put_tldr(&self, team_name: &str, kind: &str, summary: &str) -> StoreResult<()>;
    async fn invalidate_tldr(&self, team_name: &str, kind: &str) -> StoreResult<()>;
}

/// Per-swarm, per-agent belief key-value store (spec §4.A `upsertBelief`).
#[async_trait]
pub trait BeliefStore: Send + Sync {
    async fn upsert_belief(&self, swarm_id: &str, agent_handle: &str, subject: &str, value: Value) -> StoreResult<()>;
    async fn get_belief(&self, swarm_id: &str, agent_handle: &str, subject: &str) -> StoreResult<Option<Value>>;
}

/// The full Store contract (spec §4.A): every sub-interface composed.
/// `adapters::sqlite::SqliteStore` is the only production implementation.
pub trait Store:
    TeamStore
    + ChatStore
    + WorkerStore
    + WorkItemStore
    + MailStore
    + BlackboardStore
    + CheckpointStore
    + SpawnQueueStore
    + CreditStore
    + ScheduleStore
    + TldrCacheStore
    + BeliefStore
{
}

impl<T> Store for T where
    T: TeamStore
        + ChatStore
        + WorkerStore
        + WorkItemStore
        + MailStore
        + BlackboardStore
        + CheckpointStore
        + SpawnQueueStore
        + CreditStore
        + ScheduleStore
        + TldrCacheStore
        + BeliefStore
{
}
