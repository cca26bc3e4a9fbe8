//! Auto-Scheduler (spec §4.F): cron-driven task creation from templates,
//! with bounded concurrency and retry-with-backoff on dispatch failure.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use chrono::Utc;
use uuid::Uuid;

use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::models::schedule::render_prompt;
use crate::domain::models::{QueuePriority, Schedule, SpawnQueueItem, SpawnStatus, Template};
use crate::domain::ports::store::{ScheduleStore, SpawnQueueStore};
use crate::domain::ports::{NotificationSeverity, Notifier};

pub struct Scheduler {
    store: Arc<dyn ScheduleStore>,
    spawn_queue: Arc<dyn SpawnQueueStore>,
    notifier: Arc<dyn Notifier>,
    max_concurrent_tasks: u32,
    in_flight: AtomicU32,
    running: AtomicBool,
}

impl Scheduler {
    pub fn new(store: Arc<dyn ScheduleStore>, spawn_queue: Arc<dyn SpawnQueueStore>, notifier: Arc<dyn Notifier>, max_concurrent_tasks: u32) -> Self {
        Self { store, spawn_queue, notifier, max_concurrent_tasks, in_flight: AtomicU32::new(0), running: AtomicBool::new(true) }
    }

    /// Run-toggle for `POST /scheduler/start` / `/stop` (spec §6): `tick`
    /// becomes a no-op while stopped, without touching schedule rows.
    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn create_schedule(&self, schedule: &Schedule) -> StoreResult<()> {
        cron::Schedule::from_str(&schedule.cron_expr).map_err(|e| StoreError::Conflict(format!("invalid cron expression: {e}")))?;
        self.store.create_schedule(schedule).await
    }

    pub async fn list_schedules(&self, enabled_only: bool) -> StoreResult<Vec<Schedule>> {
        self.store.list_schedules(enabled_only).await
    }

    pub async fn set_enabled(&self, id: Uuid, enabled: bool) -> StoreResult<()> {
        self.store.set_schedule_enabled(id, enabled).await
    }

    pub async fn update_schedule(&self, schedule: &Schedule) -> StoreResult<()> {
        cron::Schedule::from_str(&schedule.cron_expr).map_err(|e| StoreError::Conflict(format!("invalid cron expression: {e}")))?;
        self.store.update_schedule(schedule).await
    }

    pub async fn delete_schedule(&self, id: Uuid) -> StoreResult<()> {
        self.store.delete_schedule(id).await
    }

    pub async fn create_template(&self, template: &Template) -> StoreResult<()> {
        self.store.create_template(template).await
    }

    pub async fn list_templates(&self) -> StoreResult<Vec<Template>> {
        self.store.list_templates().await
    }

    pub async fn update_template(&self, template: &Template) -> StoreResult<()> {
        self.store.update_template(template).await
    }

    pub async fn delete_template(&self, id: Uuid) -> StoreResult<()> {
        self.store.delete_template(id).await
    }

    /// One tick of the scheduler loop: finds every enabled schedule whose
    /// `nextRun` has elapsed, materializes its templates into work items
    /// up to `maxConcurrentTasks`, and advances `nextRun` from the cron
    /// expression (spec §4.F "Tick").
    pub async fn tick(&self, team_name: &str) -> StoreResult<u32> {
        if !self.is_running() {
            return Ok(0);
        }
        let now = Utc::now();
        let mut dispatched = 0;
        for schedule in self.store.list_schedules(true).await? {
            let due = match schedule.next_run {
                Some(next_run) => next_run <= now,
                None => true,
            };
            if !due {
                continue;
            }
            if self.in_flight.load(Ordering::SeqCst) >= self.max_concurrent_tasks {
                tracing::warn!(schedule = %schedule.name, "skipping tick: max concurrent tasks reached");
                continue;
            }

            let outcome = self.dispatch(&schedule, team_name).await;
            let cron_schedule = cron::Schedule::from_str(&schedule.cron_expr)
                .map_err(|e| StoreError::Conflict(format!("invalid cron expression: {e}")))?;
            let next_run = cron_schedule.after(&now).next();
            self.store.update_schedule_run(schedule.id, now, next_run).await?;

            match outcome {
                Ok(count) => {
                    dispatched += count;
                    self.notifier
                        .notify("schedule_tick", &schedule.name, "dispatched tasks", NotificationSeverity::Info, serde_json::json!({ "count": count }))
                        .await;
                }
                Err(e) => {
                    self.notifier
                        .notify("schedule_failed", &schedule.name, &e.to_string(), NotificationSeverity::Error, serde_json::json!({}))
                        .await;
                    self.retry_with_backoff(&schedule, team_name).await;
                }
            }
        }
        Ok(dispatched)
    }

    async fn dispatch(&self, schedule: &Schedule, team_name: &str) -> StoreResult<u32> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        let result = self.dispatch_inner(schedule, team_name).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    /// Enqueues each named template onto the spawn queue planner as a
    /// `normal`-priority spawn item, `targetAgentType` taken from the
    /// template's role (spec §4.F, §2 data flow).
    async fn dispatch_inner(&self, schedule: &Schedule, team_name: &str) -> StoreResult<u32> {
        let mut count = 0;
        for template_id in &schedule.task_template_ids {
            let Some(template) = self.store.get_template(*template_id).await? else {
                continue;
            };
            let mut context = HashMap::new();
            if let Some(repository) = &schedule.repository {
                context.insert("repository".to_string(), repository.clone());
            }
            let prompt = render_prompt(&template, &context).map_err(StoreError::Conflict)?;
            let item = SpawnQueueItem {
                id: Uuid::new_v4(),
                requester_handle: "scheduler".to_string(),
                target_agent_type: template.role.clone(),
                depth_level: 0,
                swarm_id: None,
                priority: QueuePriority::Normal,
                depends_on: Vec::new(),
                payload: serde_json::json!({ "scheduleId": schedule.id, "templateId": template.id, "teamName": team_name, "title": template.name, "prompt": prompt }),
                status: SpawnStatus::Pending,
                created_at: Utc::now(),
                spawned_at: None,
                worker_id: None,
                rejection_reason: None,
            };
            self.spawn_queue.enqueue_spawn(&item).await?;
            count += 1;
        }
        Ok(count)
    }

    /// Retry a failed tick up to `schedule.retries` times, waiting
    /// `retryDelayMs` between attempts (spec §4.F "Retry policy").
    async fn retry_with_backoff(&self, schedule: &Schedule, team_name: &str) {
        for attempt in 1..=schedule.retries {
            tokio::time::sleep(std::time::Duration::from_millis(schedule.retry_delay_ms)).await;
            if self.dispatch(schedule, team_name).await.is_ok() {
                return;
            }
            tracing::warn!(schedule = %schedule.name, attempt, "scheduler retry failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::tests::test_store;
    use crate::domain::ports::NullNotifier;

    fn daily_template() -> Template {
        Template {
            id: Uuid::new_v4(),
            name: "nightly-sync".into(),
            description: "sync repo".into(),
            category: "maintenance".into(),
            role: "worker".into(),
            prompt_template: "Sync {repository}".into(),
            estimated_minutes: Some(5),
            required_context: vec![],
        }
    }

    #[tokio::test]
    async fn tick_materializes_due_schedule_into_spawn_queue_items() {
        let store = Arc::new(test_store().await);
        let scheduler = Scheduler::new(store.clone(), store.clone(), Arc::new(NullNotifier), 10);
        let template = daily_template();
        scheduler.create_template(&template).await.unwrap();

        let schedule = Schedule {
            id: Uuid::new_v4(),
            name: "nightly".into(),
            cron_expr: "0 0 0 * * * *".into(),
            task_template_ids: vec![template.id],
            repository: Some("acme/widget".into()),
            enabled: true,
            last_run: None,
            next_run: None,
            retries: 0,
            retry_delay_ms: 0,
        };
        scheduler.create_schedule(&schedule).await.unwrap();

        let dispatched = scheduler.tick("acme-team").await.unwrap();
        assert_eq!(dispatched, 1);

        let items = store.get_ready_items(10).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].target_agent_type, "worker");
        assert_eq!(items[0].payload["title"], "nightly-sync");
    }

    #[tokio::test]
    async fn tick_is_a_no_op_while_stopped() {
        let store = Arc::new(test_store().await);
        let scheduler = Scheduler::new(store.clone(), store.clone(), Arc::new(NullNotifier), 10);
        let template = daily_template();
        scheduler.create_template(&template).await.unwrap();
        let schedule = Schedule {
            id: Uuid::new_v4(),
            name: "nightly".into(),
            cron_expr: "0 0 0 * * * *".into(),
            task_template_ids: vec![template.id],
            repository: None,
            enabled: true,
            last_run: None,
            next_run: None,
            retries: 0,
            retry_delay_ms: 0,
        };
        scheduler.create_schedule(&schedule).await.unwrap();

        scheduler.stop();
        assert_eq!(scheduler.tick("acme-team").await.unwrap(), 0);
        scheduler.start();
        assert_eq!(scheduler.tick("acme-team").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn rejects_invalid_cron_expression() {
        let store = Arc::new(test_store().await);
        let scheduler = Scheduler::new(store.clone(), store.clone(), Arc::new(NullNotifier), 10);
        let schedule = Schedule {
            id: Uuid::new_v4(),
            name: "broken".into(),
            cron_expr: "not a cron expr".into(),
            task_template_ids: vec![],
            repository: None,
            enabled: true,
            last_run: None,
            next_run: None,
            retries: 0,
            retry_delay_ms: 0,
        };
        assert!(scheduler.create_schedule(&schedule).await.is_err());
    }
}
