//! Worker Supervisor (spec §4.B): owns live process handles, classifies
//! output, enforces restart caps, and runs heartbeat housekeeping.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use tokio::sync::{broadcast, mpsc, RwLock};

use crate::domain::errors::{StoreError, StoreResult};
use crate::domain::models::config::SupervisorConfig;
use crate::domain::models::{
    classify_line, extract_text_blocks, extract_tool_uses, AgentEvent, OutputLine, Worker, WorkerHealth, WorkerState,
};
use crate::domain::ports::store::Store;
use crate::domain::ports::{Notifier, NotificationSeverity, OutputEvent, ProcessHandle, ProcessTransport};

/// Events the supervisor emits as worker output is classified. The HTTP/WS
/// front (component G) subscribes and fans these out to topic subscribers
/// (spec §4.B "Output pipeline", §6 WebSocket server frames).
#[derive(Debug, Clone)]
pub enum SupervisorEvent {
    Ready { team_name: String, handle: String },
    Output { team_name: String, handle: String, text: String },
    Tool { team_name: String, handle: String, tool_name: String },
    Result { team_name: String, handle: String },
    Error { team_name: String, handle: String, message: String },
    Exit { team_name: String, handle: String },
}

pub struct WorkerSupervisor {
    store: Arc<dyn Store>,
    transport: Arc<dyn ProcessTransport>,
    notifier: Arc<dyn Notifier>,
    config: SupervisorConfig,
    handles: RwLock<HashMap<String, Arc<dyn ProcessHandle>>>,
    output: Arc<RwLock<HashMap<String, VecDeque<String>>>>,
    events: broadcast::Sender<SupervisorEvent>,
    fleet_url: RwLock<String>,
}

/// Key identifying a live worker's in-memory state: `teamName:handle`.
fn key(team_name: &str, handle: &str) -> String {
    format!("{team_name}:{handle}")
}

impl WorkerSupervisor {
    pub fn new(
        store: Arc<dyn Store>,
        transport: Arc<dyn ProcessTransport>,
        notifier: Arc<dyn Notifier>,
        config: SupervisorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            store,
            transport,
            notifier,
            config,
            handles: RwLock::new(HashMap::new()),
            output: Arc::new(RwLock::new(HashMap::new())),
            events,
            fleet_url: RwLock::new(String::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SupervisorEvent> {
        self.events.subscribe()
    }

    pub async fn spawn_worker(
        self: &Arc<Self>,
        handle: String,
        team_name: String,
        role: String,
        working_dir: String,
        depth_level: u32,
        swarm_id: Option<Uuid>,
        fleet_url: &str,
        parent_session_id: Option<String>,
    ) -> StoreResult<Worker> {
        if !self
            .config
            .allowed_working_dir_roots
            .iter()
            .any(|root| working_dir.starts_with(root.as_str()))
        {
            return Err(StoreError::Conflict(format!("working dir {working_dir} is not an allowed root")));
        }
        if self.store.count_live_workers(swarm_id).await? >= self.config.global_worker_cap {
            return Err(StoreError::Conflict("global worker cap reached".into()));
        }
        *self.fleet_url.write().await = fleet_url.to_string();

        let mut worker = Worker::new(handle.clone(), team_name.clone(), role, working_dir.clone(), depth_level, swarm_id, self.config.default_restart_cap);
        worker.state = WorkerState::Starting;
        self.store.insert_worker(&worker).await?;

        self.launch_process(&worker, fleet_url, parent_session_id).await?;
        Ok(worker)
    }

    async fn launch_process(self: &Arc<Self>, worker: &Worker, fleet_url: &str, parent_session_id: Option<String>) -> StoreResult<()> {
        let env = vec![
            ("TEAM_NAME".to_string(), worker.team_name.clone()),
            ("AGENT_ID".to_string(), format!("{}{}", worker.team_name, worker.handle)),
            ("AGENT_TYPE".to_string(), worker.role.clone()),
            ("AGENT_NAME".to_string(), worker.handle.clone()),
            ("AGENT_COLOR".to_string(), agent_color(&worker.handle)),
            ("FLEET_URL".to_string(), fleet_url.to_string()),
            ("PARENT_SESSION_ID".to_string(), parent_session_id.unwrap_or_default()),
        ];

        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let process_handle: Arc<dyn ProcessHandle> =
            Arc::from(self.transport.spawn(&worker.handle, &worker.working_dir, &env, output_tx).await?);

        self.handles.write().await.insert(key(&worker.team_name, &worker.handle), process_handle);
        self.output
            .write()
            .await
            .insert(key(&worker.team_name, &worker.handle), VecDeque::with_capacity(self.config.ring_buffer_capacity));

        self.spawn_output_pump(worker.id, worker.team_name.clone(), worker.handle.clone(), output_rx, fleet_url.to_string());
        Ok(())
    }

    fn spawn_output_pump(self: &Arc<Self>, worker_id: Uuid, team_name: String, handle: String, mut output_rx: mpsc::UnboundedReceiver<OutputEvent>, fleet_url: String) {
        let store = self.store.clone();
        let notifier = self.notifier.clone();
        let output = self.output.clone();
        let ring_capacity = self.config.ring_buffer_capacity;
        let events = self.events.clone();
        let supervisor = self.clone();
        tokio::spawn(async move {
            while let Some(event) = output_rx.recv().await {
                push_ring_line(&output, &key(&team_name, &handle), event.line.clone(), ring_capacity).await;
                if let Ok(Some(mut worker)) = store.get_worker_by_id(worker_id).await {
                    worker.last_heartbeat = chrono::Utc::now();
                    handle_classified_line(&store, &notifier, &events, &team_name, &handle, &mut worker, &event.line).await;
                }
            }
            // Output channel closed: the child's stdout/stderr readers have
            // finished, meaning the process exited.
            events.send(SupervisorEvent::Exit { team_name: team_name.clone(), handle: handle.clone() }).ok();
            if let Ok(Some(worker)) = store.get_worker_by_id(worker_id).await {
                supervisor.handle_unexpected_exit(worker, &fleet_url).await;
            }
        });
    }

    /// Append one classified output line to the worker's ring buffer,
    /// dropping the oldest entry once `ring_buffer_capacity` is reached.
    pub async fn record_output_line(&self, team_name: &str, handle: &str, line: String) {
        push_ring_line(&self.output, &key(team_name, handle), line, self.config.ring_buffer_capacity).await;
    }

    /// Returns the last `n` lines from the ring buffer (spec §4.B
    /// `captureOutput`); `n` defaults to the full buffer when `None`.
    pub async fn capture_output(&self, team_name: &str, handle: &str, n: Option<usize>) -> Vec<String> {
        let output = self.output.read().await;
        let Some(buffer) = output.get(&key(team_name, handle)) else {
            return Vec::new();
        };
        match n {
            Some(n) if n < buffer.len() => buffer.iter().skip(buffer.len() - n).cloned().collect(),
            _ => buffer.iter().cloned().collect(),
        }
    }

    pub async fn get_output(&self, team_name: &str, handle: &str) -> Vec<String> {
        self.capture_output(team_name, handle, None).await
    }

    pub async fn send_message(&self, team_name: &str, handle: &str, message: &str) -> StoreResult<()> {
        let process = self.require_process(team_name, handle).await?;
        process.write_stdin(message).await?;
        if let Some(mut worker) = self.store.get_worker(handle, team_name).await? {
            worker.last_heartbeat = chrono::Utc::now();
            if worker.state == WorkerState::Ready {
                worker.state = WorkerState::Working;
            }
            self.store.update_worker(&worker).await?;
        }
        Ok(())
    }

    /// `sendToWorker` wrapped with a fixed markdown template (spec §4.B
    /// `deliverTask`).
    pub async fn deliver_task(&self, team_name: &str, handle: &str, task_id: Uuid, title: &str, description: Option<&str>) -> StoreResult<()> {
        let message = format!(
            "# Task: {title}\n\nTask ID: {task_id}\n\n{}",
            description.unwrap_or("(no description provided)")
        );
        self.send_message(team_name, handle, &message).await?;
        if let Some(mut worker) = self.store.get_worker(handle, team_name).await? {
            worker.current_task_id = Some(task_id);
            self.store.update_worker(&worker).await?;
        }
        Ok(())
    }

    /// Sends an interrupt control sequence without terminating the process
    /// (spec §4.B `interruptWorker`).
    pub async fn interrupt_worker(&self, team_name: &str, handle: &str) -> StoreResult<()> {
        let process = self.require_process(team_name, handle).await?;
        process.send_interrupt().await
    }

    pub async fn dismiss_worker(&self, team_name: &str, handle: &str) -> StoreResult<()> {
        let Some(mut worker) = self.store.get_worker(handle, team_name).await? else {
            return Err(StoreError::NotFound(format!("worker {handle}")));
        };
        worker.state = WorkerState::Stopping;
        self.store.update_worker(&worker).await?;

        let process = self.handles.read().await.get(&key(team_name, handle)).cloned();
        if let Some(process) = process {
            process.terminate().await?;
            tokio::time::sleep(Duration::from_millis(self.config.dismiss_grace_period_ms)).await;
            if !process.has_exited() {
                process.kill().await?;
            }
        }

        worker.state = WorkerState::Stopped;
        worker.dismissed_at = Some(chrono::Utc::now());
        self.store.update_worker(&worker).await?;
        self.handles.write().await.remove(&key(team_name, handle));
        Ok(())
    }

    /// Returns `true` once the worker's recent output has been stable (no
    /// new lines) for `stable_ms` within `timeout` (spec §4.B
    /// `waitForIdle`).
    pub async fn wait_for_idle(&self, team_name: &str, handle: &str, timeout: Duration, stable_ms: u64) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut last_len = self.capture_output(team_name, handle, None).await.len();
        let mut stable_since = tokio::time::Instant::now();
        loop {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100.min(stable_ms))).await;
            let current_len = self.capture_output(team_name, handle, None).await.len();
            if current_len != last_len {
                last_len = current_len;
                stable_since = tokio::time::Instant::now();
                continue;
            }
            if stable_since.elapsed().as_millis() as u64 >= stable_ms {
                return true;
            }
        }
    }

    /// Classify health for every live worker (spec §4.B "Heartbeat &
    /// health"). Restarts on exhausted health are handled by
    /// `handle_unexpected_exit` when the child process actually exits; this
    /// tick only updates the `health` discriminator and optionally
    /// interrupts workers stuck past a task timeout.
    pub async fn housekeeping_tick(&self) -> StoreResult<u32> {
        let now = chrono::Utc::now();
        let mut interrupted = 0;
        for mut worker in self.store.list_workers(None).await? {
            if matches!(worker.state, WorkerState::Stopped | WorkerState::Stopping) {
                continue;
            }
            let health = worker.health_for(now);
            if health != worker.health {
                worker.health = health;
                self.store.update_worker(&worker).await?;
            }
            if health == WorkerHealth::Unhealthy && worker.state == WorkerState::Working {
                if self.interrupt_worker(&worker.team_name, &worker.handle).await.is_ok() {
                    interrupted += 1;
                }
            }
        }
        Ok(interrupted)
    }

    pub async fn heartbeat(&self, team_name: &str, handle: &str) -> StoreResult<()> {
        let Some(mut worker) = self.store.get_worker(handle, team_name).await? else {
            return Err(StoreError::NotFound(format!("worker {handle}")));
        };
        worker.last_heartbeat = chrono::Utc::now();
        self.store.update_worker(&worker).await
    }

    async fn require_process(&self, team_name: &str, handle: &str) -> StoreResult<Arc<dyn ProcessHandle>> {
        self.handles
            .read()
            .await
            .get(&key(team_name, handle))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("no live process for {handle}")))
    }
}

/// Appends `line` to the ring buffer keyed by `teamName:handle`, dropping the
/// oldest entry once `capacity` is reached. Shared between the output pump
/// (which has no `&WorkerSupervisor`, only a cloned `Arc`) and
/// `record_output_line`.
async fn push_ring_line(output: &RwLock<HashMap<String, VecDeque<String>>>, key: &str, line: String, capacity: usize) {
    let mut output = output.write().await;
    let buffer = output.entry(key.to_string()).or_insert_with(|| VecDeque::with_capacity(capacity));
    if buffer.len() >= capacity {
        buffer.pop_front();
    }
    buffer.push_back(line);
}

#[allow(clippy::too_many_arguments)]
async fn handle_classified_line(
    store: &Arc<dyn Store>,
    notifier: &Arc<dyn Notifier>,
    events: &broadcast::Sender<SupervisorEvent>,
    team_name: &str,
    handle: &str,
    worker: &mut Worker,
    line: &str,
) {
    match classify_line(line) {
        OutputLine::Agent(AgentEvent::System { session_id, .. }) => {
            worker.state = WorkerState::Ready;
            worker.session_id = session_id;
            let _ = store.update_worker(worker).await;
            events.send(SupervisorEvent::Ready { team_name: team_name.to_string(), handle: handle.to_string() }).ok();
        }
        OutputLine::Agent(AgentEvent::Assistant { message }) => {
            if worker.state == WorkerState::Ready {
                worker.state = WorkerState::Working;
                let _ = store.update_worker(worker).await;
            } else {
                let _ = store.update_worker(worker).await;
            }
            for text in extract_text_blocks(&message) {
                events
                    .send(SupervisorEvent::Output { team_name: team_name.to_string(), handle: handle.to_string(), text })
                    .ok();
            }
            for tool in extract_tool_uses(&message) {
                events
                    .send(SupervisorEvent::Tool { team_name: team_name.to_string(), handle: handle.to_string(), tool_name: tool.name })
                    .ok();
            }
        }
        OutputLine::Agent(AgentEvent::Result { .. }) => {
            worker.state = WorkerState::Ready;
            // Open question (spec §9): the source leaves `currentTaskId` set
            // on completion; we keep that behavior rather than clearing it.
            let _ = store.update_worker(worker).await;
            events.send(SupervisorEvent::Result { team_name: team_name.to_string(), handle: handle.to_string() }).ok();
        }
        OutputLine::Agent(AgentEvent::Error { message }) => {
            // Supervisor is not the policy authority for errors: state does
            // not change (spec §4.B).
            let _ = store.update_worker(worker).await;
            events
                .send(SupervisorEvent::Error { team_name: team_name.to_string(), handle: handle.to_string(), message: message.clone() })
                .ok();
            notifier
                .notify("worker_error", handle, &message, NotificationSeverity::Error, serde_json::json!({ "teamName": team_name }))
                .await;
        }
        OutputLine::Raw(_) => {
            let _ = store.update_worker(worker).await;
        }
    }
}

fn agent_color(handle: &str) -> String {
    const COLORS: &[&str] = &["red", "green", "blue", "yellow", "magenta", "cyan"];
    let idx = handle.bytes().fold(0usize, |acc, b| acc.wrapping_add(b as usize)) % COLORS.len();
    COLORS[idx].to_string()
}

impl WorkerSupervisor {
    /// Restart policy on an unexpected exit (spec §4.B "Restart policy"): a
    /// worker under its restart cap is re-spawned with the same identity and
    /// handed its latest checkpoint's `formatForResume` prompt; one that has
    /// exhausted its cap is marked `Error` instead.
    async fn handle_unexpected_exit(self: &Arc<Self>, mut worker: Worker, fleet_url: &str) {
        if matches!(worker.state, WorkerState::Stopping | WorkerState::Stopped) {
            // Expected dismissal, not a crash.
            return;
        }
        if !matches!(worker.state, WorkerState::Ready | WorkerState::Working) {
            return;
        }
        if worker.can_restart() {
            worker.restart_count += 1;
            worker.state = WorkerState::Starting;
            let _ = self.store.update_worker(&worker).await;
            self.handles.write().await.remove(&key(&worker.team_name, &worker.handle));
            if let Err(err) = self.restart_from_checkpoint(&worker, fleet_url).await {
                tracing::warn!(handle = %worker.handle, error = %err, "failed to restart worker from checkpoint");
                worker.state = WorkerState::Error;
                let _ = self.store.update_worker(&worker).await;
            }
        } else {
            worker.state = WorkerState::Error;
            let _ = self.store.update_worker(&worker).await;
            self.notifier
                .notify("worker_restart_cap", &worker.handle, "restart cap exhausted", NotificationSeverity::Warning, serde_json::json!({}))
                .await;
        }
    }

    /// Re-spawn a worker after an unexpected exit, replaying its latest
    /// checkpoint's `formatForResume` output as the initial prompt (spec
    /// §4.B "Restart policy").
    pub async fn restart_from_checkpoint(self: &Arc<Self>, worker: &Worker, fleet_url: &str) -> StoreResult<()> {
        self.launch_process(worker, fleet_url, worker.session_id.clone()).await?;
        if let Some(checkpoint) = self.store.latest_for_worker(&worker.handle).await? {
            self.send_message(&worker.team_name, &worker.handle, &checkpoint.format_for_resume()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_color_is_deterministic() {
        assert_eq!(agent_color("alice"), agent_color("alice"));
    }
}
