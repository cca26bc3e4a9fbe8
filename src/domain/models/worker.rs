//! Worker domain model (spec §3 "Worker", §4.B).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Pending,
    Starting,
    Ready,
    Working,
    Stopping,
    Stopped,
    Error,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Starting => "starting",
            Self::Ready => "ready",
            Self::Working => "working",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "starting" => Some(Self::Starting),
            "ready" => Some(Self::Ready),
            "working" => Some(Self::Working),
            "stopping" => Some(Self::Stopping),
            "stopped" => Some(Self::Stopped),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerHealth {
    Healthy,
    Degraded,
    Unhealthy,
}

impl WorkerHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }

    /// Classify health from the age of the last heartbeat (spec §4.B).
    pub fn from_heartbeat_age_ms(age_ms: i64) -> Self {
        if age_ms <= 30_000 {
            Self::Healthy
        } else if age_ms <= 60_000 {
            Self::Degraded
        } else {
            Self::Unhealthy
        }
    }
}

/// How the worker process is actually hosted. Callers never observe which
/// transport backs a worker; only this discriminator changes (spec §4.B
/// "Fallback mode").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnMode {
    Process,
    Multiplexer,
    InMemory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    pub id: Uuid,
    pub handle: String,
    pub team_name: String,
    pub state: WorkerState,
    pub health: WorkerHealth,
    pub pid: Option<i32>,
    pub session_id: Option<String>,
    pub role: String,
    pub swarm_id: Option<Uuid>,
    pub depth_level: u32,
    pub restart_count: u32,
    pub restart_cap: u32,
    pub current_task_id: Option<Uuid>,
    pub working_dir: String,
    pub spawn_mode: SpawnMode,
    pub spawned_at: DateTime<Utc>,
    pub dismissed_at: Option<DateTime<Utc>>,
    pub last_heartbeat: DateTime<Utc>,
}

impl Worker {
    pub fn new(
        handle: String,
        team_name: String,
        role: String,
        working_dir: String,
        depth_level: u32,
        swarm_id: Option<Uuid>,
        restart_cap: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            handle,
            team_name,
            state: WorkerState::Pending,
            health: WorkerHealth::Healthy,
            pid: None,
            session_id: None,
            role,
            swarm_id,
            depth_level,
            restart_count: 0,
            restart_cap,
            current_task_id: None,
            working_dir,
            spawn_mode: SpawnMode::Process,
            spawned_at: now,
            dismissed_at: None,
            last_heartbeat: now,
        }
    }

    pub fn health_for(&self, now: DateTime<Utc>) -> WorkerHealth {
        let age_ms = (now - self.last_heartbeat).num_milliseconds();
        WorkerHealth::from_heartbeat_age_ms(age_ms)
    }

    pub fn can_restart(&self) -> bool {
        self.restart_count < self.restart_cap
    }
}

/// Lines read from a worker's stdout are classified into agent events or raw
/// text (spec §4.B "Output pipeline").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum AgentEvent {
    #[serde(rename = "system")]
    System { subtype: String, session_id: Option<String> },
    #[serde(rename = "assistant")]
    Assistant { message: serde_json::Value },
    #[serde(rename = "result")]
    Result { message: Option<String> },
    #[serde(rename = "error")]
    Error { message: String },
}

/// A `tool_use` content block found inside an `assistant` event's
/// `message.content` array (spec §4.B "Agent Events").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolUse {
    pub name: String,
}

/// Pull every text content block out of an `assistant` event's message
/// (spec §4.B: "extracts text content blocks, emits one `worker:output` per
/// text block").
pub fn extract_text_blocks(message: &serde_json::Value) -> Vec<String> {
    message
        .get("content")
        .and_then(|c| c.as_array())
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()).map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Pull every `tool_use` content block out of an `assistant` event's message
/// (spec §4.B: "`tool_use` inside `assistant.message.content` → emits
/// `worker:tool` with tool name").
pub fn extract_tool_uses(message: &serde_json::Value) -> Vec<ToolUse> {
    message
        .get("content")
        .and_then(|c| c.as_array())
        .map(|blocks| {
            blocks
                .iter()
                .filter(|b| b.get("type").and_then(|t| t.as_str()) == Some("tool_use"))
                .filter_map(|b| b.get("name").and_then(|n| n.as_str()).map(|name| ToolUse { name: name.to_string() }))
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Debug, Clone)]
pub enum OutputLine {
    Agent(AgentEvent),
    Raw(String),
}

/// Classify one line of worker stdout. Lines that both start with `{` and
/// end with `}` are attempted as JSON; anything else (or a parse failure) is
/// raw text.
pub fn classify_line(line: &str) -> OutputLine {
    let trimmed = line.trim();
    if trimmed.starts_with('{') && trimmed.ends_with('}') {
        if let Ok(event) = serde_json::from_str::<AgentEvent>(trimmed) {
            return OutputLine::Agent(event);
        }
    }
    OutputLine::Raw(line.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_thresholds() {
        assert_eq!(WorkerHealth::from_heartbeat_age_ms(1_000), WorkerHealth::Healthy);
        assert_eq!(WorkerHealth::from_heartbeat_age_ms(45_000), WorkerHealth::Degraded);
        assert_eq!(WorkerHealth::from_heartbeat_age_ms(90_000), WorkerHealth::Unhealthy);
    }

    #[test]
    fn extracts_text_and_tool_use_blocks() {
        let message = serde_json::json!({
            "content": [
                {"type": "text", "text": "working on it"},
                {"type": "tool_use", "name": "bash", "input": {}},
                {"type": "text", "text": "done with step one"},
            ]
        });
        assert_eq!(extract_text_blocks(&message), vec!["working on it", "done with step one"]);
        assert_eq!(extract_tool_uses(&message), vec![ToolUse { name: "bash".into() }]);
    }

    #[test]
    fn classifies_json_and_raw_lines() {
        let json_line = r#"{"type":"system","subtype":"init","session_id":"abc"}"#;
        match classify_line(json_line) {
            OutputLine::Agent(AgentEvent::System { subtype, .. }) => assert_eq!(subtype, "init"),
            _ => panic!("expected agent event"),
        }
        match classify_line("plain log line") {
            OutputLine::Raw(s) => assert_eq!(s, "plain log line"),
            _ => panic!("expected raw"),
        }
        match classify_line("{not valid json}") {
            OutputLine::Raw(_) => {}
            _ => panic!("expected raw fallback on parse failure"),
        }
    }
}
