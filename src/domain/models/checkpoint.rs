//! Checkpoint: a structured snapshot used to resume a worker after restart
//! (spec §3, glossary).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    Pending,
    Accepted,
    Rejected,
}

impl CheckpointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoneItem {
    pub task: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: Uuid,
    pub worker_handle: String,
    pub from_handle: String,
    pub to_handle: String,
    pub goal: String,
    pub now: String,
    pub test: Option<String>,
    pub done_this_session: Vec<DoneItem>,
    pub blockers: Vec<String>,
    pub questions: Vec<String>,
    pub next: Vec<String>,
    pub status: CheckpointStatus,
    pub created_at: DateTime<Utc>,
}

impl Checkpoint {
    /// Render the checkpoint as the initial prompt used to resume a worker
    /// after an unexpected restart (spec §4.B "Restart policy").
    pub fn format_for_resume(&self) -> String {
        let mut out = format!(
            "# Resuming from checkpoint\n\nGoal: {}\nCurrent state: {}\n",
            self.goal, self.now
        );
        if !self.done_this_session.is_empty() {
            out.push_str("\nCompleted this session:\n");
            for item in &self.done_this_session {
                out.push_str(&format!("- {} ({})\n", item.task, item.files.join(", ")));
            }
        }
        if !self.blockers.is_empty() {
            out.push_str("\nBlockers:\n");
            for b in &self.blockers {
                out.push_str(&format!("- {}\n", b));
            }
        }
        if !self.next.is_empty() {
            out.push_str("\nNext steps:\n");
            for n in &self.next {
                out.push_str(&format!("- {}\n", n));
            }
        }
        out
    }
}
