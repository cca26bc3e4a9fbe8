//! Blackboard message bus entities (spec §3, §4.D).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Request,
    Response,
    Status,
    Directive,
    Checkpoint,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::Status => "status",
            Self::Directive => "directive",
            Self::Checkpoint => "checkpoint",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "request" => Some(Self::Request),
            "response" => Some(Self::Response),
            "status" => Some(Self::Status),
            "directive" => Some(Self::Directive),
            "checkpoint" => Some(Self::Checkpoint),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessagePriority {
    Low,
    Normal,
    High,
    Critical,
}

impl MessagePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackboardMessage {
    pub id: Uuid,
    pub swarm_id: String,
    pub sender_handle: String,
    pub message_type: MessageType,
    pub priority: MessagePriority,
    pub payload: Value,
    pub target_handle: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub archived_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadMarker {
    pub message_id: Uuid,
    pub reader_handle: String,
    pub read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct BlackboardFilter {
    pub message_type: Option<MessageType>,
    pub min_priority: Option<MessagePriority>,
    pub unread_only: bool,
    pub reader_handle: Option<String>,
    pub limit: u32,
}
