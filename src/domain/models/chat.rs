//! Point-to-point chat entities (spec §6 "`/chats`, `/chats/:id/messages`").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub participants: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub chat_id: String,
    pub from_uid: String,
    pub text: String,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}
