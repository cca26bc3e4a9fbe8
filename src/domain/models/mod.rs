pub mod blackboard;
pub mod chat;
pub mod checkpoint;
pub mod config;
pub mod credit;
pub mod identity;
pub mod mail;
pub mod schedule;
pub mod spawn_queue;
pub mod swarm;
pub mod work_item;
pub mod worker;

pub use blackboard::{BlackboardFilter, BlackboardMessage, MessagePriority, MessageType, ReadMarker};
pub use chat::{Chat, ChatMessage};
pub use checkpoint::{Checkpoint, CheckpointStatus, DoneItem};
pub use config::Config;
pub use credit::{CreditAccount, LeaderboardMetric, Transaction, TransactionType};
pub use identity::{derive_uid, AgentType, User};
pub use mail::{Handoff, Mail};
pub use schedule::{Schedule, Template};
pub use spawn_queue::{QueuePriority, SpawnQueueItem, SpawnStatus};
pub use swarm::Swarm;
pub use work_item::{Priority, WorkItem, WorkItemStatus};
pub use worker::{classify_line, extract_text_blocks, extract_tool_uses, AgentEvent, OutputLine, SpawnMode, ToolUse, Worker, WorkerHealth, WorkerState};
