//! User / agent identity (spec §3 "User / Agent identity").

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// The kind of agent process a registered identity represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentType {
    TeamLead,
    Worker,
    Monitor,
    Notifier,
    Merger,
    Coordinator,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TeamLead => "team-lead",
            Self::Worker => "worker",
            Self::Monitor => "monitor",
            Self::Notifier => "notifier",
            Self::Merger => "merger",
            Self::Coordinator => "coordinator",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "team-lead" => Some(Self::TeamLead),
            "worker" => Some(Self::Worker),
            "monitor" => Some(Self::Monitor),
            "notifier" => Some(Self::Notifier),
            "merger" => Some(Self::Merger),
            "coordinator" => Some(Self::Coordinator),
            _ => None,
        }
    }

    /// Whether `self` is allowed to replace `previous` on re-registration.
    /// Agents may never escalate their type (spec §3 invariant).
    pub fn may_succeed(self, previous: AgentType) -> bool {
        self == previous
    }
}

/// A registered identity. `uid` is a deterministic digest of
/// `teamName + ":" + handle`, so the same (team, handle) pair always maps to
/// the same identity across reconnects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub handle: String,
    pub team_name: String,
    pub agent_type: AgentType,
    pub created_at: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Derive the deterministic 24-hex-char uid for a (team, handle) pair.
pub fn derive_uid(team_name: &str, handle: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(team_name.as_bytes());
    hasher.update(b":");
    hasher.update(handle.as_bytes());
    let digest = hasher.finalize();
    digest[..12].iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uid_is_deterministic_and_24_hex_chars() {
        let a = derive_uid("team1", "alice");
        let b = derive_uid("team1", "alice");
        assert_eq!(a, b);
        assert_eq!(a.len(), 24);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn uid_differs_by_team_or_handle() {
        assert_ne!(derive_uid("team1", "alice"), derive_uid("team2", "alice"));
        assert_ne!(derive_uid("team1", "alice"), derive_uid("team1", "bob"));
    }

    #[test]
    fn agent_type_cannot_escalate() {
        assert!(!AgentType::TeamLead.may_succeed(AgentType::Worker));
        assert!(AgentType::Worker.may_succeed(AgentType::Worker));
    }
}
