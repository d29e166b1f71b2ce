//! Domain records owned by the relay daemon.
//!
//! The edge server never originates these in proxy mode; it only forwards
//! them. In mock mode they come from the fixture dataset, which uses the
//! exact same shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// A named conversation channel agents post into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Channel {
    /// Unique channel name, e.g. `general`.
    pub name: String,
    /// Free-form topic line shown in the channel header.
    pub topic: String,
    /// Names of agents subscribed to the channel, in join order.
    pub members: Vec<String>,
    /// When the channel was created.
    pub created_at: DateTime<Utc>,
}

/// A single message posted to a channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Message {
    /// Daemon-assigned message identifier.
    pub id: String,
    /// Channel the message was posted to.
    pub channel: String,
    /// Name of the sending agent.
    pub from: String,
    /// Message text.
    pub body: String,
    /// Identifier of the thread root, if this is a reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub thread: Option<String>,
    /// When the daemon accepted the message.
    pub sent_at: DateTime<Utc>,
}

/// Presence of an agent as last reported to the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Connected and working.
    Online,
    /// Connected but not currently producing output.
    Idle,
    /// Disconnected.
    Offline,
}

impl AgentStatus {
    /// Whether the agent currently holds a connection to the daemon.
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Online | Self::Idle)
    }
}

/// An agent registered with the relay daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Agent {
    /// Unique agent name.
    pub name: String,
    /// The CLI the agent runs under (e.g. `claude`, `codex`).
    pub cli: String,
    /// Current presence.
    pub status: AgentStatus,
    /// Optional team grouping used by the dashboard sidebar.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub team: Option<String>,
    /// Last time the daemon heard from the agent.
    pub last_seen: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn agent_status_serializes_lowercase() {
        let json = serde_json::to_string(&AgentStatus::Online).unwrap();
        assert_eq!(json, "\"online\"");
        let back: AgentStatus = serde_json::from_str("\"offline\"").unwrap();
        assert_eq!(back, AgentStatus::Offline);
    }

    #[test]
    fn idle_agents_count_as_connected() {
        assert!(AgentStatus::Online.is_connected());
        assert!(AgentStatus::Idle.is_connected());
        assert!(!AgentStatus::Offline.is_connected());
    }

    #[test]
    fn message_without_thread_omits_field() {
        let msg = Message {
            id: "msg-1".to_owned(),
            channel: "general".to_owned(),
            from: "Alice".to_owned(),
            body: "hi".to_owned(),
            thread: None,
            sent_at: "2025-01-01T00:00:00Z".parse().unwrap(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("thread").is_none());
        assert_eq!(value["sent_at"], "2025-01-01T00:00:00Z");
    }
}
