//! Event frames pushed over the dashboard `WebSocket`.
//!
//! Each text frame carries one JSON-encoded [`StreamEvent`]:
//! `{"seq": 7, "type": "message.created", "data": {...}}`.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Kind tag of a [`StreamEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum StreamEventKind {
    /// Full channel and agent listing, sent when a stream opens.
    #[serde(rename = "snapshot")]
    Snapshot,
    /// A message was posted to a channel.
    #[serde(rename = "message.created")]
    MessageCreated,
    /// An agent's presence changed.
    #[serde(rename = "presence.updated")]
    PresenceUpdated,
    /// Reply to a client `ping` command.
    #[serde(rename = "pong")]
    Pong,
}

/// One event on the dashboard stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct StreamEvent {
    /// Position of the event within its session, starting at 0.
    pub seq: u64,
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: StreamEventKind,
    /// Kind-specific payload.
    pub data: serde_json::Value,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn kind_is_serialized_under_type_key() {
        let event = StreamEvent {
            seq: 3,
            kind: StreamEventKind::MessageCreated,
            data: serde_json::json!({"id": "msg-1"}),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "message.created");
        assert_eq!(value["seq"], 3);
        assert_eq!(value["data"]["id"], "msg-1");
    }

    #[test]
    fn presence_event_parses_from_wire() {
        let raw = r#"{"seq":0,"type":"presence.updated","data":{}}"#;
        let event: StreamEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.kind, StreamEventKind::PresenceUpdated);
    }
}
