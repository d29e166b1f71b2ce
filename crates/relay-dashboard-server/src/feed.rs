//! Synthetic event stream for mock mode.
//!
//! A [`FeedScript`] is computed once from the fixtures: an opening
//! `snapshot`, then for every message in dataset order a
//! `message.created` event followed by a `presence.updated` event for its
//! sender. Each stream session walks the script with its own
//! [`SyntheticFeed`] cursor, so every session sees the same replayable
//! sequence regardless of when it connected.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use relay_dashboard_fixtures::FixtureStore;
use relay_dashboard_types::{AgentStatus, StreamEvent, StreamEventKind};
use serde::Deserialize;
use tracing::debug;

use crate::config::FeedRepeat;
use crate::session::CloseReason;
use crate::shutdown::ShutdownSignal;

/// One scripted event, before a sequence number is assigned.
#[derive(Debug, Clone, PartialEq)]
struct ScriptStep {
    kind: StreamEventKind,
    data: serde_json::Value,
}

/// The fixed, deterministic event script derived from the fixtures.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedScript {
    snapshot: serde_json::Value,
    steps: Vec<ScriptStep>,
}

impl FeedScript {
    /// Build the script from a fixture store.
    pub fn from_fixtures(store: &FixtureStore) -> Self {
        let snapshot = serde_json::json!({
            "channels": store.channels(),
            "agents": store.agents(),
        });

        let steps = store
            .messages()
            .iter()
            .flat_map(|message| {
                [
                    ScriptStep {
                        kind: StreamEventKind::MessageCreated,
                        data: serde_json::json!(message),
                    },
                    ScriptStep {
                        kind: StreamEventKind::PresenceUpdated,
                        data: serde_json::json!({
                            "agent": message.from,
                            "status": AgentStatus::Online,
                            "last_seen": message.sent_at,
                        }),
                    },
                ]
            })
            .collect();

        Self { snapshot, steps }
    }

    /// Number of events in one pass, excluding the opening snapshot.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the script has no events beyond the snapshot.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Client command frame accepted in mock mode.
#[derive(Debug, Deserialize)]
struct ClientCommand {
    #[serde(rename = "type")]
    kind: String,
}

/// Per-session cursor over a [`FeedScript`].
///
/// Yields the snapshot first, then script events. Sequence numbers start
/// at 0 and increase by one per emitted event (including `pong` replies)
/// for the lifetime of the session, across loops.
#[derive(Debug, Clone)]
pub struct SyntheticFeed {
    script: Arc<FeedScript>,
    repeat: FeedRepeat,
    seq: u64,
    cursor: usize,
    snapshot_sent: bool,
}

impl SyntheticFeed {
    /// Start a feed at the beginning of `script`.
    pub const fn new(script: Arc<FeedScript>, repeat: FeedRepeat) -> Self {
        Self {
            script,
            repeat,
            seq: 0,
            cursor: 0,
            snapshot_sent: false,
        }
    }

    /// Reply to a client text frame, if it is a supported command.
    ///
    /// Only `{"type":"ping"}` is answered (with a `pong` event); anything
    /// else is ignored.
    pub fn reply_to(&mut self, text: &str) -> Option<StreamEvent> {
        match serde_json::from_str::<ClientCommand>(text) {
            Ok(command) if command.kind == "ping" => {
                Some(self.stamp(StreamEventKind::Pong, serde_json::json!({})))
            }
            Ok(command) => {
                debug!(command = command.kind, "ignoring unsupported client command");
                None
            }
            Err(e) => {
                debug!(error = %e, "ignoring unparseable client frame");
                None
            }
        }
    }

    fn stamp(&mut self, kind: StreamEventKind, data: serde_json::Value) -> StreamEvent {
        let seq = self.seq;
        self.seq = self.seq.saturating_add(1);
        StreamEvent { seq, kind, data }
    }
}

impl Iterator for SyntheticFeed {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        if !self.snapshot_sent {
            self.snapshot_sent = true;
            let snapshot = self.script.snapshot.clone();
            return Some(self.stamp(StreamEventKind::Snapshot, snapshot));
        }

        if self.cursor >= self.script.steps.len() {
            match self.repeat {
                FeedRepeat::Loop if !self.script.steps.is_empty() => self.cursor = 0,
                FeedRepeat::Loop | FeedRepeat::Once => return None,
            }
        }

        let step = self.script.steps.get(self.cursor)?.clone();
        self.cursor = self.cursor.saturating_add(1);
        Some(self.stamp(step.kind, step.data))
    }
}

/// Send one event as a JSON text frame.
async fn send_event(socket: &mut WebSocket, event: &StreamEvent) -> Result<(), String> {
    let json = serde_json::to_string(event).map_err(|e| e.to_string())?;
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| e.to_string())
}

/// Drive a synthetic feed over `socket` until the client leaves or the
/// server shuts down.
///
/// The first event (the snapshot) goes out immediately, then one event
/// per `interval`. The interval timer lives on this task's stack, so it is
/// gone as soon as this function returns.
pub async fn start_synthetic_stream(
    socket: &mut WebSocket,
    mut feed: SyntheticFeed,
    interval: Duration,
    shutdown: &mut ShutdownSignal,
) -> CloseReason {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut exhausted = false;

    loop {
        tokio::select! {
            _ = ticker.tick(), if !exhausted => {
                match feed.next() {
                    Some(event) => {
                        if let Err(e) = send_event(socket, &event).await {
                            return CloseReason::ClientError(e);
                        }
                    }
                    None => {
                        debug!("synthetic feed finished its single pass");
                        exhausted = true;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => return CloseReason::ClientClosed,
                    Some(Err(e)) => return CloseReason::ClientError(e.to_string()),
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            return CloseReason::ClientClosed;
                        }
                    }
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = feed.reply_to(text.as_str())
                            && let Err(e) = send_event(socket, &reply).await
                        {
                            return CloseReason::ClientError(e);
                        }
                    }
                    Some(Ok(_)) => {
                        // Binary and pong frames do not affect the feed.
                    }
                }
            }
            () = shutdown.fired() => return CloseReason::Shutdown,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn script() -> Arc<FeedScript> {
        Arc::new(FeedScript::from_fixtures(&FixtureStore::embedded().unwrap()))
    }

    #[test]
    fn script_pairs_each_message_with_presence() {
        let script = script();
        assert_eq!(script.len(), 16);
        assert_eq!(script.steps[0].kind, StreamEventKind::MessageCreated);
        assert_eq!(script.steps[1].kind, StreamEventKind::PresenceUpdated);
        assert_eq!(script.steps[1].data["agent"], script.steps[0].data["from"]);
    }

    #[test]
    fn feed_opens_with_snapshot() {
        let mut feed = SyntheticFeed::new(script(), FeedRepeat::Loop);
        let first = feed.next().unwrap();
        assert_eq!(first.seq, 0);
        assert_eq!(first.kind, StreamEventKind::Snapshot);
        assert_eq!(first.data["channels"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn two_feeds_produce_identical_sequences() {
        let a: Vec<StreamEvent> = SyntheticFeed::new(script(), FeedRepeat::Loop).take(40).collect();
        let b: Vec<StreamEvent> = SyntheticFeed::new(script(), FeedRepeat::Loop).take(40).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn looping_feed_restarts_with_increasing_seq() {
        let script = script();
        let pass = script.len();
        let events: Vec<StreamEvent> = SyntheticFeed::new(Arc::clone(&script), FeedRepeat::Loop)
            .take(pass * 2 + 1)
            .collect();
        // snapshot + first pass, then the second pass repeats the payloads.
        assert_eq!(events[1].data, events[1 + pass].data);
        assert!(events.windows(2).all(|w| w[1].seq == w[0].seq + 1));
    }

    #[test]
    fn single_pass_feed_terminates() {
        let script = script();
        let count = SyntheticFeed::new(Arc::clone(&script), FeedRepeat::Once).count();
        assert_eq!(count, script.len() + 1);
    }

    #[test]
    fn ping_gets_pong_and_other_commands_are_ignored() {
        let mut feed = SyntheticFeed::new(script(), FeedRepeat::Loop);
        let _snapshot = feed.next();
        let pong = feed.reply_to(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(pong.kind, StreamEventKind::Pong);
        assert_eq!(pong.seq, 1);
        assert!(feed.reply_to(r#"{"type":"subscribe","channel":"general"}"#).is_none());
        assert!(feed.reply_to("not json").is_none());
    }
}
