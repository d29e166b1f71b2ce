//! Read-only store of fixture records.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use relay_dashboard_types::{Agent, Channel, Message};
use serde::{Deserialize, Serialize};

use crate::error::FixtureError;

/// The dataset compiled into the crate.
const EMBEDDED_DATASET: &str = include_str!("../data/dataset.json");

/// Resource names accepted by [`FixtureStore::get`].
pub const RESOURCE_NAMES: [&str; 3] = ["channels", "messages", "agents"];

/// On-disk shape of a dataset file.
#[derive(Debug, Deserialize)]
struct RawDataset {
    channels: Vec<Channel>,
    agents: Vec<Agent>,
    messages: Vec<Message>,
}

/// A borrowed view of one named dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Dataset<'a> {
    /// Every channel, in dataset order.
    Channels(&'a [Channel]),
    /// Every message, in dataset order.
    Messages(&'a [Message]),
    /// Every agent, in dataset order.
    Agents(&'a [Agent]),
}

impl Dataset<'_> {
    /// Number of records in the dataset.
    pub const fn len(&self) -> usize {
        match self {
            Self::Channels(c) => c.len(),
            Self::Messages(m) => m.len(),
            Self::Agents(a) => a.len(),
        }
    }

    /// Whether the dataset has no records.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Immutable mapping of resource name to fixture records.
///
/// Messages are held twice: once in global dataset order and once grouped
/// by channel (each group keeps dataset order).
#[derive(Debug, Clone)]
pub struct FixtureStore {
    channels: Vec<Channel>,
    agents: Vec<Agent>,
    messages: Vec<Message>,
    messages_by_channel: BTreeMap<String, Vec<Message>>,
}

impl FixtureStore {
    /// Load the dataset embedded in this crate.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Parse`] or [`FixtureError::Invalid`] if the
    /// embedded data is malformed.
    pub fn embedded() -> Result<Self, FixtureError> {
        Self::from_json(EMBEDDED_DATASET)
    }

    /// Load a dataset from a JSON file with the same shape as the embedded one.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Io`] if the file cannot be read, otherwise
    /// the same errors as [`FixtureStore::from_json`].
    pub fn from_path(path: &Path) -> Result<Self, FixtureError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parse and validate a dataset from a JSON string.
    ///
    /// Channel and agent names must be unique, message ids must be unique,
    /// and every message must reference a declared channel.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Parse`] for malformed JSON and
    /// [`FixtureError::Invalid`] for inconsistent records.
    pub fn from_json(raw: &str) -> Result<Self, FixtureError> {
        let dataset: RawDataset = serde_json::from_str(raw)?;
        Self::from_records(dataset.channels, dataset.agents, dataset.messages)
    }

    /// Build a store from already-parsed records.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::Invalid`] under the same rules as
    /// [`FixtureStore::from_json`].
    pub fn from_records(
        channels: Vec<Channel>,
        agents: Vec<Agent>,
        messages: Vec<Message>,
    ) -> Result<Self, FixtureError> {
        ensure_unique("channel", channels.iter().map(|c| c.name.as_str()))?;
        ensure_unique("agent", agents.iter().map(|a| a.name.as_str()))?;
        ensure_unique("message id", messages.iter().map(|m| m.id.as_str()))?;

        let mut messages_by_channel: BTreeMap<String, Vec<Message>> = channels
            .iter()
            .map(|c| (c.name.clone(), Vec::new()))
            .collect();

        for message in &messages {
            let bucket = messages_by_channel.get_mut(&message.channel).ok_or_else(|| {
                FixtureError::Invalid(format!(
                    "message {} references unknown channel {}",
                    message.id, message.channel
                ))
            })?;
            bucket.push(message.clone());
        }

        Ok(Self {
            channels,
            agents,
            messages,
            messages_by_channel,
        })
    }

    /// Look up a dataset by resource name.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::NotFound`] for names outside [`RESOURCE_NAMES`].
    pub fn get(&self, resource: &str) -> Result<Dataset<'_>, FixtureError> {
        match resource {
            "channels" => Ok(Dataset::Channels(&self.channels)),
            "messages" => Ok(Dataset::Messages(&self.messages)),
            "agents" => Ok(Dataset::Agents(&self.agents)),
            other => Err(FixtureError::NotFound(other.to_owned())),
        }
    }

    /// All channels in dataset order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// All agents in dataset order.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// All messages in dataset order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// A single channel by name.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::NotFound`] if no channel has that name.
    pub fn channel(&self, name: &str) -> Result<&Channel, FixtureError> {
        self.channels
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| FixtureError::NotFound(format!("channel {name}")))
    }

    /// A single agent by name.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::NotFound`] if no agent has that name.
    pub fn agent(&self, name: &str) -> Result<&Agent, FixtureError> {
        self.agents
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| FixtureError::NotFound(format!("agent {name}")))
    }

    /// Messages posted to one channel, in dataset order.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError::NotFound`] if the channel does not exist.
    pub fn messages_in(&self, channel: &str) -> Result<&[Message], FixtureError> {
        self.messages_by_channel
            .get(channel)
            .map(Vec::as_slice)
            .ok_or_else(|| FixtureError::NotFound(format!("channel {channel}")))
    }
}

/// Reject duplicate names within one record kind.
fn ensure_unique<'a>(
    kind: &str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), FixtureError> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(FixtureError::Invalid(format!("duplicate {kind}: {name}")));
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unknown_resource_is_not_found() {
        let store = FixtureStore::embedded().unwrap();
        let err = store.get("widgets").unwrap_err();
        assert!(matches!(err, FixtureError::NotFound(name) if name == "widgets"));
    }

    #[test]
    fn every_resource_name_resolves() {
        let store = FixtureStore::embedded().unwrap();
        for name in RESOURCE_NAMES {
            assert!(!store.get(name).unwrap().is_empty(), "{name} is empty");
        }
    }

    #[test]
    fn message_with_unknown_channel_is_rejected() {
        let raw = r#"{
            "channels": [],
            "agents": [],
            "messages": [{
                "id": "m1", "channel": "ghost", "from": "A", "body": "x",
                "sent_at": "2025-01-01T00:00:00Z"
            }]
        }"#;
        let err = FixtureStore::from_json(raw).unwrap_err();
        assert!(matches!(err, FixtureError::Invalid(_)));
    }

    #[test]
    fn duplicate_channel_names_are_rejected() {
        let raw = r#"{
            "channels": [
                {"name": "a", "topic": "", "members": [], "created_at": "2025-01-01T00:00:00Z"},
                {"name": "a", "topic": "", "members": [], "created_at": "2025-01-01T00:00:00Z"}
            ],
            "agents": [],
            "messages": []
        }"#;
        let err = FixtureStore::from_json(raw).unwrap_err();
        assert!(err.to_string().contains("duplicate channel"));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let err = FixtureStore::from_json("{not json").unwrap_err();
        assert!(matches!(err, FixtureError::Parse { .. }));
    }
}
