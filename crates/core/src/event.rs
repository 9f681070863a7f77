// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events pushed to subscribed clients, and the topics they travel on

use crate::model::{Group, Message, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A named event channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Topic {
    MessageAdded,
    GroupAdded,
}

impl Topic {
    pub const ALL: [Topic; 2] = [Topic::MessageAdded, Topic::GroupAdded];

    /// Wire name of the topic, e.g. `message-added`
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::MessageAdded => "message-added",
            Topic::GroupAdded => "group-added",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown topic: {0}")]
pub struct UnknownTopic(pub String);

impl FromStr for Topic {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownTopic(s.to_string()))
    }
}

/// An occurrence published after a mutation has been persisted
///
/// Events are immutable once published and are never stored by the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "topic", rename_all = "kebab-case")]
pub enum Event {
    MessageAdded { message: Message },
    GroupAdded { group: Group },
}

impl Event {
    pub fn topic(&self) -> Topic {
        match self {
            Event::MessageAdded { .. } => Topic::MessageAdded,
            Event::GroupAdded { .. } => Topic::GroupAdded,
        }
    }

    /// The user whose action produced this event
    pub fn actor(&self) -> Option<UserId> {
        match self {
            Event::MessageAdded { message } => Some(message.author),
            Event::GroupAdded { group } => Some(group.created_by),
        }
    }

    /// Key-value pairs for structured logging
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Event::MessageAdded { message } => vec![
                ("message_id", message.id.to_string()),
                ("group_id", message.group_id.to_string()),
                ("author", message.author.to_string()),
            ],
            Event::GroupAdded { group } => vec![
                ("group_id", group.id.to_string()),
                ("created_by", group.created_by.to_string()),
                ("members", group.members.len().to_string()),
            ],
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
