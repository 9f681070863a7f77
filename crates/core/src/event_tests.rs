// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::model::{GroupId, MessageId};
use chrono::Utc;
use yare::parameterized;

fn message(group: u64, author: u64) -> Message {
    Message {
        id: MessageId(1),
        group_id: GroupId(group),
        author: UserId(author),
        text: "hi".to_string(),
        created_at: Utc::now(),
    }
}

fn group(created_by: u64, members: &[u64]) -> Group {
    Group {
        id: GroupId(5),
        name: "team".to_string(),
        created_by: UserId(created_by),
        members: members.iter().copied().map(UserId).collect(),
        created_at: Utc::now(),
    }
}

#[parameterized(
    message_added = { Topic::MessageAdded, "message-added" },
    group_added = { Topic::GroupAdded, "group-added" },
)]
fn topic_wire_names_roundtrip(topic: Topic, name: &str) {
    assert_eq!(topic.as_str(), name);
    assert_eq!(topic.to_string(), name);
    assert_eq!(name.parse::<Topic>().unwrap(), topic);
    assert_eq!(serde_json::to_string(&topic).unwrap(), format!("\"{}\"", name));
}

#[test]
fn unknown_topic_is_rejected() {
    let err = "typing-started".parse::<Topic>().unwrap_err();
    assert_eq!(err.to_string(), "unknown topic: typing-started");
}

#[test]
fn event_topic_and_actor() {
    let added = Event::MessageAdded {
        message: message(10, 1),
    };
    assert_eq!(added.topic(), Topic::MessageAdded);
    assert_eq!(added.actor(), Some(UserId(1)));

    let created = Event::GroupAdded {
        group: group(3, &[3, 4]),
    };
    assert_eq!(created.topic(), Topic::GroupAdded);
    assert_eq!(created.actor(), Some(UserId(3)));
}

#[test]
fn event_is_tagged_with_topic_on_the_wire() {
    let event = Event::MessageAdded {
        message: message(20, 2),
    };
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["topic"], "message-added");
    assert_eq!(json["message"]["group_id"], 20);

    let parsed: Event = serde_json::from_value(json).unwrap();
    assert_eq!(parsed, event);
}

#[test]
fn event_fields_name_the_routing_keys() {
    let event = Event::MessageAdded {
        message: message(20, 2),
    };
    let fields = event.fields();
    assert!(fields.contains(&("group_id", "20".to_string())));
    assert!(fields.contains(&("author", "2".to_string())));
}
