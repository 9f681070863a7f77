// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::events::EventBus;
use crate::model::{GroupId, Message, MessageId};
use chrono::Utc;
use tokio_stream::StreamExt;

fn message_event(id: u64, group: u64, author: u64) -> Event {
    Event::MessageAdded {
        message: Message {
            id: MessageId(id),
            group_id: GroupId(group),
            author: UserId(author),
            text: "hi".to_string(),
            created_at: Utc::now(),
        },
    }
}

fn alice_in_ten() -> FilterArgs {
    FilterArgs::for_user(UserId(1)).with_groups([GroupId(10)])
}

#[test]
fn subscriber_id_display() {
    assert_eq!(SubscriberId(7).to_string(), "sub-7");
}

#[test]
fn filter_args_builders() {
    let args = FilterArgs::for_user(UserId(3)).with_groups([GroupId(2), GroupId(1), GroupId(2)]);
    assert_eq!(args.user_id, Some(UserId(3)));
    assert_eq!(args.group_ids.len(), 2);
    assert!(FilterArgs::default().user_id.is_none());
}

#[test]
fn filter_args_deserialize_with_missing_fields() {
    let args: FilterArgs = serde_json::from_str("{}").unwrap();
    assert_eq!(args, FilterArgs::default());

    let args: FilterArgs = serde_json::from_str(r#"{"user_id":4,"group_ids":[1,2]}"#).unwrap();
    assert_eq!(args.user_id, Some(UserId(4)));
    assert!(args.group_ids.contains(&GroupId(2)));
}

#[test]
fn accessors_reflect_subscribe_arguments() {
    let bus = EventBus::new();
    let sub = bus.subscribe(Topic::MessageAdded, alice_in_ten());

    assert_eq!(sub.topic(), Topic::MessageAdded);
    assert_eq!(sub.args(), &alice_in_ten());
    assert_eq!(sub.close_reason(), None);
    assert!(!sub.is_closed());
}

#[test]
fn subscriber_ids_are_unique_per_bus() {
    let bus = EventBus::new();
    let a = bus.subscribe(Topic::MessageAdded, alice_in_ten());
    let b = bus.subscribe(Topic::MessageAdded, alice_in_ten());
    let c = bus.subscribe(Topic::GroupAdded, alice_in_ten());

    assert_ne!(a.id(), b.id());
    assert_ne!(b.id(), c.id());
}

#[test]
fn cancel_is_idempotent() {
    let bus = EventBus::new();
    let mut sub = bus.subscribe(Topic::MessageAdded, alice_in_ten());

    sub.cancel();
    sub.cancel();

    assert_eq!(sub.close_reason(), Some(CloseReason::Cancelled));
    assert_eq!(bus.subscriber_count(), 0);
}

#[tokio::test]
async fn cancel_discards_buffered_events() {
    let bus = EventBus::new();
    let mut sub = bus.subscribe(Topic::MessageAdded, alice_in_ten());
    bus.publish(message_event(1, 10, 2));

    sub.cancel();

    assert_eq!(sub.try_recv(), Err(TryRecvError::Closed));
    assert!(sub.recv().await.is_none());
}

#[test]
fn publish_after_cancel_is_not_delivered() {
    let bus = EventBus::new();
    let mut sub = bus.subscribe(Topic::MessageAdded, alice_in_ten());
    sub.cancel();

    let report = bus.publish(message_event(1, 10, 2));
    assert_eq!(report.delivered, 0);
}

#[test]
fn cancel_after_bus_dropped_is_harmless() {
    let bus = EventBus::new();
    let mut sub = bus.subscribe(Topic::MessageAdded, alice_in_ten());
    drop(bus);

    sub.cancel();
    assert_eq!(sub.close_reason(), Some(CloseReason::Cancelled));
}

#[tokio::test]
async fn stream_yields_events_in_publish_order() {
    let bus = EventBus::new();
    let mut sub = bus.subscribe(Topic::MessageAdded, alice_in_ten());

    for id in 1..=3 {
        bus.publish(message_event(id, 10, 2));
    }
    drop(bus);

    let ids: Vec<_> = (&mut sub)
        .filter_map(|event| match event {
            Event::MessageAdded { message } => Some(message.id.0),
            _ => None,
        })
        .collect()
        .await;

    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(sub.close_reason(), Some(CloseReason::BusDropped));
}

#[tokio::test]
async fn recv_waits_for_later_publish() {
    let bus = EventBus::new();
    let mut sub = bus.subscribe(Topic::MessageAdded, alice_in_ten());

    let publisher = bus.clone();
    tokio::spawn(async move {
        tokio::task::yield_now().await;
        publisher.publish(message_event(9, 10, 2));
    });

    let event = sub.recv().await.unwrap();
    assert_eq!(event.actor(), Some(UserId(2)));
}

#[test]
fn debug_omits_channel_internals() {
    let bus = EventBus::new();
    let sub = bus.subscribe(Topic::GroupAdded, FilterArgs::default());
    let debug = format!("{:?}", sub);
    assert!(debug.contains("GroupAdded"));
    assert!(!debug.contains("receiver"));
}
