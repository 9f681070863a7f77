// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event bus for routing events to filtered subscribers
//!
//! Delivery is at-most-once and best-effort: events are never stored, a
//! subscriber only sees what is published while it is registered, and a
//! subscriber whose buffer fills up is evicted rather than slowing the
//! publisher. Consumers recover from gaps by refetching current state.

use super::filter::{Filter, FilterPolicy};
use super::subscription::{CloseReason, FilterArgs, SubscriberId, Subscription};
use crate::config::BusConfig;
use crate::event::{Event, Topic};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Sender for unfiltered event observation
pub type EventSender = mpsc::UnboundedSender<Event>;
/// Receiver for unfiltered event observation
pub type EventReceiver = mpsc::UnboundedReceiver<Event>;

pub(crate) struct Entry {
    args: FilterArgs,
    filter: Filter,
    sender: mpsc::Sender<Event>,
    /// Set when the bus removes the entry on the subscriber's behalf
    removed_by: Arc<OnceLock<CloseReason>>,
}

/// Subscriber registry; the only shared mutable state of a bus
///
/// Registration, removal and dispatch all happen under one mutex, which makes
/// them linearizable with respect to each other.
#[derive(Default)]
pub(crate) struct Registry {
    topics: HashMap<Topic, BTreeMap<SubscriberId, Entry>>,
    observers: Vec<EventSender>,
    next_id: u64,
}

impl Registry {
    fn insert(&mut self, topic: Topic, entry: Entry) -> SubscriberId {
        self.next_id += 1;
        let id = SubscriberId(self.next_id);
        self.topics.entry(topic).or_default().insert(id, entry);
        id
    }

    pub(crate) fn remove(&mut self, topic: Topic, id: SubscriberId) -> Option<Entry> {
        let subscribers = self.topics.get_mut(&topic)?;
        let removed = subscribers.remove(&id);
        if subscribers.is_empty() {
            self.topics.remove(&topic);
        }
        removed
    }

    fn len(&self) -> usize {
        self.topics.values().map(BTreeMap::len).sum()
    }
}

/// Outcome of a single publish, for observability
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers the event was enqueued for
    pub delivered: usize,
    /// Subscribers whose filter rejected the event
    pub filtered: usize,
    /// Subscribers whose handle was already gone
    pub dropped: usize,
    /// Subscribers removed because their buffer was full
    pub evicted: usize,
}

/// The event bus fans published events out to matching subscribers
///
/// Each instance owns its registry; clones share it.
#[derive(Clone)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
    policy: Arc<FilterPolicy>,
    buffer: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_config(&BusConfig::default(), FilterPolicy::default())
    }

    pub fn with_config(config: &BusConfig, policy: FilterPolicy) -> Self {
        Self {
            registry: Arc::new(Mutex::new(Registry::default())),
            policy: Arc::new(policy),
            buffer: config.subscriber_buffer.max(1),
        }
    }

    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    /// Subscribe with the topic's default filter
    pub fn subscribe(&self, topic: Topic, args: FilterArgs) -> Subscription {
        let filter = self.policy.default_filter(topic);
        self.subscribe_with(topic, args, filter)
    }

    /// Subscribe to every event on `topic`, unfiltered
    pub fn subscribe_all(&self, topic: Topic) -> Subscription {
        self.subscribe_with(topic, FilterArgs::default(), Filter::accept_all())
    }

    /// Subscribe with an explicit filter
    pub fn subscribe_with(&self, topic: Topic, args: FilterArgs, filter: Filter) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.buffer);
        let removed_by = Arc::new(OnceLock::new());

        let id = self.lock().insert(
            topic,
            Entry {
                args: args.clone(),
                filter,
                sender,
                removed_by: Arc::clone(&removed_by),
            },
        );

        tracing::debug!(
            subscriber = %id,
            %topic,
            user_id = ?args.user_id,
            groups = args.group_ids.len(),
            "subscribed"
        );

        Subscription::new(
            id,
            topic,
            args,
            receiver,
            Arc::downgrade(&self.registry),
            removed_by,
        )
    }

    /// Remove a subscriber by key
    ///
    /// Idempotent; the handle itself is normally cancelled instead. The
    /// handle ends with [`CloseReason::Cancelled`] once its buffer drains.
    pub fn unsubscribe(&self, id: &SubscriberId) {
        let mut registry = self.lock();
        for topic in Topic::ALL {
            if let Some(entry) = registry.remove(topic, *id) {
                let _ = entry.removed_by.set(CloseReason::Cancelled);
                tracing::debug!(subscriber = %id, %topic, "unsubscribed");
                return;
            }
        }
    }

    /// Receive every published event regardless of topic or filter (for logging)
    ///
    /// Each call adds an independent observer; dropping the receiver removes it
    /// on the next publish.
    pub fn observe_all(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().observers.push(tx);
        rx
    }

    /// Publish an event to all matching subscribers
    ///
    /// Never blocks on consumers and never fails; having no subscribers is
    /// fine.
    pub fn publish(&self, event: Event) -> PublishReport {
        let topic = event.topic();
        let mut report = PublishReport::default();
        let mut guard = self.lock();
        let registry = &mut *guard;

        registry
            .observers
            .retain(|observer| observer.send(event.clone()).is_ok());

        let Some(subscribers) = registry.topics.get_mut(&topic) else {
            tracing::trace!(%topic, "published with no subscribers");
            return report;
        };

        let mut gone = Vec::new();
        for (id, entry) in subscribers.iter() {
            if !entry.filter.evaluate(&event, &entry.args, *id) {
                report.filtered += 1;
                continue;
            }
            match entry.sender.try_send(event.clone()) {
                Ok(()) => report.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        subscriber = %id,
                        %topic,
                        buffer = self.buffer,
                        "subscriber buffer full, evicting"
                    );
                    let _ = entry.removed_by.set(CloseReason::Evicted);
                    report.evicted += 1;
                    gone.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber = %id, %topic, "subscriber gone, dropping event");
                    report.dropped += 1;
                    gone.push(*id);
                }
            }
        }

        for id in gone {
            subscribers.remove(&id);
        }
        if subscribers.is_empty() {
            registry.topics.remove(&topic);
        }

        tracing::debug!(
            %topic,
            delivered = report.delivered,
            filtered = report.filtered,
            dropped = report.dropped,
            evicted = report.evicted,
            "published"
        );
        report
    }

    /// Count of active subscribers across all topics
    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Count of active subscribers on one topic
    pub fn topic_subscriber_count(&self, topic: Topic) -> usize {
        self.lock().topics.get(&topic).map_or(0, BTreeMap::len)
    }

    /// List all subscriber keys
    pub fn list_subscriptions(&self) -> Vec<(Topic, SubscriberId)> {
        let registry = self.lock();
        let mut ids: Vec<_> = registry
            .topics
            .iter()
            .flat_map(|(topic, subs)| subs.keys().map(move |id| (*topic, *id)))
            .collect();
        ids.sort();
        ids
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
