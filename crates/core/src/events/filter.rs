// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-subscriber delivery filters
//!
//! A filter is a pure predicate over (event, subscriber args) plus the topic's
//! self-exclusion setting. Filters run inline on the dispatch path, once per
//! subscriber per event, so predicates must be cheap and must not block.

use super::bus::EventBus;
use super::subscription::{FilterArgs, SubscriberId, Subscription};
use crate::event::{Event, Topic};
use std::collections::BTreeMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

type Predicate = Arc<dyn Fn(&Event, &FilterArgs) -> bool + Send + Sync>;

/// Decides whether one subscriber receives one event
#[derive(Clone)]
pub struct Filter {
    predicate: Predicate,
    exclude_self: bool,
}

impl Filter {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&Event, &FilterArgs) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Arc::new(predicate),
            exclude_self: false,
        }
    }

    /// Every event on the topic passes
    pub fn accept_all() -> Self {
        Self::new(|_, _| true)
    }

    /// Drop events whose actor is the subscriber itself
    pub fn exclude_self(mut self, enabled: bool) -> Self {
        self.exclude_self = enabled;
        self
    }

    pub fn excludes_self(&self) -> bool {
        self.exclude_self
    }

    /// The pure delivery decision
    pub fn matches(&self, event: &Event, args: &FilterArgs) -> bool {
        if self.exclude_self && args.user_id.is_some() && event.actor() == args.user_id {
            return false;
        }
        (self.predicate)(event, args)
    }

    /// Delivery decision as taken by the dispatch loop
    ///
    /// A predicate that panics counts as "does not match" for this subscriber
    /// only.
    pub(crate) fn evaluate(&self, event: &Event, args: &FilterArgs, subscriber: SubscriberId) -> bool {
        match catch_unwind(AssertUnwindSafe(|| self.matches(event, args))) {
            Ok(matched) => matched,
            Err(_) => {
                tracing::warn!(
                    subscriber = %subscriber,
                    topic = %event.topic(),
                    "filter predicate panicked, treating as no match"
                );
                false
            }
        }
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("exclude_self", &self.exclude_self)
            .finish_non_exhaustive()
    }
}

/// `message-added`: deliver iff the message's group is among the subscriber's groups
pub fn message_added_predicate(event: &Event, args: &FilterArgs) -> bool {
    match event {
        Event::MessageAdded { message } => args.group_ids.contains(&message.group_id),
        _ => false,
    }
}

/// `group-added`: deliver iff the subscriber is one of the new group's members
pub fn group_added_predicate(event: &Event, args: &FilterArgs) -> bool {
    match event {
        Event::GroupAdded { group } => args.user_id.is_some_and(|user| group.has_member(user)),
        _ => false,
    }
}

/// Per-topic filtering policy held by a bus
///
/// Self-exclusion is enabled for every known topic unless configured off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPolicy {
    exclude_self: BTreeMap<Topic, bool>,
}

impl FilterPolicy {
    pub fn excludes_self(&self, topic: Topic) -> bool {
        self.exclude_self.get(&topic).copied().unwrap_or(true)
    }

    pub fn set_exclude_self(&mut self, topic: Topic, enabled: bool) {
        self.exclude_self.insert(topic, enabled);
    }

    /// The filter a plain `subscribe(topic, args)` registers with
    pub fn default_filter(&self, topic: Topic) -> Filter {
        let filter = match topic {
            Topic::MessageAdded => Filter::new(message_added_predicate),
            Topic::GroupAdded => Filter::new(group_added_predicate),
        };
        filter.exclude_self(self.excludes_self(topic))
    }
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            exclude_self: Topic::ALL.into_iter().map(|t| (t, true)).collect(),
        }
    }
}

/// Subscribe to `topic` with a custom predicate
///
/// The bus's self-exclusion setting for the topic still applies on top of the
/// predicate.
pub fn with_filter<F>(bus: &EventBus, topic: Topic, args: FilterArgs, predicate: F) -> Subscription
where
    F: Fn(&Event, &FilterArgs) -> bool + Send + Sync + 'static,
{
    let filter = Filter::new(predicate).exclude_self(bus.policy().excludes_self(topic));
    bus.subscribe_with(topic, args, filter)
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
