// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscriber handles and the arguments they declare at subscribe time

use super::bus::Registry;
use crate::event::{Event, Topic};
use crate::model::{GroupId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// Registration key for a subscriber
///
/// The bus stores only this key and the sending half of the channel; the
/// [`Subscription`] handle owns everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub u64);

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Interest declared by a subscriber when it subscribes
///
/// `user_id` identifies the subscribing actor (used by self-exclusion and the
/// group membership test); `group_ids` are the groups the actor belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterArgs {
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default)]
    pub group_ids: BTreeSet<GroupId>,
}

impl FilterArgs {
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            group_ids: BTreeSet::new(),
        }
    }

    pub fn with_groups(mut self, groups: impl IntoIterator<Item = GroupId>) -> Self {
        self.group_ids.extend(groups);
        self
    }
}

/// Why a subscription stopped yielding events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The consumer cancelled (or dropped) the handle
    Cancelled,
    /// The bus evicted the subscriber because its buffer was full
    Evicted,
    /// The bus itself was dropped
    BusDropped,
}

/// Non-blocking receive failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TryRecvError {
    #[error("no event available")]
    Empty,
    #[error("subscription closed")]
    Closed,
}

/// A live, filtered subscription to one topic
///
/// Yields every event published to the topic after registration that passes
/// the subscriber's filter, in publish order. The sequence is infinite until
/// cancelled and cannot be restarted: subscribe again to resume.
///
/// Dropping the handle cancels the subscription.
pub struct Subscription {
    id: SubscriberId,
    topic: Topic,
    args: FilterArgs,
    receiver: mpsc::Receiver<Event>,
    registry: Weak<Mutex<Registry>>,
    removed_by: Arc<OnceLock<CloseReason>>,
    close_reason: Option<CloseReason>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriberId,
        topic: Topic,
        args: FilterArgs,
        receiver: mpsc::Receiver<Event>,
        registry: Weak<Mutex<Registry>>,
        removed_by: Arc<OnceLock<CloseReason>>,
    ) -> Self {
        Self {
            id,
            topic,
            args,
            receiver,
            registry,
            removed_by,
            close_reason: None,
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn args(&self) -> &FilterArgs {
        &self.args
    }

    /// Set once the subscription has stopped yielding events
    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason
    }

    pub fn is_closed(&self) -> bool {
        self.close_reason.is_some()
    }

    /// Wait for the next matching event
    ///
    /// Returns `None` once the subscription is cancelled, evicted, or the bus
    /// is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        if self.close_reason.is_some() {
            return None;
        }
        let next = self.receiver.recv().await;
        if next.is_none() {
            self.mark_ended();
        }
        next
    }

    /// Take the next matching event without waiting
    pub fn try_recv(&mut self) -> Result<Event, TryRecvError> {
        if self.close_reason.is_some() {
            return Err(TryRecvError::Closed);
        }
        match self.receiver.try_recv() {
            Ok(event) => Ok(event),
            Err(mpsc::error::TryRecvError::Empty) => Err(TryRecvError::Empty),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                self.mark_ended();
                Err(TryRecvError::Closed)
            }
        }
    }

    /// Stop receiving events
    ///
    /// Idempotent. The registration is removed under the bus's registry lock,
    /// so no publish that starts after this returns can reach the handle, and
    /// anything already buffered is discarded.
    pub fn cancel(&mut self) {
        if self.close_reason.is_some() {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            let mut registry = registry.lock().unwrap_or_else(|e| e.into_inner());
            registry.remove(self.topic, self.id);
        }
        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}
        self.close_reason = Some(CloseReason::Cancelled);
        tracing::debug!(subscriber = %self.id, topic = %self.topic, "subscription cancelled");
    }

    fn mark_ended(&mut self) {
        let reason = self.removed_by.get().copied();
        self.close_reason = Some(reason.unwrap_or(CloseReason::BusDropped));
    }
}

impl Stream for Subscription {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        let this = self.get_mut();
        if this.close_reason.is_some() {
            return Poll::Ready(None);
        }
        match this.receiver.poll_recv(cx) {
            Poll::Ready(None) => {
                this.mark_ended();
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("args", &self.args)
            .field("close_reason", &self.close_reason)
            .finish()
    }
}

#[cfg(test)]
#[path = "subscription_tests.rs"]
mod tests;
