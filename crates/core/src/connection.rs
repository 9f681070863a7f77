// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client connection state machine
//!
//! Subscriptions are best-effort: anything published while a client is
//! disconnected is lost. A client therefore refetches the full state of
//! every view it displays whenever its link comes back, instead of trying
//! to replay missed events.

use crate::config::ReconnectConfig;
use crate::model::{GroupId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

/// The state of a client's link to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Link is up and subscriptions are live
    Connected,
    /// Link is down; a retry is scheduled
    Disconnected { attempt: u32 },
    /// A reconnect attempt is in flight
    Reconnecting { attempt: u32 },
}

/// Link events fed into the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The transport failed or a subscription stream ended
    Lost,
    /// The scheduled retry fired and an attempt began
    RetryStarted,
    /// The attempt did not connect
    AttemptFailed,
    /// The link (and its subscriptions) is up
    Established,
}

/// Something a client displays whose state can go stale while disconnected
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum View {
    /// Message list of one group
    GroupMessages { group_id: GroupId },
    /// Group list of one user
    UserGroups { user_id: UserId },
}

impl View {
    pub fn group_messages(group_id: GroupId) -> Self {
        View::GroupMessages { group_id }
    }

    pub fn user_groups(user_id: UserId) -> Self {
        View::UserGroups { user_id }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::GroupMessages { group_id } => write!(f, "group-messages:{}", group_id),
            View::UserGroups { user_id } => write!(f, "user-groups:{}", user_id),
        }
    }
}

/// Side effects requested by a transition; the caller performs them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryEffect {
    /// Fire `RetryStarted` after `delay`
    ScheduleRetry { delay: Duration },
    /// Re-query the full state of `view`
    Refetch { view: View },
}

/// Exponential backoff between reconnect attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: u32,
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt + 1`, capped at `max`
    pub fn delay(&self, attempt: u32) -> Duration {
        let mut delay = self.initial;
        for _ in 0..attempt {
            if delay >= self.max {
                break;
            }
            delay = delay.saturating_mul(self.multiplier.max(1));
        }
        delay.min(self.max)
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ReconnectConfig::default())
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            initial: config.initial,
            max: config.max,
            multiplier: config.multiplier,
        }
    }
}

/// Recovery bookkeeping for one client link
///
/// Starts `Disconnected`, so the first `Established` also fetches every
/// registered view.
#[derive(Debug, Clone)]
pub struct Connection {
    state: ConnectionState,
    policy: ReconnectPolicy,
    views: BTreeSet<View>,
}

impl Connection {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Disconnected { attempt: 0 },
            policy,
            views: BTreeSet::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Register a view for refetch; returns false if already registered
    pub fn watch_view(&mut self, view: View) -> bool {
        self.views.insert(view)
    }

    pub fn unwatch_view(&mut self, view: &View) -> bool {
        self.views.remove(view)
    }

    pub fn views(&self) -> impl Iterator<Item = &View> {
        self.views.iter()
    }

    /// Apply a link event, returning the effects the caller must perform
    pub fn transition(&mut self, event: ConnectionEvent) -> Vec<RecoveryEffect> {
        let (next, effects) = match (self.state, event) {
            // Connected → Disconnected
            (ConnectionState::Connected, ConnectionEvent::Lost) => (
                ConnectionState::Disconnected { attempt: 0 },
                vec![RecoveryEffect::ScheduleRetry {
                    delay: self.policy.delay(0),
                }],
            ),

            // Disconnected → Reconnecting
            (ConnectionState::Disconnected { attempt }, ConnectionEvent::RetryStarted) => (
                ConnectionState::Reconnecting {
                    attempt: attempt.saturating_add(1),
                },
                vec![],
            ),

            // Reconnecting → Disconnected, backing off further
            (
                ConnectionState::Reconnecting { attempt },
                ConnectionEvent::AttemptFailed | ConnectionEvent::Lost,
            ) => (
                ConnectionState::Disconnected { attempt },
                vec![RecoveryEffect::ScheduleRetry {
                    delay: self.policy.delay(attempt),
                }],
            ),

            // Disconnected/Reconnecting → Connected: refetch every view once
            (
                ConnectionState::Disconnected { .. } | ConnectionState::Reconnecting { .. },
                ConnectionEvent::Established,
            ) => (
                ConnectionState::Connected,
                self.views
                    .iter()
                    .map(|view| RecoveryEffect::Refetch { view: *view })
                    .collect(),
            ),

            // Invalid transitions - no change
            (state, _) => (state, vec![]),
        };

        if next != self.state {
            tracing::debug!(from = ?self.state, to = ?next, ?event, "connection transition");
        }
        self.state = next;
        effects
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
