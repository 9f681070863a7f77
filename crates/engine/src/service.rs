// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Query, mutation, and subscription resolvers
//!
//! Every mutation validates against current state, appends its operation to
//! the WAL, applies it, and only then publishes. A failed mutation publishes
//! nothing. The state lock is held across all four steps, so ids, WAL order,
//! and publish order agree.

use crate::error::ServiceError;
use chatty_core::{
    events::{group_added_predicate, message_added_predicate},
    with_filter, Clock, Event, EventBus, FilterArgs, Group, GroupId, Message, MessageId,
    Operation, Subscription, Topic, User, UserId,
};
use chatty_storage::{ChatState, Wal};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Messages returned when a page does not ask for a size
pub const DEFAULT_PAGE_SIZE: usize = 20;
/// Upper bound on a single page
pub const MAX_PAGE_SIZE: usize = 200;

/// Cursor pagination over a group's messages, newest first
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Page size; defaults to [`DEFAULT_PAGE_SIZE`]
    #[serde(default)]
    pub first: Option<usize>,
    /// Only messages older than this one
    #[serde(default)]
    pub before: Option<MessageId>,
}

impl Page {
    fn size(&self) -> usize {
        self.first.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE)
    }
}

/// Counters reported by the daemon's status request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceStats {
    pub users: usize,
    pub groups: usize,
    pub messages: usize,
    pub subscribers: usize,
    pub wal_sequence: u64,
}

/// Service dependencies
pub struct ServiceDeps {
    pub wal: Arc<Mutex<Wal>>,
    pub state: Arc<Mutex<ChatState>>,
    pub bus: EventBus,
}

/// Resolvers backing the chat API
pub struct ChatService<C: Clock> {
    wal: Arc<Mutex<Wal>>,
    state: Arc<Mutex<ChatState>>,
    bus: EventBus,
    clock: C,
}

impl<C: Clock> ChatService<C> {
    pub fn new(deps: ServiceDeps, clock: C) -> Self {
        Self {
            wal: deps.wal,
            state: deps.state,
            bus: deps.bus,
            clock,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    // -- queries --

    pub fn user(&self, id: UserId) -> Result<User, ServiceError> {
        self.state()
            .users
            .get(&id)
            .cloned()
            .ok_or(ServiceError::UserNotFound(id))
    }

    pub fn user_by_email(&self, email: &str) -> Option<User> {
        self.state().user_by_email(email).cloned()
    }

    pub fn users(&self) -> Vec<User> {
        self.state().users.values().cloned().collect()
    }

    pub fn friends(&self, user_id: UserId) -> Result<Vec<User>, ServiceError> {
        let state = self.state();
        let user = state
            .users
            .get(&user_id)
            .ok_or(ServiceError::UserNotFound(user_id))?;
        Ok(user
            .friends
            .iter()
            .filter_map(|id| state.users.get(id).cloned())
            .collect())
    }

    pub fn group(&self, id: GroupId) -> Result<Group, ServiceError> {
        self.state()
            .groups
            .get(&id)
            .cloned()
            .ok_or(ServiceError::GroupNotFound(id))
    }

    pub fn groups_for_user(&self, user_id: UserId) -> Result<Vec<Group>, ServiceError> {
        let state = self.state();
        if !state.users.contains_key(&user_id) {
            return Err(ServiceError::UserNotFound(user_id));
        }
        Ok(state
            .groups_for_user(user_id)
            .into_iter()
            .cloned()
            .collect())
    }

    /// A page of a group's messages, newest first
    pub fn messages(&self, group_id: GroupId, page: Page) -> Result<Vec<Message>, ServiceError> {
        let state = self.state();
        if !state.groups.contains_key(&group_id) {
            return Err(ServiceError::GroupNotFound(group_id));
        }
        Ok(state
            .group_messages(group_id)
            .filter(|m| page.before.map_or(true, |before| m.id < before))
            .take(page.size())
            .cloned()
            .collect())
    }

    pub fn stats(&self) -> ServiceStats {
        let state = self.state();
        ServiceStats {
            users: state.users.len(),
            groups: state.groups.len(),
            messages: state.messages.len(),
            subscribers: self.bus.subscriber_count(),
            wal_sequence: self.wal.lock().unwrap_or_else(|e| e.into_inner()).sequence(),
        }
    }

    // -- mutations --

    pub fn create_user(&self, username: &str, email: &str) -> Result<User, ServiceError> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() {
            return Err(ServiceError::Invalid("username is empty".into()));
        }
        if !email.contains('@') {
            return Err(ServiceError::Invalid(format!("not an email address: {}", email)));
        }

        let mut state = self.state();
        if state.user_by_email(email).is_some() {
            return Err(ServiceError::DuplicateUser(email.to_string()));
        }
        if state.user_by_name(username).is_some() {
            return Err(ServiceError::DuplicateUser(username.to_string()));
        }

        let id = state.next_user_id();
        self.commit(
            &mut state,
            Operation::UserCreate {
                id,
                username: username.to_string(),
                email: email.to_string(),
            },
        )?;
        tracing::info!(user_id = %id, username, "user created");
        state.users.get(&id).cloned().ok_or(ServiceError::UserNotFound(id))
    }

    /// Make two users friends; a no-op if they already are
    pub fn add_friend(&self, user_id: UserId, friend_id: UserId) -> Result<User, ServiceError> {
        if user_id == friend_id {
            return Err(ServiceError::Invalid("cannot befriend yourself".into()));
        }
        let mut state = self.state();
        let user = state
            .users
            .get(&user_id)
            .ok_or(ServiceError::UserNotFound(user_id))?;
        if !state.users.contains_key(&friend_id) {
            return Err(ServiceError::UserNotFound(friend_id));
        }

        if !user.is_friend(friend_id) {
            self.commit(&mut state, Operation::FriendAdd { user_id, friend_id })?;
            tracing::info!(%user_id, %friend_id, "friend added");
        }
        state
            .users
            .get(&user_id)
            .cloned()
            .ok_or(ServiceError::UserNotFound(user_id))
    }

    /// Post a message; publishes `message-added`
    pub fn create_message(
        &self,
        user_id: UserId,
        group_id: GroupId,
        text: &str,
    ) -> Result<Message, ServiceError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::EmptyMessage);
        }

        let mut state = self.state();
        if !state.users.contains_key(&user_id) {
            return Err(ServiceError::UserNotFound(user_id));
        }
        let group = state
            .groups
            .get(&group_id)
            .ok_or(ServiceError::GroupNotFound(group_id))?;
        if !group.has_member(user_id) {
            return Err(ServiceError::NotAMember { user_id, group_id });
        }

        let id = state.next_message_id();
        self.commit(
            &mut state,
            Operation::MessageCreate {
                id,
                group_id,
                author: user_id,
                text: text.to_string(),
                created_at: self.clock.now(),
            },
        )?;
        let message = state
            .messages
            .get(&id)
            .cloned()
            .ok_or(ServiceError::GroupNotFound(group_id))?;

        tracing::info!(message_id = %id, %group_id, author = %user_id, "message created");
        self.bus.publish(Event::MessageAdded {
            message: message.clone(),
        });
        Ok(message)
    }

    /// Create a group owned by `user_id`; publishes `group-added`
    ///
    /// The creator is always a member. Every other member must exist and be a
    /// friend of the creator.
    pub fn create_group(
        &self,
        user_id: UserId,
        name: &str,
        member_ids: &[UserId],
    ) -> Result<Group, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::Invalid("group name is empty".into()));
        }

        let mut state = self.state();
        let creator = state
            .users
            .get(&user_id)
            .ok_or(ServiceError::UserNotFound(user_id))?;

        let mut members = vec![user_id];
        for &member in member_ids {
            if members.contains(&member) {
                continue;
            }
            if !state.users.contains_key(&member) {
                return Err(ServiceError::UserNotFound(member));
            }
            if !creator.is_friend(member) {
                return Err(ServiceError::NotFriends {
                    user_id,
                    other_id: member,
                });
            }
            members.push(member);
        }

        let id = state.next_group_id();
        self.commit(
            &mut state,
            Operation::GroupCreate {
                id,
                name: name.to_string(),
                created_by: user_id,
                members,
                created_at: self.clock.now(),
            },
        )?;
        let group = state
            .groups
            .get(&id)
            .cloned()
            .ok_or(ServiceError::GroupNotFound(id))?;

        tracing::info!(group_id = %id, created_by = %user_id, members = group.members.len(), "group created");
        self.bus.publish(Event::GroupAdded {
            group: group.clone(),
        });
        Ok(group)
    }

    pub fn update_group(&self, group_id: GroupId, name: &str) -> Result<Group, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::Invalid("group name is empty".into()));
        }
        let mut state = self.state();
        if !state.groups.contains_key(&group_id) {
            return Err(ServiceError::GroupNotFound(group_id));
        }

        self.commit(
            &mut state,
            Operation::GroupRename {
                id: group_id,
                name: name.to_string(),
            },
        )?;
        tracing::info!(%group_id, "group renamed");
        state
            .groups
            .get(&group_id)
            .cloned()
            .ok_or(ServiceError::GroupNotFound(group_id))
    }

    /// Remove `user_id` from a group, returning the group as left behind
    ///
    /// When the last member leaves the group is deleted; the returned group
    /// then has no members.
    pub fn leave_group(&self, user_id: UserId, group_id: GroupId) -> Result<Group, ServiceError> {
        let mut state = self.state();
        let mut group = state
            .groups
            .get(&group_id)
            .cloned()
            .ok_or(ServiceError::GroupNotFound(group_id))?;
        if !group.has_member(user_id) {
            return Err(ServiceError::NotAMember { user_id, group_id });
        }

        self.commit(
            &mut state,
            Operation::GroupLeave {
                id: group_id,
                user_id,
            },
        )?;
        group.members.retain(|member| *member != user_id);
        if group.members.is_empty() {
            tracing::info!(%group_id, %user_id, "last member left, group deleted");
        } else {
            tracing::info!(%group_id, %user_id, "member left group");
        }
        Ok(group)
    }

    /// Delete a group and all of its messages
    pub fn delete_group(&self, group_id: GroupId) -> Result<(), ServiceError> {
        let mut state = self.state();
        if !state.groups.contains_key(&group_id) {
            return Err(ServiceError::GroupNotFound(group_id));
        }
        self.commit(&mut state, Operation::GroupDelete { id: group_id })?;
        tracing::info!(%group_id, "group deleted");
        Ok(())
    }

    // -- subscriptions --

    /// Subscribe `user_id` to new messages in `group_ids`
    ///
    /// An empty `group_ids` means every group the user belongs to right now.
    /// Explicit ids must all be groups the user belongs to. The group set is
    /// fixed for the lifetime of the subscription.
    pub fn message_added(
        &self,
        user_id: UserId,
        group_ids: &[GroupId],
    ) -> Result<Subscription, ServiceError> {
        let state = self.state();
        if !state.users.contains_key(&user_id) {
            return Err(ServiceError::UserNotFound(user_id));
        }
        let member_of: Vec<GroupId> = state
            .groups_for_user(user_id)
            .iter()
            .map(|g| g.id)
            .collect();
        let args = if group_ids.is_empty() {
            FilterArgs::for_user(user_id).with_groups(member_of)
        } else {
            if let Some(&group_id) = group_ids.iter().find(|id| !member_of.contains(*id)) {
                if !state.groups.contains_key(&group_id) {
                    return Err(ServiceError::GroupNotFound(group_id));
                }
                return Err(ServiceError::NotAMember { user_id, group_id });
            }
            FilterArgs::for_user(user_id).with_groups(group_ids.iter().copied())
        };
        // subscribe while holding the state lock so no commit slips between
        // reading the membership and registering
        Ok(with_filter(
            &self.bus,
            Topic::MessageAdded,
            args,
            message_added_predicate,
        ))
    }

    /// Subscribe `user_id` to groups created with them as a member
    pub fn group_added(&self, user_id: UserId) -> Result<Subscription, ServiceError> {
        let state = self.state();
        if !state.users.contains_key(&user_id) {
            return Err(ServiceError::UserNotFound(user_id));
        }
        Ok(with_filter(
            &self.bus,
            Topic::GroupAdded,
            FilterArgs::for_user(user_id),
            group_added_predicate,
        ))
    }

    fn commit(&self, state: &mut ChatState, op: Operation) -> Result<(), ServiceError> {
        let seq = {
            let mut wal = self.wal.lock().unwrap_or_else(|e| e.into_inner());
            wal.append(&op)?
        };
        state.apply(&op);
        tracing::debug!(seq, op = op.kind(), "committed");
        Ok(())
    }

    fn state(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
