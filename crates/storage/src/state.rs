// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state from WAL replay

use chatty_core::{Group, GroupId, Message, MessageId, Operation, User, UserId};
use std::collections::BTreeMap;

/// Materialized chat state built from WAL operations
///
/// `apply` never fails: operations are validated before they are logged, and
/// an operation naming a record that no longer exists is a no-op.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatState {
    pub users: BTreeMap<UserId, User>,
    pub groups: BTreeMap<GroupId, Group>,
    pub messages: BTreeMap<MessageId, Message>,
    last_user: u64,
    last_group: u64,
    last_message: u64,
}

impl ChatState {
    /// Rebuild state by applying `ops` in order
    pub fn replay<'a>(ops: impl IntoIterator<Item = &'a Operation>) -> Self {
        let mut state = Self::default();
        for op in ops {
            state.apply(op);
        }
        state
    }

    /// Ids are never reused, even after deletes
    pub fn next_user_id(&self) -> UserId {
        UserId(self.last_user + 1)
    }

    pub fn next_group_id(&self) -> GroupId {
        GroupId(self.last_group + 1)
    }

    pub fn next_message_id(&self) -> MessageId {
        MessageId(self.last_message + 1)
    }

    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
    }

    pub fn user_by_name(&self, username: &str) -> Option<&User> {
        self.users.values().find(|user| user.username == username)
    }

    /// Groups `user_id` is a member of, by id
    pub fn groups_for_user(&self, user_id: UserId) -> Vec<&Group> {
        self.groups
            .values()
            .filter(|group| group.has_member(user_id))
            .collect()
    }

    /// Messages in a group, newest first
    pub fn group_messages(&self, group_id: GroupId) -> impl Iterator<Item = &Message> {
        self.messages
            .values()
            .rev()
            .filter(move |message| message.group_id == group_id)
    }

    /// Apply an operation to update the state
    pub fn apply(&mut self, op: &Operation) {
        match op {
            Operation::UserCreate {
                id,
                username,
                email,
            } => {
                self.users.insert(
                    *id,
                    User {
                        id: *id,
                        username: username.clone(),
                        email: email.clone(),
                        friends: Vec::new(),
                    },
                );
                self.last_user = self.last_user.max(id.0);
            }

            Operation::FriendAdd { user_id, friend_id } => {
                if !self.users.contains_key(user_id) || !self.users.contains_key(friend_id) {
                    return;
                }
                for (a, b) in [(user_id, friend_id), (friend_id, user_id)] {
                    if let Some(user) = self.users.get_mut(a) {
                        if !user.friends.contains(b) {
                            user.friends.push(*b);
                        }
                    }
                }
            }

            Operation::GroupCreate {
                id,
                name,
                created_by,
                members,
                created_at,
            } => {
                let mut unique = Vec::with_capacity(members.len());
                for member in members {
                    if !unique.contains(member) {
                        unique.push(*member);
                    }
                }
                self.groups.insert(
                    *id,
                    Group {
                        id: *id,
                        name: name.clone(),
                        created_by: *created_by,
                        members: unique,
                        created_at: *created_at,
                    },
                );
                self.last_group = self.last_group.max(id.0);
            }

            Operation::GroupRename { id, name } => {
                if let Some(group) = self.groups.get_mut(id) {
                    group.name = name.clone();
                }
            }

            Operation::GroupLeave { id, user_id } => {
                let Some(group) = self.groups.get_mut(id) else {
                    return;
                };
                group.members.retain(|member| member != user_id);
                if group.members.is_empty() {
                    self.remove_group(*id);
                }
            }

            Operation::GroupDelete { id } => {
                self.remove_group(*id);
            }

            Operation::MessageCreate {
                id,
                group_id,
                author,
                text,
                created_at,
            } => {
                self.messages.insert(
                    *id,
                    Message {
                        id: *id,
                        group_id: *group_id,
                        author: *author,
                        text: text.clone(),
                        created_at: *created_at,
                    },
                );
                self.last_message = self.last_message.max(id.0);
            }
        }
    }

    fn remove_group(&mut self, id: GroupId) {
        self.groups.remove(&id);
        self.messages.retain(|_, message| message.group_id != id);
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
