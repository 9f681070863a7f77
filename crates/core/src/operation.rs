// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operations for the write-ahead log
//!
//! Each operation carries every id and timestamp it introduces, so replaying
//! the log rebuilds byte-identical state.

use crate::model::{GroupId, MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operations that can be persisted to the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Register a user
    UserCreate {
        id: UserId,
        username: String,
        email: String,
    },

    /// Make two users friends (symmetric)
    FriendAdd { user_id: UserId, friend_id: UserId },

    /// Create a group; `members` includes the creator
    GroupCreate {
        id: GroupId,
        name: String,
        created_by: UserId,
        members: Vec<UserId>,
        created_at: DateTime<Utc>,
    },

    /// Rename a group
    GroupRename { id: GroupId, name: String },

    /// Remove a member; the group is deleted with its last member
    GroupLeave { id: GroupId, user_id: UserId },

    /// Delete a group and its messages
    GroupDelete { id: GroupId },

    /// Post a message into a group
    MessageCreate {
        id: MessageId,
        group_id: GroupId,
        author: UserId,
        text: String,
        created_at: DateTime<Utc>,
    },
}

impl Operation {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::UserCreate { .. } => "user_create",
            Operation::FriendAdd { .. } => "friend_add",
            Operation::GroupCreate { .. } => "group_create",
            Operation::GroupRename { .. } => "group_rename",
            Operation::GroupLeave { .. } => "group_leave",
            Operation::GroupDelete { .. } => "group_delete",
            Operation::MessageCreate { .. } => "message_create",
        }
    }
}

#[cfg(test)]
#[path = "operation_tests.rs"]
mod tests;
