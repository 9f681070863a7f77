// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the chat service

use chatty_core::{GroupId, UserId};
use chatty_storage::WalError;
use thiserror::Error;

/// Errors returned by [`crate::ChatService`] resolvers
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("user not found: {0}")]
    UserNotFound(UserId),
    #[error("group not found: {0}")]
    GroupNotFound(GroupId),
    #[error("user {user_id} is not a member of group {group_id}")]
    NotAMember { user_id: UserId, group_id: GroupId },
    #[error("users {user_id} and {other_id} are not friends")]
    NotFriends { user_id: UserId, other_id: UserId },
    #[error("message text is empty")]
    EmptyMessage,
    #[error("user already exists: {0}")]
    DuplicateUser(String),
    #[error("invalid argument: {0}")]
    Invalid(String),
    #[error("storage error: {0}")]
    Storage(#[from] WalError),
}
