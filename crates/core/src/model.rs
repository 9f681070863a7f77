// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat domain records
//!
//! Users belong to groups and post messages into them. Records are plain data;
//! all mutation goes through [`crate::Operation`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                $name(id)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse().map($name)
            }
        }
    };
}

entity_id!(
    /// Unique identifier for a user
    UserId
);
entity_id!(
    /// Unique identifier for a group
    GroupId
);
entity_id!(
    /// Unique identifier for a message
    MessageId
);

/// A registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub friends: Vec<UserId>,
}

impl User {
    pub fn is_friend(&self, other: UserId) -> bool {
        self.friends.contains(&other)
    }
}

/// A chat group
///
/// `members` always includes `created_by`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub created_by: UserId,
    pub members: Vec<UserId>,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn has_member(&self, user: UserId) -> bool {
        self.members.contains(&user)
    }
}

/// A message posted into a group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub group_id: GroupId,
    pub author: UserId,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
