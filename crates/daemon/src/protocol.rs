// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire protocol between the CLI and the daemon
//!
//! Every frame is a 4-byte big-endian length followed by that many bytes of
//! JSON. A connection carries one request and one response, except
//! `Subscribe`, which is answered with `Subscribed` followed by one `Event`
//! frame per delivered payload until either side closes.

use std::time::Duration;

use chatty_core::{Event, Group, GroupId, Message, Topic, User, UserId};
use chatty_engine::{Page, ServiceStats};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Version reported in `Hello`
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default read/write timeout for a single frame
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Frames larger than this are rejected before allocating
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Client requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    Hello { version: String },
    Ping,
    Status,
    Query { query: Query },
    Mutation { mutation: Mutation },
    Subscribe { subscription: SubscriptionRequest },
    Shutdown,
}

/// Read-only lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Query {
    User { id: UserId },
    UserByEmail { email: String },
    Users,
    Friends { user_id: UserId },
    Group { id: GroupId },
    GroupsForUser { user_id: UserId },
    Messages {
        group_id: GroupId,
        #[serde(default)]
        page: Page,
    },
}

/// State-changing requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    CreateUser {
        username: String,
        email: String,
    },
    AddFriend {
        user_id: UserId,
        friend_id: UserId,
    },
    CreateMessage {
        user_id: UserId,
        group_id: GroupId,
        text: String,
    },
    CreateGroup {
        user_id: UserId,
        name: String,
        #[serde(default)]
        member_ids: Vec<UserId>,
    },
    UpdateGroup {
        group_id: GroupId,
        name: String,
    },
    LeaveGroup {
        user_id: UserId,
        group_id: GroupId,
    },
    DeleteGroup {
        group_id: GroupId,
    },
}

/// Topic subscriptions, with the subscriber's filter arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "topic", rename_all = "kebab-case")]
pub enum SubscriptionRequest {
    /// Empty `group_ids` means the user's current groups
    MessageAdded {
        user_id: UserId,
        #[serde(default)]
        group_ids: Vec<GroupId>,
    },
    GroupAdded {
        user_id: UserId,
    },
}

impl SubscriptionRequest {
    pub fn topic(&self) -> Topic {
        match self {
            SubscriptionRequest::MessageAdded { .. } => Topic::MessageAdded,
            SubscriptionRequest::GroupAdded { .. } => Topic::GroupAdded,
        }
    }
}

/// Daemon responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Hello { version: String },
    Pong,
    Status { uptime_secs: u64, stats: ServiceStats },
    Ok,
    User { user: User },
    Users { users: Vec<User> },
    Group { group: Group },
    Groups { groups: Vec<Group> },
    Message { message: Message },
    Messages { messages: Vec<Message> },
    Subscribed { topic: Topic },
    Event { event: Event },
    ShuttingDown,
    Error { message: String },
}

/// Protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Frame of {size} bytes exceeds limit of {max}")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Timeout")]
    Timeout,
}

/// Serialize a message body (no length prefix)
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(value)?)
}

/// Deserialize a message body
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Write one length-prefixed frame
pub async fn write_message<W>(writer: &mut W, data: &[u8]) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    if data.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: data.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    let len = u32::try_from(data.len()).map_err(|_| ProtocolError::FrameTooLarge {
        size: data.len(),
        max: MAX_FRAME_SIZE,
    })?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame
///
/// EOF before the length prefix is `ConnectionClosed`.
pub async fn read_message<R>(reader: &mut R) -> Result<Vec<u8>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_SIZE,
        });
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data).await?;
    Ok(data)
}

/// Read and decode a request within `timeout`
pub async fn read_request<R>(reader: &mut R, timeout: Duration) -> Result<Request, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

/// Encode and write a request within `timeout`
pub async fn write_request<W>(
    writer: &mut W,
    request: &Request,
    timeout: Duration,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let data = encode(request)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

/// Read and decode a response within `timeout`
pub async fn read_response<R>(reader: &mut R, timeout: Duration) -> Result<Response, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let bytes = tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)??;
    decode(&bytes)
}

/// Encode and write a response within `timeout`
pub async fn write_response<W>(
    writer: &mut W,
    response: &Response,
    timeout: Duration,
) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
{
    let data = encode(response)?;
    tokio::time::timeout(timeout, write_message(writer, &data))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
