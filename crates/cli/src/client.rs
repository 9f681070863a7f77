// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::PathBuf;
use std::time::Duration;

use chatty_core::{Event, Group, GroupId, Message, User, UserId};
use chatty_engine::{Page, ServiceStats};
use chatty_server::protocol::{self, ProtocolError};
use chatty_server::{Mutation, Query, Request, Response, SubscriptionRequest};
use thiserror::Error;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;

// Timeout configuration (env vars in milliseconds)
fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Timeout for a single request/response exchange
pub fn timeout_ipc() -> Duration {
    parse_duration_ms("CHATTY_TIMEOUT_IPC_MS").unwrap_or(protocol::DEFAULT_TIMEOUT)
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running")]
    DaemonNotRunning,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("Gave up after {0} reconnect attempts")]
    RetriesExhausted(u32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Failures that mean the link is down rather than the request was bad
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            ClientError::DaemonNotRunning
                | ClientError::Io(_)
                | ClientError::Protocol(ProtocolError::ConnectionClosed)
                | ClientError::Protocol(ProtocolError::Io(_))
                | ClientError::Protocol(ProtocolError::Timeout)
        )
    }
}

/// Daemon client
#[derive(Debug, Clone)]
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Client for the daemon at `socket_path` (no connection is made yet)
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    async fn open(&self) -> Result<UnixStream, ClientError> {
        if !self.socket_path.exists() {
            return Err(ClientError::DaemonNotRunning);
        }
        match UnixStream::connect(&self.socket_path).await {
            Ok(stream) => Ok(stream),
            Err(e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                Err(ClientError::DaemonNotRunning)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Send a request and receive a response
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        let stream = self.open().await?;
        let (mut reader, mut writer) = stream.into_split();

        protocol::write_request(&mut writer, &request, timeout_ipc()).await?;
        let response = protocol::read_response(&mut reader, timeout_ipc()).await?;
        Ok(response)
    }

    async fn query(&self, query: Query) -> Result<Response, ClientError> {
        match self.send(Request::Query { query }).await? {
            Response::Error { message } => Err(ClientError::Rejected(message)),
            other => Ok(other),
        }
    }

    async fn mutate(&self, mutation: Mutation) -> Result<Response, ClientError> {
        match self.send(Request::Mutation { mutation }).await? {
            Response::Error { message } => Err(ClientError::Rejected(message)),
            other => Ok(other),
        }
    }

    /// Open a live subscription
    ///
    /// The returned stream yields events until the daemon closes the
    /// connection.
    pub async fn subscribe(
        &self,
        subscription: SubscriptionRequest,
    ) -> Result<EventStream, ClientError> {
        let stream = self.open().await?;
        let (mut reader, mut writer) = stream.into_split();

        protocol::write_request(&mut writer, &Request::Subscribe { subscription }, timeout_ipc())
            .await?;
        match protocol::read_response(&mut reader, timeout_ipc()).await? {
            Response::Subscribed { .. } => Ok(EventStream {
                reader,
                _writer: writer,
            }),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Get daemon version via Hello handshake
    pub async fn hello(&self) -> Result<String, ClientError> {
        match self
            .send(Request::Hello {
                version: env!("CARGO_PKG_VERSION").to_string(),
            })
            .await?
        {
            Response::Hello { version } => Ok(version),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Get daemon status
    pub async fn status(&self) -> Result<(u64, ServiceStats), ClientError> {
        match self.send(Request::Status).await? {
            Response::Status { uptime_secs, stats } => Ok((uptime_secs, stats)),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    /// Request daemon shutdown
    pub async fn shutdown(&self) -> Result<(), ClientError> {
        match self.send(Request::Shutdown).await? {
            Response::Ok | Response::ShuttingDown => Ok(()),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn user(&self, id: UserId) -> Result<User, ClientError> {
        match self.query(Query::User { id }).await? {
            Response::User { user } => Ok(user),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn user_by_email(&self, email: &str) -> Result<User, ClientError> {
        let query = Query::UserByEmail {
            email: email.to_string(),
        };
        match self.query(query).await? {
            Response::User { user } => Ok(user),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn users(&self) -> Result<Vec<User>, ClientError> {
        match self.query(Query::Users).await? {
            Response::Users { users } => Ok(users),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn friends(&self, user_id: UserId) -> Result<Vec<User>, ClientError> {
        match self.query(Query::Friends { user_id }).await? {
            Response::Users { users } => Ok(users),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn group(&self, id: GroupId) -> Result<Group, ClientError> {
        match self.query(Query::Group { id }).await? {
            Response::Group { group } => Ok(group),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn groups_for_user(&self, user_id: UserId) -> Result<Vec<Group>, ClientError> {
        match self.query(Query::GroupsForUser { user_id }).await? {
            Response::Groups { groups } => Ok(groups),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn messages(&self, group_id: GroupId, page: Page) -> Result<Vec<Message>, ClientError> {
        match self.query(Query::Messages { group_id, page }).await? {
            Response::Messages { messages } => Ok(messages),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn create_user(&self, username: &str, email: &str) -> Result<User, ClientError> {
        let mutation = Mutation::CreateUser {
            username: username.to_string(),
            email: email.to_string(),
        };
        match self.mutate(mutation).await? {
            Response::User { user } => Ok(user),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn add_friend(&self, user_id: UserId, friend_id: UserId) -> Result<User, ClientError> {
        match self.mutate(Mutation::AddFriend { user_id, friend_id }).await? {
            Response::User { user } => Ok(user),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn send_message(
        &self,
        user_id: UserId,
        group_id: GroupId,
        text: &str,
    ) -> Result<Message, ClientError> {
        let mutation = Mutation::CreateMessage {
            user_id,
            group_id,
            text: text.to_string(),
        };
        match self.mutate(mutation).await? {
            Response::Message { message } => Ok(message),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn create_group(
        &self,
        user_id: UserId,
        name: &str,
        member_ids: Vec<UserId>,
    ) -> Result<Group, ClientError> {
        let mutation = Mutation::CreateGroup {
            user_id,
            name: name.to_string(),
            member_ids,
        };
        match self.mutate(mutation).await? {
            Response::Group { group } => Ok(group),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn rename_group(&self, group_id: GroupId, name: &str) -> Result<Group, ClientError> {
        let mutation = Mutation::UpdateGroup {
            group_id,
            name: name.to_string(),
        };
        match self.mutate(mutation).await? {
            Response::Group { group } => Ok(group),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn leave_group(&self, user_id: UserId, group_id: GroupId) -> Result<Group, ClientError> {
        match self.mutate(Mutation::LeaveGroup { user_id, group_id }).await? {
            Response::Group { group } => Ok(group),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    pub async fn delete_group(&self, group_id: GroupId) -> Result<(), ClientError> {
        match self.mutate(Mutation::DeleteGroup { group_id }).await? {
            Response::Ok => Ok(()),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

/// Events pushed over one subscription connection
pub struct EventStream {
    reader: OwnedReadHalf,
    // dropping the write half tells the daemon we are gone
    _writer: OwnedWriteHalf,
}

impl EventStream {
    /// Next pushed event; `None` once the daemon closes the stream
    ///
    /// Not cancel-safe: a partially read frame is lost if the future is
    /// dropped.
    pub async fn next_event(&mut self) -> Result<Option<Event>, ClientError> {
        let bytes = match protocol::read_message(&mut self.reader).await {
            Ok(bytes) => bytes,
            Err(ProtocolError::ConnectionClosed) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match protocol::decode(&bytes)? {
            Response::Event { event } => Ok(Some(event)),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

/// Resolve the daemon socket the same way the daemon does
pub fn resolve_socket_path(
    explicit: Option<PathBuf>,
    settings: &chatty_core::ChattyConfig,
) -> anyhow::Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    let config = chatty_server::Config::load(settings)?;
    Ok(config.socket_path)
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
