// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.
//!
//! Each accepted connection runs on its own task, so a long-lived
//! subscription never blocks other clients.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chatty_core::{Clock, Subscription};
use chatty_engine::{ChatService, ServiceError};
use tokio::io::AsyncReadExt;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::protocol::{
    self, Mutation, Query, Request, Response, SubscriptionRequest, PROTOCOL_VERSION,
};

/// Everything a connection task needs
pub struct ServerContext<C: Clock> {
    pub service: Arc<ChatService<C>>,
    pub start_time: Instant,
    pub request_timeout: Duration,
    pub shutdown_tx: watch::Sender<bool>,
}

impl<C: Clock> ServerContext<C> {
    pub fn shutdown_requested(&self) -> bool {
        *self.shutdown_tx.borrow()
    }
}

/// Spawn a task serving one client connection
pub fn spawn_connection<C: Clock + 'static>(ctx: Arc<ServerContext<C>>, stream: UnixStream) {
    tokio::spawn(async move {
        if let Err(e) = handle_connection(&ctx, stream).await {
            error!("Error handling connection: {}", e);
        }
    });
}

/// Handle a single client connection
pub async fn handle_connection<C: Clock>(
    ctx: &ServerContext<C>,
    stream: UnixStream,
) -> Result<(), ServerError> {
    // Split stream for reading/writing
    let (mut reader, mut writer) = stream.into_split();

    // Read request with timeout
    let request = match protocol::read_request(&mut reader, ctx.request_timeout).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("Received request: {:?}", request);

    if let Request::Subscribe { subscription } = request {
        return serve_subscription(ctx, subscription, reader, writer).await;
    }

    // Handle request
    let response = handle_request(ctx, request);

    debug!("Sending response: {:?}", response);

    // Write response with timeout
    protocol::write_response(&mut writer, &response, ctx.request_timeout)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Handle a single request and return a response
fn handle_request<C: Clock>(ctx: &ServerContext<C>, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Query { query } => handle_query(&ctx.service, query),

        Request::Mutation { mutation } => handle_mutation(&ctx.service, mutation),

        Request::Shutdown => {
            ctx.shutdown_tx.send_replace(true);
            Response::ShuttingDown
        }

        Request::Status => Response::Status {
            uptime_secs: ctx.start_time.elapsed().as_secs(),
            stats: ctx.service.stats(),
        },

        Request::Subscribe { .. } => Response::Error {
            message: "subscribe must be the only request on a connection".to_string(),
        },
    }
}

/// Handle query requests
fn handle_query<C: Clock>(service: &ChatService<C>, query: Query) -> Response {
    let result = match query {
        Query::User { id } => service.user(id).map(|user| Response::User { user }),
        Query::UserByEmail { email } => Ok(match service.user_by_email(&email) {
            Some(user) => Response::User { user },
            None => Response::Error {
                message: format!("no user with email {}", email),
            },
        }),
        Query::Users => Ok(Response::Users {
            users: service.users(),
        }),
        Query::Friends { user_id } => service.friends(user_id).map(|users| Response::Users { users }),
        Query::Group { id } => service.group(id).map(|group| Response::Group { group }),
        Query::GroupsForUser { user_id } => service
            .groups_for_user(user_id)
            .map(|groups| Response::Groups { groups }),
        Query::Messages { group_id, page } => service
            .messages(group_id, page)
            .map(|messages| Response::Messages { messages }),
    };
    result.unwrap_or_else(error_response)
}

/// Handle mutation requests
fn handle_mutation<C: Clock>(service: &ChatService<C>, mutation: Mutation) -> Response {
    let result = match mutation {
        Mutation::CreateUser { username, email } => service
            .create_user(&username, &email)
            .map(|user| Response::User { user }),
        Mutation::AddFriend { user_id, friend_id } => service
            .add_friend(user_id, friend_id)
            .map(|user| Response::User { user }),
        Mutation::CreateMessage {
            user_id,
            group_id,
            text,
        } => service
            .create_message(user_id, group_id, &text)
            .map(|message| Response::Message { message }),
        Mutation::CreateGroup {
            user_id,
            name,
            member_ids,
        } => service
            .create_group(user_id, &name, &member_ids)
            .map(|group| Response::Group { group }),
        Mutation::UpdateGroup { group_id, name } => service
            .update_group(group_id, &name)
            .map(|group| Response::Group { group }),
        Mutation::LeaveGroup { user_id, group_id } => service
            .leave_group(user_id, group_id)
            .map(|group| Response::Group { group }),
        Mutation::DeleteGroup { group_id } => service.delete_group(group_id).map(|()| Response::Ok),
    };
    result.unwrap_or_else(error_response)
}

fn error_response(e: ServiceError) -> Response {
    if let ServiceError::Storage(e) = &e {
        error!("storage failure: {}", e);
    }
    Response::Error {
        message: e.to_string(),
    }
}

/// Stream events to the client until it disconnects or the stream ends
async fn serve_subscription<C: Clock>(
    ctx: &ServerContext<C>,
    request: SubscriptionRequest,
    mut reader: OwnedReadHalf,
    mut writer: OwnedWriteHalf,
) -> Result<(), ServerError> {
    let topic = request.topic();
    let subscription = match request {
        SubscriptionRequest::MessageAdded { user_id, group_ids } => {
            ctx.service.message_added(user_id, &group_ids)
        }
        SubscriptionRequest::GroupAdded { user_id } => ctx.service.group_added(user_id),
    };
    let mut subscription = match subscription {
        Ok(subscription) => subscription,
        Err(e) => {
            let response = error_response(e);
            protocol::write_response(&mut writer, &response, ctx.request_timeout).await?;
            return Ok(());
        }
    };

    protocol::write_response(&mut writer, &Response::Subscribed { topic }, ctx.request_timeout)
        .await?;
    info!(subscriber = %subscription.id(), %topic, "subscription opened");

    let result = pump_events(ctx, &mut subscription, &mut reader, &mut writer).await;

    subscription.cancel();
    info!(
        subscriber = %subscription.id(),
        %topic,
        reason = ?subscription.close_reason(),
        "subscription closed"
    );
    result
}

async fn pump_events<C: Clock>(
    ctx: &ServerContext<C>,
    subscription: &mut Subscription,
    reader: &mut OwnedReadHalf,
    writer: &mut OwnedWriteHalf,
) -> Result<(), ServerError> {
    let mut shutdown = ctx.shutdown_tx.subscribe();
    if *shutdown.borrow() {
        return Ok(());
    }
    let mut probe = [0u8; 64];

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else {
                    // evicted or bus gone; closing tells the client to recover
                    return Ok(());
                };
                protocol::write_response(writer, &Response::Event { event }, ctx.request_timeout)
                    .await?;
            }

            read = reader.read(&mut probe) => {
                match read {
                    Ok(0) | Err(_) => {
                        debug!(subscriber = %subscription.id(), "peer closed");
                        return Ok(());
                    }
                    // clients send nothing after subscribing
                    Ok(_) => {}
                }
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return Ok(());
                }
            }
        }
    }
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
