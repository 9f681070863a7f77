// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `chatty watch`: follow a user's live events across daemon restarts
//!
//! The daemon never replays missed events, so every time the link comes back
//! the watcher refetches each view it has shown (the user's groups and each
//! group's latest messages) before streaming again.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chatty_core::{
    Connection, ConnectionEvent, ConnectionState, Event, Group, GroupId, Message, ReconnectPolicy,
    RecoveryEffect, UserId, View,
};
use chatty_engine::Page;
use chatty_server::SubscriptionRequest;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::{ClientError, DaemonClient, EventStream};
use crate::output::{self, EventRow, GroupRow, MessageRow, OutputFormat};

#[derive(clap::Args)]
pub struct WatchArgs {
    /// User to watch as
    #[arg(long = "as")]
    pub user: UserId,

    /// Messages fetched per group after (re)connecting
    #[arg(long, default_value = "20")]
    pub first: usize,

    /// Give up after this many consecutive failed reconnect attempts
    #[arg(long)]
    pub max_retries: Option<u32>,
}

/// Fresh state for one view
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum Refetched {
    GroupMessages {
        group_id: GroupId,
        messages: Vec<Message>,
    },
    UserGroups {
        user_id: UserId,
        groups: Vec<Group>,
    },
}

/// What the watcher reports as it runs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "update", rename_all = "snake_case")]
pub enum WatchUpdate {
    Connected,
    Event { event: Event },
    Refetched { state: Refetched },
    Lost,
    Retrying { attempt: u32, delay_ms: u64 },
}

impl fmt::Display for WatchUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchUpdate::Connected => write!(f, "-- connected"),
            WatchUpdate::Event { event } => write!(f, "{}", EventRow(event.clone())),
            WatchUpdate::Refetched {
                state: Refetched::GroupMessages { group_id, messages },
            } => {
                write!(f, "-- group {} ({} messages)", group_id, messages.len())?;
                for message in messages.iter().rev() {
                    write!(f, "\n{}", MessageRow(message.clone()))?;
                }
                Ok(())
            }
            WatchUpdate::Refetched {
                state: Refetched::UserGroups { user_id, groups },
            } => {
                write!(f, "-- groups of {} ({})", user_id, groups.len())?;
                for group in groups {
                    write!(f, "\n{}", GroupRow(group.clone()))?;
                }
                Ok(())
            }
            WatchUpdate::Lost => write!(f, "-- connection lost"),
            WatchUpdate::Retrying { attempt, delay_ms } => {
                write!(f, "-- reconnecting (attempt {}) in {}ms", attempt, delay_ms)
            }
        }
    }
}

/// A live event source; `None` means the link is gone
#[async_trait]
pub trait Feed: Send {
    async fn next(&mut self) -> Option<Event>;
}

/// Transport seam between the watcher and the daemon
#[async_trait]
pub trait Link: Send + Sync {
    /// Open every subscription `user` needs
    async fn connect(&self, user: UserId) -> Result<Box<dyn Feed>, ClientError>;

    /// Query the full current state of `view`
    async fn refetch(&self, view: &View) -> Result<Refetched, ClientError>;
}

/// Drives a [`Connection`] against a [`Link`]
pub struct Watcher<L: Link> {
    link: L,
    user: UserId,
    connection: Connection,
    max_retries: Option<u32>,
}

impl<L: Link> Watcher<L> {
    pub fn new(link: L, user: UserId, policy: ReconnectPolicy, max_retries: Option<u32>) -> Self {
        let mut connection = Connection::new(policy);
        connection.watch_view(View::user_groups(user));
        Self {
            link,
            user,
            connection,
            max_retries,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Stream until reconnecting is abandoned or a non-transport error occurs
    pub async fn run<F>(&mut self, mut sink: F) -> Result<(), ClientError>
    where
        F: FnMut(WatchUpdate) + Send,
    {
        let mut delay = None;
        loop {
            let mut feed = self.establish(delay.take(), &mut sink).await?;

            while let Some(event) = feed.next().await {
                let mut new_group = None;
                if let Event::GroupAdded { group } = &event {
                    if self.connection.watch_view(View::group_messages(group.id)) {
                        new_group = Some(group.id);
                    }
                }
                sink(WatchUpdate::Event { event });
                if let Some(group_id) = new_group {
                    // the feed subscribed to the group before yielding its event
                    if !self.refetch(View::group_messages(group_id), &mut sink).await? {
                        break;
                    }
                }
            }

            drop(feed);
            sink(WatchUpdate::Lost);
            delay = retry_delay(&self.connection.transition(ConnectionEvent::Lost));
        }
    }

    /// Reconnect (after `delay`, if any) and refetch every view
    async fn establish<F>(
        &mut self,
        mut delay: Option<Duration>,
        sink: &mut F,
    ) -> Result<Box<dyn Feed>, ClientError>
    where
        F: FnMut(WatchUpdate) + Send,
    {
        loop {
            if let Some(delay) = delay.take() {
                let attempt = match self.connection.state() {
                    ConnectionState::Disconnected { attempt } => attempt + 1,
                    _ => 1,
                };
                sink(WatchUpdate::Retrying {
                    attempt,
                    delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                });
                tokio::time::sleep(delay).await;
            }

            self.connection.transition(ConnectionEvent::RetryStarted);
            let attempt = match self.connection.state() {
                ConnectionState::Reconnecting { attempt } => attempt,
                _ => 0,
            };

            // subscribe before refetching so nothing falls between the two
            let feed = match self.link.connect(self.user).await {
                Ok(feed) => feed,
                Err(e) if e.is_disconnect() => {
                    debug!(attempt, error = %e, "reconnect attempt failed");
                    if self.max_retries.is_some_and(|max| attempt > max) {
                        return Err(ClientError::RetriesExhausted(attempt));
                    }
                    delay =
                        retry_delay(&self.connection.transition(ConnectionEvent::AttemptFailed));
                    continue;
                }
                Err(e) => return Err(e),
            };

            let effects = self.connection.transition(ConnectionEvent::Established);
            sink(WatchUpdate::Connected);

            let mut healthy = true;
            for effect in effects {
                if let RecoveryEffect::Refetch { view } = effect {
                    if !self.refetch(view, sink).await? {
                        healthy = false;
                        break;
                    }
                }
            }
            if healthy {
                return Ok(feed);
            }

            drop(feed);
            sink(WatchUpdate::Lost);
            delay = retry_delay(&self.connection.transition(ConnectionEvent::Lost));
        }
    }

    /// Refetch one view; `Ok(false)` means the link dropped meanwhile
    ///
    /// A fresh group list starts watching (and fetches) the messages of any
    /// group not yet watched, including groups joined while disconnected.
    async fn refetch<F>(&mut self, view: View, sink: &mut F) -> Result<bool, ClientError>
    where
        F: FnMut(WatchUpdate) + Send,
    {
        let mut pending = VecDeque::from([view]);
        while let Some(view) = pending.pop_front() {
            match self.link.refetch(&view).await {
                Ok(state) => {
                    if let Refetched::UserGroups { groups, .. } = &state {
                        for group in groups {
                            let messages = View::group_messages(group.id);
                            if self.connection.watch_view(messages) {
                                pending.push_back(messages);
                            }
                        }
                    }
                    sink(WatchUpdate::Refetched { state });
                }
                Err(e) if e.is_disconnect() => return Ok(false),
                Err(ClientError::Rejected(message)) => {
                    // e.g. the group was deleted while we were away
                    warn!(%view, %message, "dropping view");
                    self.connection.unwatch_view(&view);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(true)
    }
}

fn retry_delay(effects: &[RecoveryEffect]) -> Option<Duration> {
    effects.iter().find_map(|effect| match effect {
        RecoveryEffect::ScheduleRetry { delay } => Some(*delay),
        RecoveryEffect::Refetch { .. } => None,
    })
}

/// [`Link`] backed by the daemon socket
pub struct DaemonLink {
    client: DaemonClient,
    page_size: usize,
}

impl DaemonLink {
    pub fn new(client: DaemonClient, page_size: usize) -> Self {
        Self { client, page_size }
    }
}

#[async_trait]
impl Link for DaemonLink {
    async fn connect(&self, user: UserId) -> Result<Box<dyn Feed>, ClientError> {
        let groups = self
            .client
            .subscribe(SubscriptionRequest::GroupAdded { user_id: user })
            .await?;
        let messages = self
            .client
            .subscribe(SubscriptionRequest::MessageAdded {
                user_id: user,
                group_ids: vec![],
            })
            .await?;

        let (tx, rx) = mpsc::channel(64);
        let tasks = TaskSet(vec![
            tokio::spawn(forward(messages, tx.clone())),
            tokio::spawn(forward_groups(self.client.clone(), user, groups, tx)),
        ]);
        Ok(Box::new(DaemonFeed { rx, _tasks: tasks }))
    }

    async fn refetch(&self, view: &View) -> Result<Refetched, ClientError> {
        match *view {
            View::GroupMessages { group_id } => {
                let page = Page {
                    first: Some(self.page_size),
                    before: None,
                };
                let messages = self.client.messages(group_id, page).await?;
                Ok(Refetched::GroupMessages { group_id, messages })
            }
            View::UserGroups { user_id } => {
                let groups = self.client.groups_for_user(user_id).await?;
                Ok(Refetched::UserGroups { user_id, groups })
            }
        }
    }
}

/// Merges the per-topic streams; `None` on the channel marks a closed stream
struct DaemonFeed {
    rx: mpsc::Receiver<Option<Event>>,
    _tasks: TaskSet,
}

#[async_trait]
impl Feed for DaemonFeed {
    async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await.flatten()
    }
}

/// Aborts the tasks it holds when dropped
struct TaskSet(Vec<JoinHandle<()>>);

impl Drop for TaskSet {
    fn drop(&mut self) {
        for task in &self.0 {
            task.abort();
        }
    }
}

async fn forward(mut stream: EventStream, tx: mpsc::Sender<Option<Event>>) {
    loop {
        match stream.next_event().await {
            Ok(Some(event)) => {
                if tx.send(Some(event)).await.is_err() {
                    return;
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "event stream failed");
                break;
            }
        }
    }
    let _ = tx.send(None).await;
}

/// Forward group events, subscribing to each new group's messages first
///
/// The message subscription opened at connect time only covers the groups
/// the user belonged to then.
async fn forward_groups(
    client: DaemonClient,
    user: UserId,
    mut stream: EventStream,
    tx: mpsc::Sender<Option<Event>>,
) {
    let mut children = TaskSet(Vec::new());
    loop {
        let event = match stream.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "group stream failed");
                break;
            }
        };
        if let Event::GroupAdded { group } = &event {
            let request = SubscriptionRequest::MessageAdded {
                user_id: user,
                group_ids: vec![group.id],
            };
            match client.subscribe(request).await {
                Ok(messages) => children.0.push(tokio::spawn(forward(messages, tx.clone()))),
                Err(e) => {
                    debug!(error = %e, group_id = %group.id, "subscribe failed");
                    break;
                }
            }
        }
        if tx.send(Some(event)).await.is_err() {
            return;
        }
    }
    let _ = tx.send(None).await;
}

pub async fn handle(
    args: WatchArgs,
    client: DaemonClient,
    policy: ReconnectPolicy,
    format: OutputFormat,
) -> Result<(), ClientError> {
    let link = DaemonLink::new(client, args.first);
    let mut watcher = Watcher::new(link, args.user, policy, args.max_retries);
    watcher
        .run(|update| output::print_line(&update, format))
        .await
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
