// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Mutex;

use chatty_core::{Event, EventBus, FakeClock, GroupId, UserId};
use chatty_engine::ServiceDeps;
use chatty_storage::{ChatState, Wal};
use tempfile::{tempdir, TempDir};

use crate::protocol::{read_message, read_response, write_request, ProtocolError};

const TIMEOUT: Duration = Duration::from_secs(5);

fn context() -> (TempDir, Arc<ServerContext<FakeClock>>) {
    let dir = tempdir().unwrap();
    let wal = Wal::open(&dir.path().join("chatty.wal")).unwrap();
    let service = ChatService::new(
        ServiceDeps {
            wal: Arc::new(Mutex::new(wal)),
            state: Arc::new(Mutex::new(ChatState::default())),
            bus: EventBus::new(),
        },
        FakeClock::new(),
    );
    let (shutdown_tx, _) = watch::channel(false);
    let ctx = ServerContext {
        service: Arc::new(service),
        start_time: Instant::now(),
        request_timeout: TIMEOUT,
        shutdown_tx,
    };
    (dir, Arc::new(ctx))
}

/// ada(1) and grace(2) are friends and share group 1
fn seed(ctx: &ServerContext<FakeClock>) -> (UserId, UserId, GroupId) {
    let ada = ctx.service.create_user("ada", "ada@example.com").unwrap().id;
    let grace = ctx.service.create_user("grace", "grace@example.com").unwrap().id;
    ctx.service.add_friend(ada, grace).unwrap();
    let group = ctx.service.create_group(ada, "lab", &[grace]).unwrap().id;
    (ada, grace, group)
}

async fn roundtrip(ctx: &Arc<ServerContext<FakeClock>>, request: Request) -> Response {
    let (client, server) = UnixStream::pair().unwrap();
    let task_ctx = Arc::clone(ctx);
    let task = tokio::spawn(async move { handle_connection(&task_ctx, server).await });

    let (mut reader, mut writer) = client.into_split();
    write_request(&mut writer, &request, TIMEOUT).await.unwrap();
    let response = read_response(&mut reader, TIMEOUT).await.unwrap();

    task.await.unwrap().unwrap();
    response
}

async fn open_subscription(
    ctx: &Arc<ServerContext<FakeClock>>,
    subscription: SubscriptionRequest,
) -> (OwnedReadHalf, OwnedWriteHalf, Response) {
    let (client, server) = UnixStream::pair().unwrap();
    spawn_connection(Arc::clone(ctx), server);

    let (mut reader, mut writer) = client.into_split();
    write_request(&mut writer, &Request::Subscribe { subscription }, TIMEOUT)
        .await
        .unwrap();
    let first = read_response(&mut reader, TIMEOUT).await.unwrap();
    (reader, writer, first)
}

async fn wait_for_subscribers(ctx: &ServerContext<FakeClock>, expected: usize) {
    let deadline = Instant::now() + TIMEOUT;
    while ctx.service.bus().subscriber_count() != expected {
        assert!(Instant::now() < deadline, "subscriber count never reached {expected}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn ping_and_hello() {
    let (_dir, ctx) = context();

    assert_eq!(roundtrip(&ctx, Request::Ping).await, Response::Pong);
    assert_eq!(
        roundtrip(
            &ctx,
            Request::Hello {
                version: "0.0.0".to_string()
            }
        )
        .await,
        Response::Hello {
            version: PROTOCOL_VERSION.to_string()
        }
    );
}

#[tokio::test]
async fn mutation_then_query() {
    let (_dir, ctx) = context();

    let created = roundtrip(
        &ctx,
        Request::Mutation {
            mutation: Mutation::CreateUser {
                username: "ada".to_string(),
                email: "ada@example.com".to_string(),
            },
        },
    )
    .await;
    let Response::User { user } = created else {
        panic!("unexpected response: {created:?}");
    };

    let fetched = roundtrip(
        &ctx,
        Request::Query {
            query: Query::UserByEmail {
                email: "ada@example.com".to_string(),
            },
        },
    )
    .await;
    assert_eq!(fetched, Response::User { user });
}

#[tokio::test]
async fn service_errors_become_error_responses() {
    let (_dir, ctx) = context();

    let response = roundtrip(
        &ctx,
        Request::Query {
            query: Query::Group { id: GroupId(9) },
        },
    )
    .await;

    assert!(matches!(response, Response::Error { message } if message.contains('9')));
}

#[tokio::test]
async fn status_reports_counts() {
    let (_dir, ctx) = context();
    seed(&ctx);

    let response = roundtrip(&ctx, Request::Status).await;
    let Response::Status { stats, .. } = response else {
        panic!("unexpected response: {response:?}");
    };
    assert_eq!(stats.users, 2);
    assert_eq!(stats.groups, 1);
    assert_eq!(stats.subscribers, 0);
}

#[tokio::test]
async fn shutdown_request_sets_flag() {
    let (_dir, ctx) = context();
    assert!(!ctx.shutdown_requested());

    assert_eq!(roundtrip(&ctx, Request::Shutdown).await, Response::ShuttingDown);
    assert!(ctx.shutdown_requested());
}

#[tokio::test]
async fn subscription_streams_matching_events_without_own_messages() {
    let (_dir, ctx) = context();
    let (ada, grace, group) = seed(&ctx);

    let (mut reader, _writer, first) = open_subscription(
        &ctx,
        SubscriptionRequest::MessageAdded {
            user_id: grace,
            group_ids: vec![],
        },
    )
    .await;
    assert_eq!(
        first,
        Response::Subscribed {
            topic: chatty_core::Topic::MessageAdded
        }
    );

    ctx.service.create_message(ada, group, "one").unwrap();
    ctx.service.create_message(grace, group, "mine").unwrap();
    ctx.service.create_message(ada, group, "two").unwrap();

    let mut texts = Vec::new();
    for _ in 0..2 {
        match read_response(&mut reader, TIMEOUT).await.unwrap() {
            Response::Event {
                event: Event::MessageAdded { message },
            } => texts.push(message.text),
            other => panic!("unexpected frame: {other:?}"),
        }
    }
    assert_eq!(texts, vec!["one", "two"]);
}

#[tokio::test]
async fn group_subscription_excludes_creator() {
    let (_dir, ctx) = context();
    let (ada, grace, _) = seed(&ctx);

    let (mut ada_reader, _ada_writer, _) =
        open_subscription(&ctx, SubscriptionRequest::GroupAdded { user_id: ada }).await;
    let (mut grace_reader, _grace_writer, _) =
        open_subscription(&ctx, SubscriptionRequest::GroupAdded { user_id: grace }).await;

    let group = ctx.service.create_group(ada, "book club", &[grace]).unwrap();

    let frame = read_response(&mut grace_reader, TIMEOUT).await.unwrap();
    assert_eq!(
        frame,
        Response::Event {
            event: Event::GroupAdded { group }
        }
    );

    let nothing = tokio::time::timeout(
        Duration::from_millis(100),
        read_response(&mut ada_reader, TIMEOUT),
    )
    .await;
    assert!(nothing.is_err(), "creator should not be notified");
}

#[tokio::test]
async fn subscribing_unknown_user_returns_error() {
    let (_dir, ctx) = context();

    let (mut reader, _writer, first) =
        open_subscription(&ctx, SubscriptionRequest::GroupAdded { user_id: UserId(42) }).await;

    assert!(matches!(first, Response::Error { .. }));
    assert!(matches!(
        read_message(&mut reader).await,
        Err(ProtocolError::ConnectionClosed)
    ));
    assert_eq!(ctx.service.bus().subscriber_count(), 0);
}

#[tokio::test]
async fn client_disconnect_cancels_subscription() {
    let (_dir, ctx) = context();
    let (_, grace, _) = seed(&ctx);

    let (reader, writer, _) =
        open_subscription(&ctx, SubscriptionRequest::GroupAdded { user_id: grace }).await;
    wait_for_subscribers(&ctx, 1).await;

    drop(reader);
    drop(writer);

    wait_for_subscribers(&ctx, 0).await;
}

#[tokio::test]
async fn shutdown_closes_live_subscriptions() {
    let (_dir, ctx) = context();
    let (_, grace, _) = seed(&ctx);

    let (mut reader, _writer, _) =
        open_subscription(&ctx, SubscriptionRequest::GroupAdded { user_id: grace }).await;

    ctx.shutdown_tx.send_replace(true);

    let closed = tokio::time::timeout(TIMEOUT, read_message(&mut reader))
        .await
        .unwrap();
    assert!(matches!(closed, Err(ProtocolError::ConnectionClosed)));
    wait_for_subscribers(&ctx, 0).await;
}

#[tokio::test]
async fn subscribe_after_shutdown_closes_immediately() {
    let (_dir, ctx) = context();
    let (_, grace, _) = seed(&ctx);
    ctx.shutdown_tx.send_replace(true);

    let (mut reader, _writer, first) =
        open_subscription(&ctx, SubscriptionRequest::GroupAdded { user_id: grace }).await;

    assert!(matches!(first, Response::Subscribed { .. }));
    assert!(matches!(
        read_message(&mut reader).await,
        Err(ProtocolError::ConnectionClosed)
    ));
}
