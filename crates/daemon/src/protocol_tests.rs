// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol unit tests

use super::*;
use chatty_core::MessageId;
use chrono::{TimeZone, Utc};

fn sample_message() -> Message {
    Message {
        id: MessageId(7),
        group_id: GroupId(2),
        author: UserId(1),
        text: "hello".to_string(),
        created_at: Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap(),
    }
}

#[test]
fn encode_decode_mutation_request() {
    let request = Request::Mutation {
        mutation: Mutation::CreateGroup {
            user_id: UserId(1),
            name: "hikers".to_string(),
            member_ids: vec![UserId(2), UserId(3)],
        },
    };

    let encoded = encode(&request).expect("encode failed");
    let decoded: Request = decode(&encoded).expect("decode failed");

    assert_eq!(request, decoded);
}

#[test]
fn encode_decode_event_response() {
    let response = Response::Event {
        event: Event::MessageAdded {
            message: sample_message(),
        },
    };

    let encoded = encode(&response).expect("encode failed");
    let decoded: Response = decode(&encoded).expect("decode failed");

    assert_eq!(response, decoded);
}

#[test]
fn encode_decode_status() {
    let response = Response::Status {
        uptime_secs: 3600,
        stats: ServiceStats {
            users: 3,
            groups: 1,
            messages: 10,
            subscribers: 2,
            wal_sequence: 14,
        },
    };

    let encoded = encode(&response).expect("encode failed");
    let decoded: Response = decode(&encoded).expect("decode failed");

    assert_eq!(response, decoded);
}

#[test]
fn request_wire_format_is_tagged() {
    let json = String::from_utf8(encode(&Request::Ping).unwrap()).unwrap();
    assert_eq!(json, r#"{"type":"Ping"}"#);

    let json = String::from_utf8(
        encode(&Request::Subscribe {
            subscription: SubscriptionRequest::GroupAdded { user_id: UserId(4) },
        })
        .unwrap(),
    )
    .unwrap();
    assert_eq!(
        json,
        r#"{"type":"Subscribe","subscription":{"topic":"group-added","user_id":4}}"#
    );
}

#[test]
fn optional_fields_default_when_missing() {
    let request: Request = decode(
        br#"{"type":"Query","query":{"kind":"messages","group_id":3}}"#,
    )
    .unwrap();
    assert_eq!(
        request,
        Request::Query {
            query: Query::Messages {
                group_id: GroupId(3),
                page: Page::default(),
            }
        }
    );

    let subscription: SubscriptionRequest =
        decode(br#"{"topic":"message-added","user_id":1}"#).unwrap();
    assert_eq!(subscription.topic(), Topic::MessageAdded);
    assert!(matches!(
        subscription,
        SubscriptionRequest::MessageAdded { group_ids, .. } if group_ids.is_empty()
    ));
}

#[test]
fn decode_rejects_unknown_request() {
    let result: Result<Request, _> = decode(br#"{"type":"Teleport"}"#);
    assert!(matches!(result, Err(ProtocolError::Json(_))));
}

#[test]
fn encode_returns_json_without_length_prefix() {
    let response = Response::Ok;
    let encoded = encode(&response).expect("encode failed");

    // encode() returns raw JSON, no length prefix
    let json_str = std::str::from_utf8(&encoded).expect("should be valid UTF-8");
    assert!(
        json_str.starts_with('{'),
        "should be JSON object: {}",
        json_str
    );
}

#[tokio::test]
async fn read_write_message_roundtrip() {
    let original = b"hello world";

    let mut buffer = Vec::new();
    write_message(&mut buffer, original)
        .await
        .expect("write failed");

    // write_message adds 4-byte length prefix
    assert_eq!(buffer.len(), 4 + original.len());

    let mut cursor = std::io::Cursor::new(buffer);
    let read_back = read_message(&mut cursor).await.expect("read failed");

    assert_eq!(read_back, original);
}

#[tokio::test]
async fn write_message_adds_length_prefix() {
    let data = b"test data";

    let mut buffer = Vec::new();
    write_message(&mut buffer, data)
        .await
        .expect("write failed");

    // First 4 bytes are the length prefix
    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;

    assert_eq!(len, data.len());
    assert_eq!(&buffer[4..], data);
}

#[tokio::test]
async fn read_message_on_empty_stream_is_connection_closed() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
    let result = read_message(&mut cursor).await;
    assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));
}

#[tokio::test]
async fn oversized_frame_is_rejected_before_reading_body() {
    let len = (MAX_FRAME_SIZE as u32 + 1).to_be_bytes();
    let mut cursor = std::io::Cursor::new(len.to_vec());
    let result = read_message(&mut cursor).await;
    assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
}

#[tokio::test]
async fn truncated_body_is_an_io_error() {
    let mut frame = 10u32.to_be_bytes().to_vec();
    frame.extend_from_slice(b"short");
    let mut cursor = std::io::Cursor::new(frame);
    assert!(matches!(
        read_message(&mut cursor).await,
        Err(ProtocolError::Io(_))
    ));
}

#[tokio::test]
async fn request_and_response_helpers() {
    let mut buffer = Vec::new();
    write_response(&mut buffer, &Response::Pong, DEFAULT_TIMEOUT)
        .await
        .unwrap();

    let mut frame = Vec::new();
    write_message(&mut frame, &encode(&Request::Status).unwrap())
        .await
        .unwrap();
    let mut cursor = std::io::Cursor::new(frame);
    let request = read_request(&mut cursor, DEFAULT_TIMEOUT).await.unwrap();

    assert_eq!(request, Request::Status);
    assert_eq!(&buffer[4..], br#"{"type":"Pong"}"#);
}
