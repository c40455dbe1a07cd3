// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol unit tests

use super::*;
use courier_core::{Content, ReplyTarget};

#[test]
fn enqueue_request_carries_the_decision() {
    let request = Request::Enqueue {
        decision: NewDecision {
            id: Some("dec-1".to_string()),
            category: Category::Reply,
            content: Content::Text("thanks!".to_string()),
            reply_to: Some(ReplyTarget {
                item_id: "item-9".to_string(),
                author: "someone".to_string(),
            }),
            scheduled_at: None,
        },
    };

    let encoded = encode(&request).expect("encode failed");
    let decoded: Request = decode(&encoded).expect("decode failed");

    assert_eq!(request, decoded);
}

#[test]
fn requests_are_tagged_by_type() {
    let encoded = encode(&Request::Query {
        query: Query::ListDecisions {
            status: Some(DecisionStatus::Queued),
        },
    })
    .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&encoded).unwrap();

    assert_eq!(json["type"], "Query");
    assert_eq!(json["query"]["type"], "ListDecisions");
    assert_eq!(json["query"]["status"], "queued");
}

#[test]
fn unfiltered_listing_omits_status() {
    let request: Request =
        decode(br#"{"type":"Query","query":{"type":"ListReceipts"}}"#).unwrap();
    assert_eq!(
        request,
        Request::Query {
            query: Query::ListReceipts { status: None }
        }
    );
}

#[test]
fn unknown_request_type_is_an_error() {
    let result: Result<Request, _> = decode(br#"{"type":"Publish"}"#);
    assert!(matches!(result, Err(ProtocolError::Json(_))));
}

#[test]
fn summary_copies_the_decision_row() {
    let at = "2026-01-01T00:00:00Z".parse().unwrap();
    let decision = Decision::single("dec-1", "hello", at);

    let summary = DecisionSummary::from(&decision);

    assert_eq!(summary.id, "dec-1");
    assert_eq!(summary.category, Category::Single);
    assert_eq!(summary.status, DecisionStatus::Queued);
    assert_eq!(summary.scheduled_at, at);
    assert!(summary.identifiers.is_empty());
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

    let len = u32::from_be_bytes([buffer[0], buffer[1], buffer[2], buffer[3]]) as usize;
    assert_eq!(len, data.len());
    assert_eq!(&buffer[4..], data);
}

#[tokio::test]
async fn oversized_prefix_is_rejected_before_reading_body() {
    let mut buffer = ((MAX_MESSAGE_SIZE + 1) as u32).to_be_bytes().to_vec();
    buffer.extend_from_slice(b"{}");

    let mut cursor = std::io::Cursor::new(buffer);
    let result = read_message(&mut cursor).await;

    assert!(matches!(
        result,
        Err(ProtocolError::MessageTooLarge { .. })
    ));
}

#[tokio::test]
async fn empty_stream_is_connection_closed() {
    let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
    assert!(matches!(
        read_message(&mut cursor).await,
        Err(ProtocolError::ConnectionClosed)
    ));
}

#[tokio::test(start_paused = true)]
async fn silent_client_times_out() {
    let (_client, mut server) = tokio::io::duplex(64);
    let result = read_request(&mut server, DEFAULT_TIMEOUT).await;
    assert!(matches!(result, Err(ProtocolError::Timeout)));
}
