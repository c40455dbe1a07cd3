// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    admission = { PublishError::AdmissionDenied { category: Category::Single, window: "hour", count: 2, ceiling: 2 }, ErrorKind::AdmissionDenied },
    exhausted = { PublishError::ResourceExhausted { job: "publish", budget_ms: 90_000 }, ErrorKind::ResourceExhausted },
    rejected = { PublishError::SubmitRejected("duplicate".into()), ErrorKind::SubmitRejected },
    timeout = { PublishError::ConfirmationTimeout("no response".into()), ErrorKind::ConfirmationTimeout },
    unavailable = { PublishError::ChannelUnavailable("offline".into()), ErrorKind::ChannelUnavailable },
    partial = { PublishError::PartialThread { posted: 2, expected: 4, reason: "rejected".into() }, ErrorKind::PartialThread },
)]
fn kind_matches_variant(error: PublishError, kind: ErrorKind) {
    assert_eq!(error.kind(), kind);
}

#[test]
fn only_confirmation_timeout_is_ambiguous() {
    assert!(PublishError::ConfirmationTimeout("x".into()).is_ambiguous());
    assert!(!PublishError::SubmitRejected("x".into()).is_ambiguous());
    assert!(!PublishError::ChannelUnavailable("x".into()).is_ambiguous());
}

#[test]
fn admission_denied_message_names_window() {
    let error = PublishError::AdmissionDenied {
        category: Category::Thread,
        window: "day",
        count: 6,
        ceiling: 6,
    };
    assert_eq!(
        error.to_string(),
        "rate ceiling reached for thread: 6/6 per day"
    );
}

#[test]
fn kind_serializes_snake_case() {
    let json = serde_json::to_string(&ErrorKind::ConfirmationTimeout).unwrap();
    assert_eq!(json, "\"confirmation_timeout\"");
}
