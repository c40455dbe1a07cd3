// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use courier_core::{Clock, Decision, FakeClock, RateLimits};
use yare::parameterized;

fn t0() -> DateTime<Utc> {
    FakeClock::new().utc_now()
}

fn minutes(n: i64) -> DateTime<Utc> {
    t0() + TimeDelta::minutes(n)
}

fn governor(per_hour: Option<u32>, per_day: Option<u32>) -> RateGovernor {
    RateGovernor::new(RateConfig {
        single: RateLimits::new(per_hour, per_day),
        thread: RateLimits::new(Some(1), None),
        reply: RateLimits::default(),
    })
}

fn state(decisions: Vec<Decision>) -> MaterializedState {
    MaterializedState {
        decisions: decisions.into_iter().map(|d| (d.id.clone(), d)).collect(),
    }
}

fn queued(id: &str, at: DateTime<Utc>) -> Decision {
    Decision::single(id, format!("text for {id}"), at)
}

fn posted(id: &str, at: DateTime<Utc>) -> Decision {
    Decision {
        status: DecisionStatus::Posted,
        posted_at: Some(at),
        identifiers: vec![format!("post-{id}")],
        ..queued(id, at)
    }
}

fn posting(id: &str, at: DateTime<Utc>) -> Decision {
    Decision {
        status: DecisionStatus::Posting,
        claimed_at: Some(at),
        ..queued(id, at)
    }
}

#[test]
fn empty_state_admits() {
    let gov = governor(Some(2), Some(24));
    assert_eq!(
        gov.admit(&state(vec![]), Category::Single, t0()),
        Admission::Admitted
    );
}

#[test]
fn hour_ceiling_denies() {
    let gov = governor(Some(2), Some(24));
    let s = state(vec![posted("a", minutes(0)), posted("b", minutes(10))]);
    assert_eq!(
        gov.admit(&s, Category::Single, minutes(20)),
        Admission::Denied {
            window: Window::Hour,
            count: 2,
            ceiling: 2
        }
    );
}

#[parameterized(
    at_boundary = { 60, 2 },
    just_after = { 61, 1 },
    past_both = { 71, 0 },
)]
fn hour_window_is_inclusive(now_minute: i64, expected: u32) {
    let gov = governor(Some(2), Some(24));
    let s = state(vec![posted("a", minutes(0)), posted("b", minutes(10))]);
    assert_eq!(
        gov.window_usage(&s, Category::Single, minutes(now_minute)).hour,
        expected
    );
}

#[test]
fn in_flight_counts_toward_both_windows() {
    let gov = governor(Some(2), Some(24));
    let s = state(vec![posting("a", minutes(0)), posted("b", minutes(5))]);
    let usage = gov.window_usage(&s, Category::Single, minutes(6));
    assert_eq!(usage, WindowUsage { hour: 2, day: 2 });
    assert!(!gov.admit(&s, Category::Single, minutes(6)).is_admitted());
}

#[parameterized(
    fresh_claim = { 30, 1, 1 },
    claim_past_the_hour = { 3 * 60, 0, 1 },
    claim_past_the_day = { 51 * 60, 0, 0 },
)]
fn in_flight_claim_counts_only_inside_the_window(now_minute: i64, hour: u32, day: u32) {
    let gov = governor(Some(1), Some(24));
    let s = state(vec![posting("a", minutes(0))]);
    let usage = gov.window_usage(&s, Category::Single, minutes(now_minute));
    assert_eq!(usage, WindowUsage { hour, day });
}

#[test]
fn long_unresolved_claim_does_not_hold_the_ceiling() {
    let gov = governor(Some(1), None);
    let s = state(vec![posting("a", minutes(0)), queued("b", minutes(48 * 60))]);

    assert!(!gov.admit(&s, Category::Single, minutes(30)).is_admitted());
    assert!(gov.admit(&s, Category::Single, minutes(51 * 60)).is_admitted());
}

#[test]
fn day_ceiling_denies_when_hour_is_clear() {
    let gov = governor(Some(10), Some(3));
    let s = state(vec![
        posted("a", minutes(0)),
        posted("b", minutes(120)),
        posted("c", minutes(240)),
    ]);
    assert_eq!(
        gov.admit(&s, Category::Single, minutes(400)),
        Admission::Denied {
            window: Window::Day,
            count: 3,
            ceiling: 3
        }
    );
    assert!(gov
        .admit(&s, Category::Single, minutes(24 * 60 + 1))
        .is_admitted());
}

#[test]
fn categories_are_independent() {
    let gov = governor(Some(1), None);
    let s = state(vec![posted("a", minutes(0))]);
    assert!(!gov.admit(&s, Category::Single, minutes(1)).is_admitted());
    assert!(gov.admit(&s, Category::Thread, minutes(1)).is_admitted());
    assert!(gov.admit(&s, Category::Reply, minutes(1)).is_admitted());
}

#[test]
fn unlimited_category_always_admits() {
    let gov = governor(None, None);
    let s = state((0..100).map(|n| posted(&format!("d{n}"), minutes(0))).collect());
    assert!(gov.admit(&s, Category::Single, minutes(1)).is_admitted());
}

#[test]
fn plan_reserves_capacity_within_a_pass() {
    let gov = governor(Some(3), None);
    let s = state(
        (0..8)
            .map(|n| queued(&format!("d{n}"), minutes(n)))
            .collect(),
    );
    let plan = gov.plan(&s, minutes(10), 100);
    assert_eq!(plan.admitted, vec!["d0", "d1", "d2"]);
    assert_eq!(plan.deferred.len(), 5);
    assert!(plan.deferred.iter().all(|(_, a)| matches!(
        a,
        Admission::Denied {
            window: Window::Hour,
            ceiling: 3,
            ..
        }
    )));
}

#[test]
fn plan_respects_batch_limit_without_deferring() {
    let gov = governor(None, None);
    let s = state(
        (0..5)
            .map(|n| queued(&format!("d{n}"), minutes(n)))
            .collect(),
    );
    let plan = gov.plan(&s, minutes(10), 2);
    assert_eq!(plan.admitted, vec!["d0", "d1"]);
    assert!(plan.deferred.is_empty());
}

#[test]
fn plan_skips_not_yet_due() {
    let gov = governor(None, None);
    let s = state(vec![queued("now", minutes(5)), queued("later", minutes(6))]);
    let plan = gov.plan(&s, minutes(5), 10);
    assert_eq!(plan.admitted, vec!["now"]);
}

#[test]
fn plan_orders_by_schedule_then_id() {
    let gov = governor(None, None);
    let s = state(vec![
        queued("b", minutes(1)),
        queued("a", minutes(1)),
        queued("c", minutes(0)),
    ]);
    assert_eq!(gov.plan(&s, minutes(1), 10).admitted, vec!["c", "a", "b"]);
}

#[test]
fn two_per_hour_walkthrough() {
    let gov = governor(Some(2), Some(24));
    let mut s = state(vec![
        queued("m0", minutes(0)),
        queued("m10", minutes(10)),
        queued("m70", minutes(70)),
    ]);

    let publish = |s: &mut MaterializedState, now: DateTime<Utc>| -> Vec<String> {
        let plan = gov.plan(s, now, 10);
        for id in &plan.admitted {
            let d = s.decisions.get_mut(id).unwrap();
            d.status = DecisionStatus::Posted;
            d.posted_at = Some(now);
        }
        plan.admitted
    };

    assert_eq!(publish(&mut s, minutes(0)), vec!["m0"]);
    assert_eq!(publish(&mut s, minutes(10)), vec!["m10"]);
    assert!(publish(&mut s, minutes(60)).is_empty());
    assert_eq!(publish(&mut s, minutes(70)), vec!["m70"]);
}

#[test]
fn k_per_hour_holds_over_many_ticks() {
    let k = 3;
    let gov = governor(Some(k), None);
    let mut s = state(
        (0..k + 5)
            .map(|n| queued(&format!("d{n:02}"), minutes(0)))
            .collect(),
    );

    let mut published = Vec::new();
    for minute in 0..60 {
        let now = minutes(minute);
        for id in gov.plan(&s, now, 2).admitted {
            let d = s.decisions.get_mut(&id).unwrap();
            d.status = DecisionStatus::Posted;
            d.posted_at = Some(now);
            published.push(id);
        }
    }
    assert_eq!(published.len(), k as usize);
}

#[test]
fn ceiling_lookup() {
    let gov = governor(Some(2), None);
    assert_eq!(gov.ceiling(Category::Single, Window::Hour), Some(2));
    assert_eq!(gov.ceiling(Category::Single, Window::Day), None);
    assert_eq!(gov.ceiling(Category::Thread, Window::Hour), Some(1));
}

#[test]
fn denial_names_window_and_counts() {
    let denied = Admission::Denied {
        window: Window::Hour,
        count: 2,
        ceiling: 2,
    };
    let err = denied.denial(Category::Single).unwrap();
    assert_eq!(err.kind(), courier_core::ErrorKind::AdmissionDenied);
    assert_eq!(
        err.to_string(),
        "rate ceiling reached for single: 2/2 per hour"
    );
    assert!(Admission::Admitted.denial(Category::Single).is_none());
}
