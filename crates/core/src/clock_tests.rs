// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_returns_increasing_time() {
    let clock = SystemClock;
    let t1 = clock.now();
    std::thread::sleep(Duration::from_millis(1));
    let t2 = clock.now();
    assert!(t2 > t1);
}

#[test]
fn fake_clock_starts_at_fixed_utc() {
    let clock = FakeClock::new();
    assert_eq!(clock.utc_now().to_rfc3339(), "2026-01-01T00:00:00+00:00");
}

#[test]
fn fake_clock_advances_both_readings() {
    let clock = FakeClock::new();
    let t1 = clock.now();
    let u1 = clock.utc_now();
    clock.advance(Duration::from_secs(60));
    assert!(clock.now().duration_since(t1) >= Duration::from_secs(60));
    assert_eq!(clock.utc_now() - u1, TimeDelta::seconds(60));
}

#[test]
fn fake_clock_is_cloneable_and_shared() {
    let clock1 = FakeClock::new();
    let clock2 = clock1.clone();
    let u1 = clock1.utc_now();
    clock2.advance(Duration::from_secs(30));
    assert_eq!(clock1.utc_now() - u1, TimeDelta::seconds(30));
}

#[test]
fn set_utc_moves_monotonic_forward() {
    let clock = FakeClock::new();
    let t1 = clock.now();
    let target = clock.utc_now() + TimeDelta::minutes(10);
    clock.set_utc(target);
    assert_eq!(clock.utc_now(), target);
    assert!(clock.now().duration_since(t1) >= Duration::from_secs(600));
}

#[test]
fn to_time_delta_converts_seconds() {
    assert_eq!(
        to_time_delta(Duration::from_secs(90)),
        TimeDelta::seconds(90)
    );
}
