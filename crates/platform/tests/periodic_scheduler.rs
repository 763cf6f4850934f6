//! Periodic callout table: registration, dispatch cadence and the shared
//! interrupt-side wrapper.
//!
//! Callouts are plain `fn` pointers, so each test counts through its own
//! static.

#![allow(clippy::unwrap_used, clippy::arithmetic_side_effects, clippy::indexing_slicing)]

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use embassy_time::{Duration, Instant};
use platform::{PeriodicRegistrar, PeriodicScheduler, ScheduleError, SharedScheduler};

const MS: Duration = Duration::from_millis(1);

static FAST_HITS: AtomicU32 = AtomicU32::new(0);
static SLOW_HITS: AtomicU32 = AtomicU32::new(0);

fn fast(_: Instant) {
    FAST_HITS.fetch_add(1, Ordering::SeqCst);
}

fn slow(_: Instant) {
    SLOW_HITS.fetch_add(1, Ordering::SeqCst);
}

/// Two registrations keep their own cadence.
#[test]
fn registrations_are_independent() {
    let mut sched = PeriodicScheduler::<4>::new();
    let a = sched.call_every(MS, MS, fast).unwrap();
    let b = sched.call_every(MS * 5, MS * 5, slow).unwrap();
    assert_ne!(a, b);

    for ms in 1..=20 {
        sched.tick(Instant::from_millis(ms));
    }

    assert_eq!(FAST_HITS.load(Ordering::SeqCst), 20);
    assert_eq!(SLOW_HITS.load(Ordering::SeqCst), 4);
    assert_eq!(sched.invocations(a), Some(20));
    assert_eq!(sched.invocations(b), Some(4));
}

static LAST_DEADLINE_US: AtomicU64 = AtomicU64::new(0);
static ORDER_VIOLATIONS: AtomicU32 = AtomicU32::new(0);
static CADENCE_HITS: AtomicU32 = AtomicU32::new(0);

fn record_deadline(deadline: Instant) {
    let us = deadline.as_micros();
    let prev = LAST_DEADLINE_US.swap(us, Ordering::SeqCst);
    if us <= prev && CADENCE_HITS.load(Ordering::SeqCst) > 0 {
        ORDER_VIOLATIONS.fetch_add(1, Ordering::SeqCst);
    }
    CADENCE_HITS.fetch_add(1, Ordering::SeqCst);
}

/// N interval-spaced ticks produce N invocations with strictly increasing
/// scheduled deadlines, one interval apart.
#[test]
fn one_millisecond_poll_cadence() {
    let mut sched = PeriodicScheduler::<1>::new();
    let h = sched.call_every(MS, MS, record_deadline).unwrap();

    for ms in 1..=100 {
        assert_eq!(sched.tick(Instant::from_millis(ms)), 1);
    }

    assert_eq!(CADENCE_HITS.load(Ordering::SeqCst), 100);
    assert_eq!(ORDER_VIOLATIONS.load(Ordering::SeqCst), 0);
    assert_eq!(LAST_DEADLINE_US.load(Ordering::SeqCst), 100_000);
    assert_eq!(sched.deadline(h), Some(Instant::from_millis(101)));
}

/// Registration after the clock has advanced starts counting from then.
#[test]
fn late_registration_is_relative_to_now() {
    fn noop(_: Instant) {}
    let mut sched = PeriodicScheduler::<2>::new();
    sched.tick(Instant::from_millis(50));
    let h = sched.call_every(MS, MS, noop).unwrap();
    assert_eq!(sched.deadline(h), Some(Instant::from_millis(51)));
}

/// A full table reports `TableFull` and leaves existing calls untouched.
#[test]
fn full_table_keeps_existing_calls() {
    fn noop(_: Instant) {}
    let mut sched = PeriodicScheduler::<2>::new();
    sched.call_every(MS, MS, noop).unwrap();
    sched.call_every(MS, MS, noop).unwrap();
    assert_eq!(sched.call_every(MS, MS, noop), Err(ScheduleError::TableFull));
    assert_eq!(sched.len(), 2);
    assert_eq!(sched.tick(Instant::from_millis(1)), 2);
}

static SHARED: SharedScheduler<2> = SharedScheduler::new();
static NESTED_DISPATCHES: AtomicU32 = AtomicU32::new(0);
static OUTER_HITS: AtomicU32 = AtomicU32::new(0);

fn reenter(now: Instant) {
    OUTER_HITS.fetch_add(1, Ordering::SeqCst);
    // A tick arriving while callouts run must not dispatch again.
    let nested = SHARED.tick(now);
    NESTED_DISPATCHES.fetch_add(u32::try_from(nested).unwrap(), Ordering::SeqCst);
}

/// The shared table refuses to nest dispatch, and recovers afterwards.
#[test]
fn shared_scheduler_does_not_reenter() {
    let handle = SHARED.call_every(MS, MS, reenter).unwrap();

    assert_eq!(SHARED.tick(Instant::from_millis(1)), 1);
    assert_eq!(SHARED.tick(Instant::from_millis(2)), 1);

    assert_eq!(OUTER_HITS.load(Ordering::SeqCst), 2);
    assert_eq!(NESTED_DISPATCHES.load(Ordering::SeqCst), 0);
    assert_eq!(
        SHARED.with_table(|t| t.invocations(handle)).flatten(),
        Some(2)
    );
}

/// Registration through the shared table is visible to later ticks.
#[test]
fn shared_scheduler_registration_is_visible() {
    fn noop(_: Instant) {}
    let shared = SharedScheduler::<1>::new();
    let h = shared.call_every(MS * 2, MS, noop).unwrap();
    assert_eq!(shared.tick(Instant::from_millis(1)), 0);
    assert_eq!(shared.tick(Instant::from_millis(2)), 1);
    assert_eq!(shared.with_table(|t| t.len()), Some(1));
    assert_eq!(shared.with_table(|t| t.deadline(h)).flatten(), Some(Instant::from_millis(3)));
}
