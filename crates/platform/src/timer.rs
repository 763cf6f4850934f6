//! Periodic callout table on the high-resolution timebase.
//!
//! Some receivers cannot raise an interrupt for bytes already sitting in
//! their DMA buffer, so they are drained by a fixed-rate callout instead. The
//! table here is the software half of that: registrations are kept in a
//! fixed-capacity table and dispatched from the timer tick.
//!
//! Registrations are permanent. A [`PeriodicPollHandle`] identifies a slot
//! for inspection only; there is no cancel path, and a registered callout
//! runs for the lifetime of the process.
//!
//! # Dispatch rules
//!
//! - A due call fires once per tick, then its deadline advances by exactly
//!   one interval. A late tick therefore catches up on later ticks instead of
//!   firing in a burst.
//! - Callouts run in timer-interrupt context: they must not block.
//! - [`SharedScheduler::tick`] collects due calls inside a critical section
//!   but runs them outside it, and refuses to nest: a tick that arrives while
//!   callouts are still running dispatches nothing.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::CriticalSectionMutex;
use embassy_time::{Duration, Instant};
use thiserror_no_std::Error;

/// Callout entry point. Receives the deadline it was scheduled for.
pub type Callout = fn(Instant);

/// Opaque reference to a registered periodic call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PeriodicPollHandle {
    slot: usize,
}

impl PeriodicPollHandle {
    /// Table slot backing this handle.
    pub fn slot(self) -> usize {
        self.slot
    }
}

/// Registration failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScheduleError {
    /// Every slot of the callout table is taken.
    #[error("callout table full")]
    TableFull,
    /// A zero interval would fire on every tick forever.
    #[error("periodic interval must be non-zero")]
    ZeroInterval,
    /// The shared table was already borrowed on this context, e.g. a
    /// registration from inside [`SharedScheduler::with_table`].
    #[error("callout table busy")]
    Busy,
}

/// Something periodic calls can be registered with.
pub trait PeriodicRegistrar {
    /// Call `callout` after `delay`, then every `interval`, forever.
    fn call_every(
        &mut self,
        delay: Duration,
        interval: Duration,
        callout: Callout,
    ) -> Result<PeriodicPollHandle, ScheduleError>;
}

#[derive(Clone, Copy)]
struct PeriodicCall {
    deadline: Instant,
    interval: Duration,
    callout: Callout,
    invocations: u32,
}

/// Fixed-capacity periodic callout table.
pub struct PeriodicScheduler<const N: usize> {
    calls: heapless::Vec<PeriodicCall, N>,
    now: Instant,
}

impl<const N: usize> Default for PeriodicScheduler<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> PeriodicScheduler<N> {
    /// Empty table with the clock at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            calls: heapless::Vec::new(),
            now: Instant::from_ticks(0),
        }
    }

    /// Time of the most recent tick.
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Number of registered calls.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Next deadline of a registered call.
    pub fn deadline(&self, handle: PeriodicPollHandle) -> Option<Instant> {
        self.calls.get(handle.slot).map(|c| c.deadline)
    }

    /// Interval of a registered call.
    pub fn interval(&self, handle: PeriodicPollHandle) -> Option<Duration> {
        self.calls.get(handle.slot).map(|c| c.interval)
    }

    /// How many times a call has been dispatched.
    pub fn invocations(&self, handle: PeriodicPollHandle) -> Option<u32> {
        self.calls.get(handle.slot).map(|c| c.invocations)
    }

    /// Advance the clock to `now` and remove every due call from the wait
    /// state, returning `(callout, scheduled_deadline)` pairs to run.
    ///
    /// The clock never moves backwards; an older `now` is ignored.
    pub fn take_due(&mut self, now: Instant) -> heapless::Vec<(Callout, Instant), N> {
        if now > self.now {
            self.now = now;
        }
        let now = self.now;

        let mut due = heapless::Vec::new();
        for call in self.calls.iter_mut().filter(|c| c.deadline <= now) {
            let scheduled = call.deadline;
            call.deadline = scheduled
                .checked_add(call.interval)
                .unwrap_or(Instant::MAX);
            call.invocations = call.invocations.saturating_add(1);
            // `due` has the same capacity as `calls`; this cannot overflow.
            let _ = due.push((call.callout, scheduled));
        }
        due
    }

    /// Advance the clock and run everything due. Returns how many callouts ran.
    pub fn tick(&mut self, now: Instant) -> usize {
        let due = self.take_due(now);
        for (callout, scheduled) in &due {
            callout(*scheduled);
        }
        due.len()
    }
}

impl<const N: usize> PeriodicRegistrar for PeriodicScheduler<N> {
    fn call_every(
        &mut self,
        delay: Duration,
        interval: Duration,
        callout: Callout,
    ) -> Result<PeriodicPollHandle, ScheduleError> {
        if interval.as_ticks() == 0 {
            return Err(ScheduleError::ZeroInterval);
        }
        let deadline = self.now.checked_add(delay).unwrap_or(Instant::MAX);
        let slot = self.calls.len();
        self.calls
            .push(PeriodicCall {
                deadline,
                interval,
                callout,
                invocations: 0,
            })
            .map_err(|_| ScheduleError::TableFull)?;
        Ok(PeriodicPollHandle { slot })
    }
}

struct SharedState<const N: usize> {
    table: PeriodicScheduler<N>,
    dispatching: bool,
}

/// Process-wide callout table, shared between bring-up and the timer
/// interrupt.
///
/// Meant to live in a `static`; every method takes `&self`.
pub struct SharedScheduler<const N: usize> {
    inner: CriticalSectionMutex<RefCell<SharedState<N>>>,
}

impl<const N: usize> Default for SharedScheduler<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SharedScheduler<N> {
    /// Empty shared table.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            inner: CriticalSectionMutex::new(RefCell::new(SharedState {
                table: PeriodicScheduler::new(),
                dispatching: false,
            })),
        }
    }

    /// Register a periodic call. See [`PeriodicRegistrar::call_every`].
    pub fn call_every(
        &self,
        delay: Duration,
        interval: Duration,
        callout: Callout,
    ) -> Result<PeriodicPollHandle, ScheduleError> {
        self.inner.lock(|state| match state.try_borrow_mut() {
            Ok(mut state) => state.table.call_every(delay, interval, callout),
            Err(_) => Err(ScheduleError::Busy),
        })
    }

    /// Timer-interrupt entry: collect due calls under the lock, run them with
    /// interrupts enabled. Returns how many callouts ran; `0` if a previous
    /// tick is still dispatching.
    pub fn tick(&self, now: Instant) -> usize {
        let due = self.inner.lock(|state| {
            let Ok(mut state) = state.try_borrow_mut() else {
                return None;
            };
            if state.dispatching {
                return None;
            }
            state.dispatching = true;
            Some(state.table.take_due(now))
        });

        let Some(due) = due else {
            return 0;
        };

        for (callout, scheduled) in &due {
            callout(*scheduled);
        }

        self.inner.lock(|state| {
            if let Ok(mut state) = state.try_borrow_mut() {
                state.dispatching = false;
            }
        });
        due.len()
    }

    /// Inspect the table under the lock.
    pub fn with_table<R>(&self, f: impl FnOnce(&PeriodicScheduler<N>) -> R) -> Option<R> {
        self.inner
            .lock(|state| state.try_borrow().ok().map(|state| f(&state.table)))
    }
}

impl<const N: usize> PeriodicRegistrar for &SharedScheduler<N> {
    fn call_every(
        &mut self,
        delay: Duration,
        interval: Duration,
        callout: Callout,
    ) -> Result<PeriodicPollHandle, ScheduleError> {
        (**self).call_every(delay, interval, callout)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn noop(_: Instant) {}

    const MS: Duration = Duration::from_millis(1);

    #[test]
    fn first_deadline_is_delay_after_registration() {
        let mut sched = PeriodicScheduler::<4>::new();
        let h = sched.call_every(MS, MS, noop).unwrap();
        assert_eq!(sched.deadline(h), Some(Instant::from_millis(1)));
        assert_eq!(sched.interval(h), Some(MS));
    }

    #[test]
    fn not_due_before_deadline() {
        let mut sched = PeriodicScheduler::<4>::new();
        let h = sched.call_every(MS, MS, noop).unwrap();
        assert_eq!(sched.tick(Instant::from_micros(999)), 0);
        assert_eq!(sched.invocations(h), Some(0));
    }

    #[test]
    fn late_tick_fires_once_and_catches_up() {
        let mut sched = PeriodicScheduler::<4>::new();
        let h = sched.call_every(MS, MS, noop).unwrap();
        // Three intervals late: one dispatch, deadline only advances by one.
        assert_eq!(sched.tick(Instant::from_millis(3)), 1);
        assert_eq!(sched.deadline(h), Some(Instant::from_millis(2)));
        assert_eq!(sched.tick(Instant::from_millis(3)), 1);
        assert_eq!(sched.tick(Instant::from_millis(3)), 1);
        assert_eq!(sched.tick(Instant::from_millis(3)), 0);
    }

    #[test]
    fn table_full_is_reported() {
        let mut sched = PeriodicScheduler::<1>::new();
        sched.call_every(MS, MS, noop).unwrap();
        assert_eq!(
            sched.call_every(MS, MS, noop),
            Err(ScheduleError::TableFull)
        );
    }

    #[test]
    fn registration_while_table_borrowed_is_busy() {
        let shared = SharedScheduler::<2>::new();
        let nested = shared.with_table(|_| {
            shared.call_every(Duration::from_millis(1), Duration::from_millis(1), noop)
        });
        assert_eq!(nested, Some(Err(ScheduleError::Busy)));
        // Nothing was registered, and the table is usable again afterwards.
        assert_eq!(shared.with_table(PeriodicScheduler::len), Some(0));
        assert!(shared
            .call_every(Duration::from_millis(1), Duration::from_millis(1), noop)
            .is_ok());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut sched = PeriodicScheduler::<1>::new();
        assert_eq!(
            sched.call_every(MS, Duration::from_ticks(0), noop),
            Err(ScheduleError::ZeroInterval)
        );
        assert!(sched.is_empty());
    }

    #[test]
    fn clock_never_moves_backwards() {
        let mut sched = PeriodicScheduler::<1>::new();
        sched.tick(Instant::from_millis(5));
        sched.tick(Instant::from_millis(2));
        assert_eq!(sched.now(), Instant::from_millis(5));
    }
}
