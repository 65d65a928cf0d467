//! Cancellable timer slots for Stackfall's per-player simulation.
//!
//! A [`Timer`] is an owned slot that holds at most one pending deadline.
//! Arming a slot replaces whatever was pending, so there can never be two
//! live timers of the same kind for one player. Slots never spawn tasks:
//! the room actor asks every slot for its deadline, sleeps until the
//! earliest one, then fires what is due.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     let deadline = room.next_deadline();
//!     tokio::select! {
//!         Some(cmd) = commands.recv() => { /* handle command */ }
//!         () = stackfall_timer::sleep_until(deadline) => room.run_due(Instant::now()),
//!     }
//! }
//! ```
//!
//! With no deadline pending, [`sleep_until`] pends forever and the room is
//! purely event-driven.

use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

/// A single owned timer slot, one-shot or periodic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timer {
    deadline: Option<Instant>,
    period: Option<Duration>,
}

impl Timer {
    /// An idle slot.
    pub const fn idle() -> Self {
        Self {
            deadline: None,
            period: None,
        }
    }

    /// Fire once at `at`, replacing anything pending.
    pub fn arm_once(&mut self, at: Instant) {
        self.deadline = Some(at);
        self.period = None;
    }

    /// Fire every `period`, first at `now + period`, replacing anything pending.
    pub fn arm_every(&mut self, now: Instant, period: Duration) {
        self.deadline = Some(now + period);
        self.period = Some(period);
    }

    /// Drop the pending deadline, if any.
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.period = None;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Returns `true` if the slot had a deadline at or before `now`, and
    /// consumes exactly one firing.
    ///
    /// A periodic slot moves its deadline forward by one period, so a
    /// caller that woke late sees each missed tick in turn. A one-shot
    /// slot goes idle.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.deadline else {
            return false;
        };
        if deadline > now {
            return false;
        }

        match self.period {
            Some(period) => {
                self.deadline = Some(deadline + period);
                trace!(late_us = (now - deadline).as_micros() as u64, "periodic timer fired");
            }
            None => {
                self.deadline = None;
                trace!(late_us = (now - deadline).as_micros() as u64, "one-shot timer fired");
            }
        }
        true
    }
}

/// The earliest of a set of optional deadlines.
pub fn earliest<I>(deadlines: I) -> Option<Instant>
where
    I: IntoIterator<Item = Option<Instant>>,
{
    deadlines.into_iter().flatten().min()
}

/// Sleeps until `deadline`. With no deadline this future never resolves,
/// which lets `tokio::select!` keep serving its other branches.
pub async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_slot_never_fires() {
        let mut timer = Timer::idle();
        assert!(!timer.is_armed());
        assert!(!timer.fire_if_due(Instant::now()));
    }

    #[test]
    fn test_rearm_replaces_pending_deadline() {
        let now = Instant::now();
        let mut timer = Timer::idle();
        timer.arm_every(now, Duration::from_millis(1000));
        timer.arm_once(now + Duration::from_millis(50));
        assert_eq!(timer.deadline(), Some(now + Duration::from_millis(50)));
        assert_eq!(timer.period(), None);
    }

    #[test]
    fn test_earliest_skips_idle() {
        let now = Instant::now();
        let later = now + Duration::from_secs(1);
        assert_eq!(earliest([None, Some(later), Some(now), None]), Some(now));
        assert_eq!(earliest([None, None]), None);
    }
}
