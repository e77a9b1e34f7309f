//! Time sources for message timestamps.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Source of "now" for an actor.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock of the host.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock.
///
/// Lets two actors run with deliberately skewed time, which is the case the
/// merge tolerance has to absorb.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at `start`.
    #[must_use]
    pub const fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock to an absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = instant;
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.lock().map_or_else(|poisoned| *poisoned.into_inner(), |guard| *guard)
    }
}

/// Timestamp for a new local message that never sorts before `last`.
///
/// The local clock may lag behind timestamps written by the other actor; a
/// message composed after reading those must still land after them.
#[must_use]
pub fn next_timestamp(clock: &dyn Clock, last: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let now = clock.now();
    match last {
        Some(last) if last > now => last,
        _ => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances() {
        let start = Utc.timestamp_millis_opt(1_000).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(chrono::Duration::milliseconds(500));
        assert_eq!(clock.now().timestamp_millis(), 1_500);
        clock.set(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn test_next_timestamp_never_goes_back() {
        let clock = ManualClock::new(Utc.timestamp_millis_opt(1_000).unwrap());
        let ahead = Utc.timestamp_millis_opt(5_000).unwrap();
        assert_eq!(next_timestamp(&clock, Some(ahead)), ahead);
        assert_eq!(next_timestamp(&clock, None), clock.now());
        let behind = Utc.timestamp_millis_opt(10).unwrap();
        assert_eq!(next_timestamp(&clock, Some(behind)), clock.now());
    }
}
