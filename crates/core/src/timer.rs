//! Countdown anchored to a fixed start instant.
//!
//! Remaining time is always recomputed from `started_at` and the current wall clock,
//! never by decrementing a counter, so late or skipped ticks (and process suspension)
//! cannot accumulate drift.

use chrono::{DateTime, Utc};

/// Result of a single timer tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerTick {
    /// Seconds left, clamped at zero.
    pub remaining_secs: u32,
    /// True on the one tick that first observes expiry.
    pub time_up: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownTimer {
    started_at: DateTime<Utc>,
    duration_secs: u32,
    expired: bool,
}

impl CountdownTimer {
    #[must_use]
    pub fn new(started_at: DateTime<Utc>, duration_secs: u32) -> Self {
        Self {
            started_at,
            duration_secs,
            expired: false,
        }
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    /// Whole seconds since `started_at`. Zero if `now` precedes the start.
    #[must_use]
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        u64::try_from((now - self.started_at).num_seconds()).unwrap_or(0)
    }

    #[must_use]
    pub fn remaining_secs(&self, now: DateTime<Utc>) -> u32 {
        let left = i64::from(self.duration_secs)
            .saturating_sub(i64::try_from(self.elapsed_secs(now)).unwrap_or(i64::MAX));
        u32::try_from(left.max(0)).unwrap_or(0)
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expired
    }

    /// Recompute remaining time; reports `time_up` exactly once.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TimerTick {
        let remaining_secs = self.remaining_secs(now);
        let time_up = remaining_secs == 0 && !self.expired;
        if time_up {
            self.expired = true;
        }
        TimerTick {
            remaining_secs,
            time_up,
        }
    }
}

/// Render seconds as `MM:SS`, or `H:MM:SS` past an hour.
#[must_use]
pub fn format_clock(secs: u32) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}
