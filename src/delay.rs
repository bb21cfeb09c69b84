//! Schedules that do not use calendar arithmetic: fixed delays and
//! one-time targets.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;

/// A schedule that fires at a constant interval, produced by `@every`.
///
/// The delay is always at least one second and is truncated to whole
/// seconds; the engine operates in whole seconds throughout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConstantDelaySchedule {
    pub delay: StdDuration,
}

impl ConstantDelaySchedule {
    /// Build a schedule firing every `duration`, rounded down to whole
    /// seconds with a floor of one second.
    pub fn every(duration: StdDuration) -> ConstantDelaySchedule {
        if duration < StdDuration::from_secs(1) {
            return ConstantDelaySchedule {
                delay: StdDuration::from_secs(1),
            };
        }
        ConstantDelaySchedule {
            delay: StdDuration::from_secs(duration.as_secs()),
        }
    }

    /// The next fire instant: `after` plus the delay, with the sub-second
    /// remainder of `after` dropped so results land on whole seconds.
    pub fn next(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let delay = Duration::from_std(self.delay).ok()?;
        let subsec = (after.nanosecond() % 1_000_000_000) as i64;
        after
            .checked_add_signed(delay)?
            .checked_sub_signed(Duration::nanoseconds(subsec))
    }
}

/// A schedule that fires exactly once, at a fixed absolute instant.
///
/// Produced when a job is submitted with a target `DateTime` instead of a
/// textual expression. Once the target has passed, `next` reports that the
/// job will never fire again and the engine parks the entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OnceSchedule {
    pub at: DateTime<Utc>,
}

impl OnceSchedule {
    pub fn next(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let target = self.at.with_timezone(&after.timezone());
        if target > *after {
            Some(target)
        } else {
            None
        }
    }
}
