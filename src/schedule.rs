//! The schedule contract: given a reference instant, compute the next
//! instant the schedule is satisfied.

use chrono::DateTime;
use chrono_tz::Tz;

use crate::delay::{ConstantDelaySchedule, OnceSchedule};
use crate::spec_schedule::SpecSchedule;

/// A schedule computing the next firing instant after a reference instant.
///
/// Values are produced by [`Parser::parse`](crate::Parser::parse) and are
/// structurally comparable, so parsing the same spec twice yields equal
/// schedules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Schedule {
    /// A cron expression evaluated field-by-field in its own timezone.
    Spec(SpecSchedule),
    /// A fixed repeat interval (`@every`).
    Every(ConstantDelaySchedule),
    /// A single absolute target instant.
    Once(OnceSchedule),
}

impl Schedule {
    /// The earliest instant strictly after `after` at which this schedule
    /// fires, or `None` when it will never fire again.
    pub fn next(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        match self {
            Schedule::Spec(s) => s.next(after),
            Schedule::Every(s) => s.next(after),
            Schedule::Once(s) => s.next(after),
        }
    }
}
