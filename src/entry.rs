//! Scheduled job entries.
//!
//! An [`Entry`] is the live record of one scheduled job: its identifier,
//! its schedule, the last and next fire instants, and the job body both
//! bare and wrapped through the engine's decorator chain.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use chrono::DateTime;
use chrono_tz::Tz;

use crate::job::Job;
use crate::schedule::Schedule;

/// Opaque identifier assigned to each entry. Unique and monotonically
/// increasing within one engine's lifetime; never reused.
pub type EntryId = usize;

/// A scheduled job plus its timing metadata.
///
/// `next` is `None` when the entry has not been scheduled yet or will never
/// fire again; such entries sort after every entry with a pending fire.
#[derive(Clone)]
pub struct Entry {
    /// Identifier for removal and snapshot correlation.
    pub id: EntryId,

    /// Computes this entry's fire instants.
    pub schedule: Schedule,

    /// The next instant the job will run, in the engine's timezone.
    pub next: Option<DateTime<Tz>>,

    /// The instant the job last ran, if it has run at all.
    pub prev: Option<DateTime<Tz>>,

    /// The job as submitted.
    pub job: Arc<dyn Job>,

    /// The job decorated by the chain installed at insertion time. Later
    /// chain changes do not affect existing entries.
    pub wrapped_job: Arc<dyn Job>,
}

impl Entry {
    /// The next instant after `now` this entry's schedule is satisfied.
    pub fn get_next(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedule.next(now)
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("schedule", &self.schedule)
            .field("next", &self.next)
            .field("prev", &self.prev)
            .finish()
    }
}

/// Ordering for the engine's fire queue: earliest `next` first, entries
/// with no pending fire last.
pub(crate) fn by_time(a: &Entry, b: &Entry) -> Ordering {
    match (&a.next, &b.next) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.cmp(b),
    }
}
