use std::cmp::Ordering;
use std::pin::Pin;
use std::sync::Arc;

use chrono::DateTime;
use chrono_tz::Tz;
use core::fmt;
use futures::Future;

use crate::entry::EntryId;
use crate::schedule::Schedule;

pub type TaskFuture = Box<dyn Future<Output = ()> + Send>;

pub trait TaskFuturePinned {
    fn get_pinned(&self) -> Pin<TaskFuture>;
}

pub struct TaskWrapper<F>(F);

impl<F> TaskWrapper<F> {
    pub fn new(f: F) -> Self {
        TaskWrapper(f)
    }
}

impl<F, T> TaskFuturePinned for TaskWrapper<F>
where
    F: Fn() -> T,
    T: Future<Output = ()> + Send + 'static,
{
    fn get_pinned(&self) -> Pin<TaskFuture> {
        Box::pin(self.0())
    }
}

/// A scheduled async job plus its timing metadata.
#[derive(Clone)]
pub struct AsyncEntry {
    pub id: EntryId,
    pub schedule: Schedule,
    pub next: Option<DateTime<Tz>>,
    pub prev: Option<DateTime<Tz>>,
    pub run: Arc<dyn TaskFuturePinned + Send + Sync>,
}

impl fmt::Debug for AsyncEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncEntry")
            .field("id", &self.id)
            .field("schedule", &self.schedule)
            .field("next", &self.next)
            .field("prev", &self.prev)
            .finish()
    }
}

impl AsyncEntry {
    pub fn get_next(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.schedule.next(now)
    }
}

/// Earliest `next` first; entries with no pending fire last.
pub(crate) fn by_time(a: &AsyncEntry, b: &AsyncEntry) -> Ordering {
    match (&a.next, &b.next) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.cmp(b),
    }
}
