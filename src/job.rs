//! The job contract: zero-argument work submitted to a scheduler.

/// Work that can be submitted to a [`Cron`](crate::Cron) scheduler.
///
/// Implemented for any `Fn() + Send + Sync` closure, so plain functions and
/// closures can be passed wherever a `Job` is expected. Implement it
/// directly when the job carries state of its own:
///
/// ```rust
/// use chronotab::Job;
///
/// struct Reminder {
///     message: String,
/// }
///
/// impl Job for Reminder {
///     fn run(&self) {
///         println!("{}", self.message);
///     }
/// }
/// ```
pub trait Job: Send + Sync {
    /// Invoke the work. Called on a dedicated worker thread each time the
    /// job's schedule fires; expected to return when the work is done.
    fn run(&self);
}

impl<F> Job for F
where
    F: Fn() + Send + Sync,
{
    fn run(&self) {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingJob {
        hits: Arc<AtomicUsize>,
    }

    impl Job for CountingJob {
        fn run(&self) {
            self.hits.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn closures_are_jobs() {
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = Arc::clone(&hits);
        let job: Arc<dyn Job> = Arc::new(move || {
            hits2.fetch_add(1, Ordering::SeqCst);
        });
        job.run();
        job.run();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn structs_are_jobs() {
        let hits = Arc::new(AtomicUsize::new(0));
        let job = CountingJob {
            hits: Arc::clone(&hits),
        };
        job.run();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
