//! Job decorator chains.
//!
//! A chain wraps every job submitted to a scheduler with a fixed stack of
//! decorators, in the manner of HTTP middleware. The base scheduler installs
//! an empty chain; hosts add their own wrappers for cross-cutting policies
//! such as retry, overlap-skipping or timing.

use std::fmt;
use std::sync::Arc;

use crate::job::Job;

/// A decorator from one job to another.
pub type JobWrapper = Arc<dyn Fn(Arc<dyn Job>) -> Arc<dyn Job> + Send + Sync>;

/// An ordered stack of [`JobWrapper`]s. Immutable once constructed.
#[derive(Clone, Default)]
pub struct Chain {
    wrappers: Vec<JobWrapper>,
}

impl Chain {
    /// Build a chain from the given wrappers.
    pub fn new(wrappers: Vec<JobWrapper>) -> Chain {
        Chain { wrappers }
    }

    /// Decorate `job` with all wrappers in the chain.
    ///
    /// `Chain::new(vec![w1, w2, w3]).then(job)` yields `w1(w2(w3(job)))`,
    /// so the first wrapper in the list is the outermost one and observes
    /// every invocation before the rest of the stack.
    pub fn then(&self, job: Arc<dyn Job>) -> Arc<dyn Job> {
        self.wrappers.iter().rev().fold(job, |job, wrapper| wrapper(job))
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("wrappers", &self.wrappers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // A wrapper that records its label before delegating to the inner job.
    fn recording_wrapper(label: &'static str, trace: Arc<Mutex<Vec<&'static str>>>) -> JobWrapper {
        Arc::new(move |inner: Arc<dyn Job>| {
            let trace = Arc::clone(&trace);
            Arc::new(move || {
                trace.lock().unwrap().push(label);
                inner.run();
            }) as Arc<dyn Job>
        })
    }

    #[test]
    fn empty_chain_is_identity() {
        let trace: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let t = Arc::clone(&trace);
        let job: Arc<dyn Job> = Arc::new(move || t.lock().unwrap().push("job"));

        Chain::default().then(job).run();
        assert_eq!(*trace.lock().unwrap(), vec!["job"]);
    }

    #[test]
    fn first_wrapper_is_outermost() {
        let trace: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
        let chain = Chain::new(vec![
            recording_wrapper("outer", Arc::clone(&trace)),
            recording_wrapper("middle", Arc::clone(&trace)),
            recording_wrapper("inner", Arc::clone(&trace)),
        ]);

        let t = Arc::clone(&trace);
        let job: Arc<dyn Job> = Arc::new(move || t.lock().unwrap().push("job"));

        chain.then(job).run();
        assert_eq!(
            *trace.lock().unwrap(),
            vec!["outer", "middle", "inner", "job"]
        );
    }
}
