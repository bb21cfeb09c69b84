//! The scheduler engine.
//!
//! A [`Cron`] owns a set of entries and runs a single event-loop thread
//! that waits for the earliest pending fire or an incoming command,
//! whichever comes first. Due jobs are dispatched onto fresh worker
//! threads, so the loop itself never blocks on job execution.

use std::mem;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use crossbeam_channel::{bounded, select, Receiver, Sender};
use crossbeam_utils::sync::WaitGroup;
use tracing::{error, info};

use crate::chain::Chain;
use crate::entry::{by_time, Entry, EntryId};
use crate::job::Job;
use crate::parser::{Parser, SpecInput};
use crate::schedule::Schedule;
use crate::{Result, MAX_WAIT_SECONDS};

/// Completion token returned by [`Cron::stop`].
///
/// The engine loop has already been told to exit when this token is
/// handed out; [`wait`](StopToken::wait) additionally blocks until every
/// worker thread dispatched before the stop has returned.
pub struct StopToken {
    workers: WaitGroup,
}

impl StopToken {
    /// Block until all in-flight jobs have finished.
    pub fn wait(self) {
        self.workers.wait();
    }
}

/// A cron job scheduler.
///
/// Jobs are added with a schedule expression and executed on their own
/// worker threads as they come due. All operations are safe to call
/// concurrently from any thread; the handle is cheap to clone and clones
/// share the same engine.
///
/// # Examples
///
/// ```rust,no_run
/// use chrono_tz::Tz;
/// use chronotab::Cron;
///
/// let cron = Cron::new(Tz::UTC);
/// let job_id = cron.add_fn("*/5 * * * *", || {
///     println!("every five minutes");
/// }).unwrap();
///
/// cron.start();
/// // ...
/// cron.remove(job_id);
/// cron.stop().wait();
/// ```
#[derive(Clone)]
pub struct Cron {
    /// Live entries, shared with the loop thread.
    entries: Arc<Mutex<Vec<Entry>>>,
    /// Decorators applied to each job at insertion time.
    chain: Chain,
    /// Guards the running flag and serializes command submission.
    running: Arc<Mutex<bool>>,
    /// Timezone used when a spec carries no `TZ=` prefix.
    tz: Tz,
    /// Translates spec inputs into schedules.
    parser: Parser,
    /// Source of monotonically increasing entry ids.
    next_id: Arc<AtomicUsize>,
    /// Counts in-flight worker threads; swapped out on stop.
    job_waiter: Arc<Mutex<WaitGroup>>,
    add: (Sender<Entry>, Receiver<Entry>),
    remove: (Sender<EntryId>, Receiver<EntryId>),
    snapshot: (Sender<Sender<Vec<Entry>>>, Receiver<Sender<Vec<Entry>>>),
    stop: (Sender<()>, Receiver<()>),
}

impl Cron {
    /// Create a scheduler evaluating unprefixed specs in `tz`, with the
    /// standard five-field parser and an empty decorator chain.
    pub fn new(tz: Tz) -> Cron {
        Cron {
            entries: Arc::new(Mutex::new(Vec::new())),
            chain: Chain::default(),
            running: Arc::new(Mutex::new(false)),
            tz,
            parser: Parser::standard(),
            next_id: Arc::new(AtomicUsize::new(0)),
            job_waiter: Arc::new(Mutex::new(WaitGroup::new())),
            add: bounded(0),
            remove: bounded(0),
            snapshot: bounded(0),
            stop: bounded(0),
        }
    }

    /// Replace the spec parser. Only affects jobs added afterwards.
    pub fn with_parser(mut self, parser: Parser) -> Cron {
        self.parser = parser;
        self
    }

    /// Install a decorator chain applied to every job added afterwards.
    pub fn with_chain(mut self, chain: Chain) -> Cron {
        self.chain = chain;
        self
    }

    /// Add a function to run on the given schedule.
    ///
    /// `spec` is either a textual expression or an absolute
    /// [`chrono::DateTime`] for one-time execution. Returns the id of the
    /// new entry.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`](crate::Error) when the spec does not parse; no
    /// entry is installed in that case.
    pub fn add_fn<F>(&self, spec: impl Into<SpecInput>, f: F) -> Result<EntryId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.add_job(spec, f)
    }

    /// Add a [`Job`] to run on the given schedule.
    pub fn add_job(&self, spec: impl Into<SpecInput>, job: impl Job + 'static) -> Result<EntryId> {
        let input = spec.into();
        let schedule = self.parser.parse(&input, self.tz)?;
        Ok(self.schedule(schedule, job))
    }

    /// Add a job with a pre-built [`Schedule`], bypassing the parser.
    pub fn schedule(&self, schedule: Schedule, job: impl Job + 'static) -> EntryId {
        let job: Arc<dyn Job> = Arc::new(job);

        let running = self.running.lock().unwrap();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = Entry {
            id,
            schedule,
            next: None,
            prev: None,
            wrapped_job: self.chain.then(Arc::clone(&job)),
            job,
        };

        if *running {
            // Hand the entry to the loop; it recomputes `next` on receipt.
            let _ = self.add.0.send(entry);
        } else {
            self.entries.lock().unwrap().push(entry);
        }
        id
    }

    /// Remove an entry by id. Removing an unknown id is a silent no-op.
    pub fn remove(&self, id: EntryId) {
        let running = self.running.lock().unwrap();
        if *running {
            let _ = self.remove.0.send(id);
            return;
        }
        self.remove_entry(id);
    }

    /// A deep-copied snapshot of the live entries. Mutating the result has
    /// no effect on the engine.
    pub fn entries(&self) -> Vec<Entry> {
        let running = self.running.lock().unwrap();
        if *running {
            let (reply_tx, reply_rx) = bounded(1);
            if self.snapshot.0.send(reply_tx).is_ok() {
                return reply_rx.recv().unwrap_or_default();
            }
            return Vec::new();
        }
        self.entries.lock().unwrap().clone()
    }

    /// Start the engine loop on a background thread. Calling `start` on a
    /// running engine is a silent no-op.
    pub fn start(&self) {
        let mut running = self.running.lock().unwrap();
        if *running {
            return;
        }
        *running = true;

        let cron = self.clone();
        thread::spawn(move || {
            cron.run_loop();
        });
    }

    /// Run the engine loop on the calling thread, blocking until
    /// [`stop`](Self::stop) is called from elsewhere. A no-op when the
    /// engine is already running.
    pub fn run(&self) {
        {
            let mut running = self.running.lock().unwrap();
            if *running {
                return;
            }
            *running = true;
        }
        self.run_loop();
    }

    /// Stop the engine loop. Jobs already dispatched keep running; the
    /// returned token can be waited on for them to drain. The engine may
    /// be started again afterwards.
    pub fn stop(&self) -> StopToken {
        let mut running = self.running.lock().unwrap();
        if *running {
            let _ = self.stop.0.send(());
            *running = false;
        }

        let mut waiter = self.job_waiter.lock().unwrap();
        StopToken {
            workers: mem::replace(&mut *waiter, WaitGroup::new()),
        }
    }

    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    fn remove_entry(&self, id: EntryId) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(index) = entries.iter().position(|e| e.id == id) {
            entries.remove(index);
        }
    }

    /// Launch a job body on a fresh worker thread, registered with the
    /// wait-group. A panicking job is logged and discarded; it must not
    /// take the engine down with it.
    fn start_job(&self, job: Arc<dyn Job>) {
        let worker = self.job_waiter.lock().unwrap().clone();
        thread::spawn(move || {
            if panic::catch_unwind(AssertUnwindSafe(|| job.run())).is_err() {
                error!("job panicked");
            }
            drop(worker);
        });
    }

    /// The engine loop. One iteration: sort entries by next fire, arm a
    /// timer for the head (or a far-future sentinel when nothing is
    /// pending), then wait for the timer or a command.
    fn run_loop(&self) {
        info!("start cron");

        let mut now = self.now();
        {
            let mut entries = self.entries.lock().unwrap();
            for entry in entries.iter_mut() {
                entry.next = entry.get_next(&now);
            }
        }

        loop {
            now = self.now();

            let timer = {
                let mut entries = self.entries.lock().unwrap();
                entries.sort_by(by_time);

                match entries.first().and_then(|e| e.next) {
                    Some(next) => {
                        // A head already in the past fires immediately.
                        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                        crossbeam_channel::after(wait)
                    }
                    None => crossbeam_channel::after(Duration::from_secs(MAX_WAIT_SECONDS)),
                }
            };

            'commands: loop {
                select! {
                    recv(timer) -> _ => {
                        now = self.now();
                        let mut entries = self.entries.lock().unwrap();
                        for entry in entries.iter_mut() {
                            match entry.next {
                                Some(next) if next <= now => {
                                    self.start_job(Arc::clone(&entry.wrapped_job));
                                    entry.prev = entry.next;
                                    entry.next = entry.get_next(&now);
                                }
                                _ => break,
                            }
                        }
                        break 'commands;
                    },
                    recv(self.add.1) -> msg => {
                        if let Ok(mut entry) = msg {
                            now = self.now();
                            entry.next = entry.get_next(&now);
                            self.entries.lock().unwrap().push(entry);
                        }
                        break 'commands;
                    },
                    recv(self.remove.1) -> msg => {
                        if let Ok(id) = msg {
                            now = self.now();
                            self.remove_entry(id);
                        }
                        break 'commands;
                    },
                    recv(self.snapshot.1) -> msg => {
                        // Answer and keep waiting on the same armed timer.
                        if let Ok(reply) = msg {
                            let _ = reply.send(self.entries.lock().unwrap().clone());
                        }
                        continue 'commands;
                    },
                    recv(self.stop.1) -> _ => {
                        return;
                    },
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_monotonically() {
        let cron = Cron::new(Tz::UTC);
        let mut last = 0;
        for _ in 0..5 {
            let id = cron.add_fn("@every 1m", || {}).unwrap();
            assert!(id > last);
            last = id;
        }
    }

    #[test]
    fn invalid_specs_install_nothing() {
        let cron = Cron::new(Tz::UTC);
        assert!(cron.add_fn("not a spec", || {}).is_err());
        assert!(cron.entries().is_empty());
    }

    #[test]
    fn removing_an_unknown_id_is_a_no_op() {
        let cron = Cron::new(Tz::UTC);
        let id = cron.add_fn("@every 1m", || {}).unwrap();
        cron.remove(id + 100);
        assert_eq!(cron.entries().len(), 1);
    }

    #[test]
    fn pre_start_entries_have_no_next_fire_yet() {
        let cron = Cron::new(Tz::UTC);
        cron.add_fn("@every 1m", || {}).unwrap();
        let entries = cron.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].next.is_none());
    }

    #[test]
    fn stop_before_start_returns_an_immediate_token() {
        let cron = Cron::new(Tz::UTC);
        cron.stop().wait();
    }
}
