//! Asynchronous scheduler engine.
//!
//! A tokio-based variant of [`Cron`](crate::Cron): the event loop runs as a
//! task instead of a thread and due jobs are spawned as tokio tasks, so
//! long-running async jobs never block the loop or each other. The parser
//! and schedule evaluation are shared with the synchronous engine.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::select;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time as tokio_time;
use tracing::info;

use crate::async_entry::{by_time, AsyncEntry, TaskWrapper};
use crate::entry::EntryId;
use crate::parser::{Parser, SpecInput};
use crate::schedule::Schedule;
use crate::{Result, MAX_WAIT_SECONDS};

/// An asynchronous cron job scheduler.
///
/// Requires a tokio runtime. The handle is cheap to clone; clones share
/// the same engine.
///
/// # Examples
///
/// ```rust,no_run
/// use chrono_tz::Tz;
/// use chronotab::AsyncCron;
///
/// # #[tokio::main]
/// # async fn main() {
/// let cron = AsyncCron::new(Tz::UTC);
///
/// cron.add_fn("@every 5s", || async {
///     println!("every five seconds");
/// })
/// .await
/// .unwrap();
///
/// cron.start().await;
/// tokio::time::sleep(std::time::Duration::from_secs(30)).await;
/// cron.stop().await;
/// # }
/// ```
#[derive(Clone)]
pub struct AsyncCron {
    /// Live entries, shared with the loop task.
    entries: Arc<Mutex<Vec<AsyncEntry>>>,

    /// Source of monotonically increasing entry ids.
    next_id: Arc<AtomicUsize>,

    /// Whether the loop task is alive.
    running: Arc<AtomicBool>,

    /// Timezone used when a spec carries no `TZ=` prefix.
    tz: Tz,

    /// Translates spec inputs into schedules.
    parser: Parser,

    /// Command channels, populated while the loop runs.
    add_tx: Arc<Mutex<Option<mpsc::UnboundedSender<AsyncEntry>>>>,
    remove_tx: Arc<Mutex<Option<mpsc::UnboundedSender<EntryId>>>>,
    snapshot_tx: Arc<Mutex<Option<mpsc::UnboundedSender<oneshot::Sender<Vec<AsyncEntry>>>>>>,
    stop_tx: Arc<Mutex<Option<mpsc::UnboundedSender<()>>>>,
}

impl AsyncCron {
    /// Create a scheduler evaluating unprefixed specs in `tz`, with the
    /// standard five-field parser.
    pub fn new(tz: Tz) -> AsyncCron {
        AsyncCron {
            entries: Arc::new(Mutex::new(Vec::new())),
            next_id: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            tz,
            parser: Parser::standard(),
            add_tx: Default::default(),
            remove_tx: Default::default(),
            snapshot_tx: Default::default(),
            stop_tx: Default::default(),
        }
    }

    /// Replace the spec parser. Only affects jobs added afterwards.
    pub fn with_parser(mut self, parser: Parser) -> AsyncCron {
        self.parser = parser;
        self
    }

    /// Add an async function to run on the given schedule.
    ///
    /// # Errors
    ///
    /// Returns an [`Error`](crate::Error) when the spec does not parse; no
    /// entry is installed in that case.
    pub async fn add_fn<F, T>(&self, spec: impl Into<SpecInput>, f: F) -> Result<EntryId>
    where
        F: 'static + Fn() -> T + Send + Sync,
        T: 'static + Future<Output = ()> + Send,
    {
        let input = spec.into();
        let schedule = self.parser.parse(&input, self.tz)?;
        self.schedule(schedule, f).await
    }

    /// Add an async job with a pre-built [`Schedule`], bypassing the parser.
    pub async fn schedule<F, T>(&self, schedule: Schedule, f: F) -> Result<EntryId>
    where
        F: 'static + Fn() -> T + Send + Sync,
        T: 'static + Future<Output = ()> + Send,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;

        let mut entry = AsyncEntry {
            id,
            schedule,
            next: None,
            prev: None,
            run: Arc::new(TaskWrapper::new(f)),
        };
        let now = self.now();
        entry.next = entry.get_next(&now);

        // While running, hand the entry to the loop. A send can fail when
        // the loop exited after the running check; fall back to a direct
        // append, which the next loop startup will pick up.
        if self.running.load(Ordering::SeqCst) {
            let guard = self.add_tx.lock().await;
            if let Some(tx) = guard.as_ref() {
                match tx.send(entry) {
                    Ok(()) => return Ok(id),
                    Err(rejected) => {
                        drop(guard);
                        self.entries.lock().await.push(rejected.0);
                        return Ok(id);
                    }
                }
            }
        }

        self.entries.lock().await.push(entry);
        Ok(id)
    }

    /// Remove an entry by id. Removing an unknown id is a silent no-op.
    pub async fn remove(&self, id: EntryId) {
        if self.running.load(Ordering::SeqCst) {
            if let Some(tx) = self.remove_tx.lock().await.as_ref() {
                if tx.send(id).is_ok() {
                    return;
                }
            }
        }
        self.remove_entry(id).await;
    }

    /// A deep-copied snapshot of the live entries.
    pub async fn entries(&self) -> Vec<AsyncEntry> {
        if self.running.load(Ordering::SeqCst) {
            if let Some(tx) = self.snapshot_tx.lock().await.as_ref() {
                let (reply_tx, reply_rx) = oneshot::channel();
                if tx.send(reply_tx).is_ok() {
                    return reply_rx.await.unwrap_or_default();
                }
            }
        }
        self.entries.lock().await.clone()
    }

    /// Start the engine loop as a background tokio task. A no-op when the
    /// engine is already running.
    pub async fn start(&self) {
        let cron = self.clone();
        tokio::spawn(async move {
            cron.start_blocking().await;
        });
    }

    /// Run the engine loop in the current task, blocking until
    /// [`stop`](Self::stop) is called. A no-op when the engine is already
    /// running.
    pub async fn start_blocking(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("start cron");

        let (add_tx, mut add_rx) = mpsc::unbounded_channel();
        let (remove_tx, mut remove_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, mut snapshot_rx) = mpsc::unbounded_channel();
        let (stop_tx, mut stop_rx) = mpsc::unbounded_channel();

        {
            *self.add_tx.lock().await = Some(add_tx);
            *self.remove_tx.lock().await = Some(remove_tx);
            *self.snapshot_tx.lock().await = Some(snapshot_tx);
            *self.stop_tx.lock().await = Some(stop_tx);
        }

        let now = self.now();
        for entry in self.entries.lock().await.iter_mut() {
            entry.next = entry.get_next(&now);
        }

        loop {
            let now = self.now();

            let wait_duration = {
                let mut entries = self.entries.lock().await;
                entries.sort_by(by_time);

                match entries.first().and_then(|e| e.next) {
                    Some(next) => (next - now).to_std().unwrap_or(Duration::ZERO),
                    None => Duration::from_secs(MAX_WAIT_SECONDS),
                }
            };

            let timer = tokio_time::sleep(wait_duration);
            tokio::pin!(timer);

            'commands: loop {
                select! {
                    _ = &mut timer => {
                        let now = self.now();
                        for entry in self.entries.lock().await.iter_mut() {
                            match entry.next {
                                Some(next) if next <= now => {
                                    let run = Arc::clone(&entry.run);
                                    tokio::spawn(async move {
                                        run.as_ref().get_pinned().await;
                                    });
                                    entry.prev = entry.next;
                                    entry.next = entry.get_next(&now);
                                }
                                _ => break,
                            }
                        }
                        break 'commands;
                    },
                    new_entry = add_rx.recv() => {
                        if let Some(mut entry) = new_entry {
                            let now = self.now();
                            entry.next = entry.get_next(&now);
                            self.entries.lock().await.push(entry);
                        }
                        break 'commands;
                    },
                    id = remove_rx.recv() => {
                        if let Some(id) = id {
                            self.remove_entry(id).await;
                        }
                        break 'commands;
                    },
                    reply = snapshot_rx.recv() => {
                        // Answer and keep waiting on the same armed timer.
                        match reply {
                            Some(reply) => {
                                let _ = reply.send(self.entries.lock().await.clone());
                                continue 'commands;
                            }
                            None => break 'commands,
                        }
                    },
                    _ = stop_rx.recv() => {
                        return;
                    },
                }
            }
        }
    }

    /// Stop the engine loop. Jobs already spawned run to completion.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(tx) = self.stop_tx.lock().await.as_ref() {
            let _ = tx.send(());
        }
    }

    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    async fn remove_entry(&self, id: EntryId) {
        let mut entries = self.entries.lock().await;
        if let Some(index) = entries.iter().position(|e| e.id == id) {
            entries.remove(index);
        }
    }
}
