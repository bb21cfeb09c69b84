//! # chronotab
//!
//! An in-process cron job scheduler for Rust.
//!
//! Jobs are described by a schedule expression and a zero-argument callable.
//! The scheduler runs a single event-loop thread that fires each job on its
//! own worker thread when its next instant is reached, so long-running jobs
//! never delay other jobs.
//!
//! Accepted schedule expressions:
//!
//! ```text
//! min   hour   day of month   month   day of week
//! *     *      *              *       *
//! ```
//!
//! plus descriptors (`@hourly`, `@daily`, `@every 1h30m`, ...), an optional
//! `TZ=<IANA name>` prefix, and absolute [`chrono::DateTime`] targets for
//! one-time execution. A seconds field can be enabled through a custom
//! [`Parser`].
//!
//! A simple example:
//!
//! ```rust,no_run
//! use chrono_tz::Tz;
//!
//! let cron = chronotab::Cron::new(Tz::UTC);
//!
//! let job_id = cron
//!     .add_fn("@every 1s", || {
//!         println!("tick");
//!     })
//!     .unwrap();
//!
//! cron.start();
//!
//! std::thread::sleep(std::time::Duration::from_secs(3));
//! cron.remove(job_id);
//!
//! // Wait for in-flight jobs before exiting.
//! cron.stop().wait();
//! ```

mod chain;
mod cron;
mod delay;
mod entry;
mod error;
mod job;
mod manager;
mod parser;
mod schedule;
mod spec_schedule;

#[cfg(feature = "async")]
mod async_cron;
#[cfg(feature = "async")]
mod async_entry;

pub use chain::{Chain, JobWrapper};
pub use cron::{Cron, StopToken};
pub use delay::{ConstantDelaySchedule, OnceSchedule};
pub use entry::{Entry, EntryId};
pub use error::Error;
pub use job::Job;
pub use manager::TaskManager;
pub use parser::{ParseOption, Parser, SpecInput};
pub use schedule::Schedule;
pub use spec_schedule::SpecSchedule;

#[cfg(feature = "async")]
pub use async_cron::AsyncCron;
#[cfg(feature = "async")]
pub use async_entry::{AsyncEntry, TaskFuture, TaskFuturePinned, TaskWrapper};

/// Convenient alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Timer duration used when no entry has a pending fire time.
pub(crate) const MAX_WAIT_SECONDS: u64 = 100_000 * 3600;
