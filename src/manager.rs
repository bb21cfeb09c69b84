//! A registry of named schedulers.
//!
//! Each task name owns an independent [`Cron`] engine, created on first
//! reference and started as soon as a job is added under it. Useful when a
//! host wants to group jobs so whole groups can be stopped or dropped
//! together.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono_tz::Tz;

use crate::cron::Cron;
use crate::entry::EntryId;
use crate::job::Job;
use crate::parser::SpecInput;
use crate::Result;

/// A concurrency-safe map from task name to scheduler engine.
pub struct TaskManager {
    tasks: Mutex<HashMap<String, Cron>>,
    tz: Tz,
}

impl TaskManager {
    /// Create an empty manager whose engines evaluate unprefixed specs
    /// in UTC.
    pub fn new() -> TaskManager {
        TaskManager::with_timezone(Tz::UTC)
    }

    /// Create an empty manager with a default timezone for new engines.
    pub fn with_timezone(tz: Tz) -> TaskManager {
        TaskManager {
            tasks: Mutex::new(HashMap::new()),
            tz,
        }
    }

    /// Add a function under `task_name`, creating and starting the engine
    /// on first use.
    pub fn add_task_by_fn<F>(
        &self,
        task_name: &str,
        spec: impl Into<SpecInput>,
        f: F,
    ) -> Result<EntryId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.add_task_by_job(task_name, spec, f)
    }

    /// Add a [`Job`] under `task_name`, creating and starting the engine
    /// on first use.
    pub fn add_task_by_job(
        &self,
        task_name: &str,
        spec: impl Into<SpecInput>,
        job: impl Job + 'static,
    ) -> Result<EntryId> {
        let mut tasks = self.tasks.lock().unwrap();
        let cron = tasks
            .entry(task_name.to_string())
            .or_insert_with(|| Cron::new(self.tz));

        let id = cron.add_job(spec, job);
        cron.start();
        id
    }

    /// The engine registered under `task_name`, if any. The returned handle
    /// shares state with the managed engine.
    pub fn find(&self, task_name: &str) -> Option<Cron> {
        self.tasks.lock().unwrap().get(task_name).cloned()
    }

    /// Start the named engine. Unknown names are ignored.
    pub fn start_task(&self, task_name: &str) {
        let tasks = self.tasks.lock().unwrap();
        if let Some(cron) = tasks.get(task_name) {
            cron.start();
        }
    }

    /// Stop the named engine. Unknown names are ignored.
    pub fn stop_task(&self, task_name: &str) {
        let tasks = self.tasks.lock().unwrap();
        if let Some(cron) = tasks.get(task_name) {
            drop(cron.stop());
        }
    }

    /// Remove one entry from the named engine.
    pub fn remove(&self, task_name: &str, id: EntryId) {
        let tasks = self.tasks.lock().unwrap();
        if let Some(cron) = tasks.get(task_name) {
            cron.remove(id);
        }
    }

    /// Stop the named engine and drop it from the registry.
    pub fn clear(&self, task_name: &str) {
        let mut tasks = self.tasks.lock().unwrap();
        if let Some(cron) = tasks.remove(task_name) {
            drop(cron.stop());
        }
    }

    /// Stop every managed engine. The registry keeps its entries, so tasks
    /// can be started again individually.
    pub fn close(&self) {
        let tasks = self.tasks.lock().unwrap();
        for cron in tasks.values() {
            drop(cron.stop());
        }
    }
}

impl Default for TaskManager {
    fn default() -> TaskManager {
        TaskManager::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engines_are_created_on_first_reference() {
        let manager = TaskManager::new();
        assert!(manager.find("reports").is_none());

        manager.add_task_by_fn("reports", "@every 1h", || {}).unwrap();
        assert!(manager.find("reports").is_some());

        manager.close();
    }

    #[test]
    fn jobs_under_one_name_share_an_engine() {
        let manager = TaskManager::new();
        let a = manager.add_task_by_fn("shared", "@every 1h", || {}).unwrap();
        let b = manager.add_task_by_fn("shared", "@every 2h", || {}).unwrap();
        assert!(b > a);

        let cron = manager.find("shared").unwrap();
        assert_eq!(cron.entries().len(), 2);

        manager.close();
    }

    #[test]
    fn remove_targets_only_the_named_engine() {
        let manager = TaskManager::new();
        let id = manager.add_task_by_fn("a", "@every 1h", || {}).unwrap();
        manager.add_task_by_fn("b", "@every 1h", || {}).unwrap();

        manager.remove("a", id);
        assert!(manager.find("a").unwrap().entries().is_empty());
        assert_eq!(manager.find("b").unwrap().entries().len(), 1);

        manager.close();
    }

    #[test]
    fn clear_drops_the_engine() {
        let manager = TaskManager::new();
        manager.add_task_by_fn("gone", "@every 1h", || {}).unwrap();
        manager.clear("gone");
        assert!(manager.find("gone").is_none());
    }

    #[test]
    fn bad_specs_surface_from_add() {
        let manager = TaskManager::new();
        assert!(manager.add_task_by_fn("bad", "not a spec", || {}).is_err());
        manager.close();
    }
}
