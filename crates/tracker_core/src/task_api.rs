use crate::clock::{Clock, SystemClock};
use crate::error::AppError;
use crate::model::{Task, TaskStatus, format_timestamp, parse_date};
use crate::storage::JsonStore;
use std::path::{Path, PathBuf};
use time::Date;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub overdue: usize,
}

impl TaskStats {
    /// Completed share as a percentage; `None` for an empty collection.
    pub fn completion_rate(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(self.completed as f64 / self.total as f64 * 100.0)
    }
}

/// Owns the in-memory task collection and writes it back after every change.
///
/// Persistence failures never abort a mutation: they are logged and kept in
/// [`TaskManager::last_persist_error`] while the in-memory state stays authoritative.
pub struct TaskManager {
    store: JsonStore,
    clock: Box<dyn Clock>,
    tasks: Vec<Task>,
    /// `None` once a loaded id sits at `u64::MAX`.
    next_id: Option<u64>,
    last_persist_error: Option<AppError>,
}

impl TaskManager {
    pub fn new(store: JsonStore, clock: Box<dyn Clock>) -> Self {
        if let Err(err) = store.ensure_exists() {
            tracing::warn!(path = %store.path().display(), error = %err, "could not create task store");
        }
        let tasks = store.load();
        let next_id = next_id_for(&tasks);

        Self {
            store,
            clock,
            tasks,
            next_id,
            last_persist_error: None,
        }
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::new(JsonStore::new(path), Box::new(SystemClock))
    }

    pub fn store_path(&self) -> &Path {
        self.store.path()
    }

    pub fn today(&self) -> Date {
        self.clock.today()
    }

    pub fn last_persist_error(&self) -> Option<&AppError> {
        self.last_persist_error.as_ref()
    }

    pub fn add(
        &mut self,
        title: &str,
        description: &str,
        due_date: &str,
    ) -> Result<Task, AppError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::invalid_input("title is required"));
        }

        let due_date = due_date.trim();
        let due_date = if due_date.is_empty() {
            None
        } else {
            parse_date(due_date)?;
            Some(due_date.to_string())
        };

        let id = self
            .next_id
            .ok_or_else(|| AppError::invalid_data("task id space exhausted"))?;

        let task = Task {
            id,
            title: title.to_string(),
            description: description.trim().to_string(),
            status: TaskStatus::Pending,
            created_at: format_timestamp(self.clock.now())?,
            due_date,
            completed_at: None,
        };

        self.tasks.push(task.clone());
        self.next_id = id.checked_add(1);
        self.persist();

        Ok(task)
    }

    /// Insertion order, or ascending due date with undated and malformed
    /// entries last. The sort is stable.
    pub fn list(&self, sort_by_due_date: bool) -> Vec<Task> {
        let mut tasks = self.tasks.clone();
        if sort_by_due_date {
            tasks.sort_by_key(|task| task.due().unwrap_or(Date::MAX));
        }
        tasks
    }

    pub fn get_by_id(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// `Ok(false)` only when no task has `id`. Completing an already
    /// completed task keeps its original `completed_at`.
    pub fn complete(&mut self, id: u64) -> Result<bool, AppError> {
        let now = self.clock.now();
        let Some(task) = self.tasks.iter_mut().find(|task| task.id == id) else {
            return Ok(false);
        };

        if task.status == TaskStatus::Pending {
            task.completed_at = Some(format_timestamp(now)?);
            task.status = TaskStatus::Completed;
        }

        self.persist();
        Ok(true)
    }

    pub fn delete(&mut self, id: u64) -> bool {
        let Some(index) = self.tasks.iter().position(|task| task.id == id) else {
            return false;
        };

        self.tasks.remove(index);
        self.persist();
        true
    }

    pub fn stats(&self) -> TaskStats {
        let today = self.clock.today();
        let mut stats = TaskStats {
            total: self.tasks.len(),
            ..TaskStats::default()
        };

        for task in &self.tasks {
            match task.status {
                TaskStatus::Completed => stats.completed += 1,
                TaskStatus::Pending if task.is_overdue(today) => stats.overdue += 1,
                TaskStatus::Pending => {}
            }
        }
        stats.pending = stats.total - stats.completed;

        stats
    }

    /// Replaces in-memory state with whatever is on disk now.
    pub fn reload(&mut self) {
        self.tasks = self.store.load();
        self.next_id = next_id_for(&self.tasks);
    }

    pub fn backup(&self) -> Result<PathBuf, AppError> {
        self.store.backup()
    }

    fn persist(&mut self) {
        match self.store.save(&self.tasks) {
            Ok(()) => self.last_persist_error = None,
            Err(err) => {
                tracing::error!(path = %self.store.path().display(), error = %err, "failed to save tasks");
                self.last_persist_error = Some(err);
            }
        }
    }
}

fn next_id_for(tasks: &[Task]) -> Option<u64> {
    match tasks.iter().map(|task| task.id).max() {
        Some(max) => max.checked_add(1),
        None => Some(1),
    }
}
