//! Deferred tasks for debounced buffer reads.
//!
//! The owner supplies the clock: tasks are scheduled at an `Instant` and
//! collected with [`Scheduler::take_due`], which keeps the dispatcher
//! deterministic under test.

use std::time::Instant;

/// Cancellation token for a scheduled task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

#[derive(Debug)]
struct Scheduled<T> {
    id: TaskId,
    due: Instant,
    task: T,
}

#[derive(Debug)]
pub struct Scheduler<T> {
    next_id: u64,
    tasks: Vec<Scheduled<T>>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            tasks: Vec::new(),
        }
    }
}

impl<T: PartialEq> Scheduler<T> {
    /// Schedule `task` at `due`. A pending equal task is replaced, so
    /// repeated triggers debounce to the last one.
    pub fn schedule(&mut self, task: T, due: Instant) -> TaskId {
        self.tasks.retain(|scheduled| scheduled.task != task);
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.push(Scheduled { id, due, task });
        id
    }

    /// Returns false if the task already ran or was replaced.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|scheduled| scheduled.id != id);
        self.tasks.len() != before
    }

    pub fn cancel_where(&mut self, mut predicate: impl FnMut(&T) -> bool) {
        self.tasks.retain(|scheduled| !predicate(&scheduled.task));
    }

    /// Remove and return every task due at `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<T> {
        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|scheduled| scheduled.due <= now);
        self.tasks = pending;
        due.sort_by_key(|scheduled| (scheduled.due, scheduled.id));
        due.into_iter().map(|scheduled| scheduled.task).collect()
    }

    /// When the next task falls due.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks.iter().map(|scheduled| scheduled.due).min()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
