//! Units of work and the queue that holds them
//!
//! A [`Task`] pairs one absolute file path with the action to apply. Tasks
//! are produced by [`enumerate`] and drained from a [`TaskQueue`] in the
//! order the walk discovered them.

mod enumerate;

pub use enumerate::{enumerate, resolve_root, EnumerateOptions, Enumeration, EnumerationWarning};

use crate::transform::Action;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// One file and the action to apply to it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Task {
    path: PathBuf,
    action: Action,
}

impl Task {
    /// Create a task for `path`
    pub fn new(path: impl Into<PathBuf>, action: Action) -> Self {
        Task {
            path: path.into(),
            action,
        }
    }

    /// Absolute path of the target file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Action the worker applies
    pub fn action(&self) -> Action {
        self.action
    }

    /// Consume the task, returning its path
    pub fn into_path(self) -> PathBuf {
        self.path
    }
}

/// FIFO of tasks that only ever drains
///
/// Tasks are moved out by [`TaskQueue::pop`]; nothing can put a task back.
#[derive(Debug, Default)]
pub struct TaskQueue {
    tasks: VecDeque<Task>,
}

impl TaskQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, task: Task) {
        self.tasks.push_back(task);
    }

    /// Take the next task in enumeration order
    pub fn pop(&mut self) -> Option<Task> {
        self.tasks.pop_front()
    }

    /// Number of tasks still queued
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the queue is drained
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Inspect queued tasks without taking them
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }
}

impl FromIterator<Task> for TaskQueue {
    fn from_iter<I: IntoIterator<Item = Task>>(iter: I) -> Self {
        TaskQueue {
            tasks: iter.into_iter().collect(),
        }
    }
}

impl Iterator for TaskQueue {
    type Item = Task;

    fn next(&mut self) -> Option<Task> {
        self.pop()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.tasks.len(), Some(self.tasks.len()))
    }
}
