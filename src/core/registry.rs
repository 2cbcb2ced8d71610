//! Registry of tasks occupying (or waiting for) an execution slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use super::task::{TaskExecutionContext, TaskInstanceId};

/// Where a dispatched task is inside the execution pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Accepted by the pool, waiting for a worker thread.
    Queued,
    /// A worker thread is executing it.
    Running,
}

#[derive(Debug)]
struct HandleInner {
    context: Arc<TaskExecutionContext>,
    cancelled: AtomicBool,
    started: AtomicBool,
    dispatched_at: Instant,
}

/// Reference to a task handed to the execution pool.
///
/// Cheap to clone; all clones refer to the same execution unit.
#[derive(Debug, Clone)]
pub struct RunningTaskHandle {
    inner: Arc<HandleInner>,
}

impl RunningTaskHandle {
    pub(crate) fn new(context: Arc<TaskExecutionContext>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                context,
                cancelled: AtomicBool::new(false),
                started: AtomicBool::new(false),
                dispatched_at: Instant::now(),
            }),
        }
    }

    /// Task instance id.
    #[must_use]
    pub fn task_instance_id(&self) -> TaskInstanceId {
        self.inner.context.task_instance_id()
    }

    /// Execution context of the task.
    #[must_use]
    pub fn context(&self) -> &Arc<TaskExecutionContext> {
        &self.inner.context
    }

    /// Request cancellation.
    ///
    /// A task still queued inside the pool is skipped and marked killed.
    /// A running executor observes the request through [`Self::is_cancelled`].
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Queued or running.
    #[must_use]
    pub fn state(&self) -> RunState {
        if self.inner.started.load(Ordering::Acquire) {
            RunState::Running
        } else {
            RunState::Queued
        }
    }

    /// Time since the dispatch loop handed the task to the pool.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.inner.dispatched_at.elapsed()
    }

    pub(crate) fn mark_started(&self) {
        self.inner.started.store(true, Ordering::Release);
    }

    fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Concurrent map from task-instance id to its in-flight handle.
///
/// Backed by a sharded map so dispatch-insert, completion-remove and external
/// lookups on different ids do not contend on one lock.
#[derive(Debug, Clone, Default)]
pub struct RunningTaskRegistry {
    tasks: Arc<DashMap<TaskInstanceId, RunningTaskHandle>>,
}

impl RunningTaskRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle, returning any handle previously stored under its id.
    pub fn insert(&self, handle: RunningTaskHandle) -> Option<RunningTaskHandle> {
        self.tasks.insert(handle.task_instance_id(), handle)
    }

    /// Look up an in-flight task.
    #[must_use]
    pub fn get(&self, task_instance_id: TaskInstanceId) -> Option<RunningTaskHandle> {
        self.tasks.get(&task_instance_id).map(|entry| entry.value().clone())
    }

    /// Remove the entry for `handle`, unless it has been replaced by a newer
    /// handle with the same id.
    pub fn remove_handle(&self, handle: &RunningTaskHandle) -> bool {
        self.tasks
            .remove_if(&handle.task_instance_id(), |_, current| current.same_as(handle))
            .is_some()
    }

    /// Whether `task_instance_id` is in flight.
    #[must_use]
    pub fn contains(&self, task_instance_id: TaskInstanceId) -> bool {
        self.tasks.contains_key(&task_instance_id)
    }

    /// Number of in-flight tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
