//! Fixed-size execution pool with dedicated worker threads.
//!
//! Each worker thread owns a single-threaded tokio runtime and blocks on a
//! shared channel for work. The pool keeps the running-task registry in sync
//! with what it holds: a handle is registered before the task is enqueued and
//! removed once the task finishes, whatever the outcome.
//!
//! # Design
//!
//! - **No polling**: workers block on `recv`; dropping the sender stops them
//! - **Never blocks the dispatcher**: the internal channel is unbounded, the
//!   dispatch loop limits its depth through [`ExecutionPool::internal_queue_size`]
//! - **Panic isolation**: a panicking executor fails its task, not the worker

use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use super::error::DispatchError;
use super::executor::TaskExecutor;
use super::registry::{RunningTaskHandle, RunningTaskRegistry};
use super::task::{ExecutionStatus, PendingTask, TaskInstanceId};

/// Statistics about pool utilization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of worker threads.
    pub worker_count: usize,
    /// Tasks accepted but not picked up by a worker yet.
    pub queued_tasks: u64,
    /// Tasks currently executing.
    pub active_tasks: u64,
    /// Total tasks accepted.
    pub submitted_tasks: u64,
    /// Tasks that finished with [`ExecutionStatus::Success`].
    pub completed_tasks: u64,
    /// Tasks that failed, errored or panicked.
    pub failed_tasks: u64,
    /// Tasks that were cancelled through their handle.
    pub killed_tasks: u64,
}

#[derive(Debug, Default)]
struct PoolCounters {
    queued_tasks: AtomicU64,
    active_tasks: AtomicU64,
    submitted_tasks: AtomicU64,
    completed_tasks: AtomicU64,
    failed_tasks: AtomicU64,
    killed_tasks: AtomicU64,
}

impl PoolCounters {
    fn snapshot(&self, worker_count: usize) -> PoolStats {
        PoolStats {
            worker_count,
            queued_tasks: self.queued_tasks.load(Ordering::Relaxed),
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            submitted_tasks: self.submitted_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            killed_tasks: self.killed_tasks.load(Ordering::Relaxed),
        }
    }

    fn record_outcome(&self, status: ExecutionStatus) {
        let counter = match status {
            ExecutionStatus::Success => &self.completed_tasks,
            ExecutionStatus::Kill => &self.killed_tasks,
            _ => &self.failed_tasks,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Execution pool with exactly `worker_count` slots.
pub struct ExecutionPool<E: TaskExecutor> {
    worker_count: usize,
    /// Option allows shutdown by dropping the sender.
    task_tx: Mutex<Option<Sender<RunningTaskHandle>>>,
    registry: RunningTaskRegistry,
    counters: Arc<PoolCounters>,
    shutdown: Arc<AtomicBool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    _executor: PhantomData<E>,
}

impl<E: TaskExecutor> ExecutionPool<E> {
    /// Spawn `worker_count` worker threads running `executor`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for a zero worker count, `Internal` if a thread cannot
    /// be spawned.
    pub fn new(worker_count: usize, stack_size: usize, executor: E) -> Result<Self, DispatchError> {
        if worker_count == 0 {
            return Err(DispatchError::InvalidConfig(
                "worker_count must be greater than 0".into(),
            ));
        }

        let (task_tx, task_rx) = unbounded::<RunningTaskHandle>();
        let registry = RunningTaskRegistry::new();
        let counters = Arc::new(PoolCounters::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let worker = spawn_worker(
                worker_id,
                task_rx.clone(),
                registry.clone(),
                Arc::clone(&counters),
                Arc::clone(&shutdown),
                executor.clone(),
                stack_size,
            )
            .map_err(|e| DispatchError::Internal(format!("failed to spawn worker thread: {e}")))?;
            workers.push(worker);
        }

        info!(worker_count, "Execution pool initialized");

        Ok(Self {
            worker_count,
            task_tx: Mutex::new(Some(task_tx)),
            registry,
            counters,
            shutdown,
            workers: Mutex::new(workers),
            _executor: PhantomData,
        })
    }

    /// Hand a task to the pool.
    ///
    /// The handle is registered before the task becomes visible to workers.
    /// Only enqueues; never waits for a free slot.
    ///
    /// # Errors
    ///
    /// `PoolShutdown` once the pool has been shut down.
    pub fn submit(&self, task: PendingTask) -> Result<RunningTaskHandle, DispatchError> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(DispatchError::PoolShutdown);
        }

        let handle = RunningTaskHandle::new(task.into_context());
        let task_instance_id = handle.task_instance_id();
        handle.context().set_status(ExecutionStatus::Dispatched);

        if self.registry.insert(handle.clone()).is_some() {
            warn!(
                task_instance_id,
                "Task instance already in flight; registry entry replaced"
            );
        }
        // Counted before the send so a fast worker never decrements first.
        self.counters.queued_tasks.fetch_add(1, Ordering::Relaxed);

        let sent = self
            .task_tx
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.send(handle.clone()).is_ok());
        if !sent {
            self.counters.queued_tasks.fetch_sub(1, Ordering::Relaxed);
            self.registry.remove_handle(&handle);
            return Err(DispatchError::PoolShutdown);
        }

        self.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);
        debug!(task_instance_id, "Task submitted to execution pool");
        Ok(handle)
    }

    /// Tasks accepted but not finished: waiting for a worker or executing.
    #[must_use]
    pub fn internal_queue_size(&self) -> usize {
        // Queued first: workers raise `active` before lowering `queued`.
        let queued = self.counters.queued_tasks.load(Ordering::Acquire);
        let active = self.counters.active_tasks.load(Ordering::Acquire);
        usize::try_from(queued + active).unwrap_or(usize::MAX)
    }

    /// Look up an in-flight task.
    #[must_use]
    pub fn lookup(&self, task_instance_id: TaskInstanceId) -> Option<RunningTaskHandle> {
        self.registry.get(task_instance_id)
    }

    /// Registry of in-flight tasks.
    #[must_use]
    pub const fn registry(&self) -> &RunningTaskRegistry {
        &self.registry
    }

    /// Number of execution slots.
    #[must_use]
    pub const fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot(self.worker_count)
    }

    /// Stop accepting tasks and join the workers.
    ///
    /// Idle workers exit as soon as the sender is dropped. Each worker gets two
    /// seconds to finish its current task before it is detached.
    pub fn shutdown(&self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }

        info!("Shutting down execution pool");
        *self.task_tx.lock() = None;

        let mut workers = self.workers.lock();
        let worker_count = workers.len();
        for (idx, worker) in workers.drain(..).enumerate() {
            let (tx, rx) = std::sync::mpsc::channel();
            let join_thread = thread::spawn(move || {
                let _ = tx.send(worker.join().is_ok());
            });

            match rx.recv_timeout(Duration::from_secs(2)) {
                Ok(true) => debug!(worker_id = idx, "Worker joined"),
                Ok(false) => warn!(worker_id = idx, "Worker panicked"),
                Err(_) => {
                    warn!(worker_id = idx, "Worker did not exit within timeout - detaching");
                    continue;
                }
            }
            let _ = join_thread.join();
        }

        info!(worker_count, "Execution pool shut down");
    }
}

impl<E: TaskExecutor> Drop for ExecutionPool<E> {
    fn drop(&mut self) {
        // Don't join here; explicit shutdown() is the graceful path.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            *self.task_tx.lock() = None;
            debug!("Execution pool dropped without explicit shutdown - workers detached");
        }
    }
}

fn spawn_worker<E: TaskExecutor>(
    worker_id: usize,
    task_rx: Receiver<RunningTaskHandle>,
    registry: RunningTaskRegistry,
    counters: Arc<PoolCounters>,
    shutdown: Arc<AtomicBool>,
    executor: E,
    stack_size: usize,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(format!("worker-exec-{worker_id}"))
        .stack_size(stack_size)
        .spawn(move || {
            debug!(worker_id, "Worker thread started");

            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!(worker_id, error = %e, "Failed to create worker runtime");
                    return;
                }
            };

            while let Ok(handle) = task_rx.recv() {
                if shutdown.load(Ordering::Acquire) {
                    debug!(worker_id, "Worker shutdown during task, exiting");
                    break;
                }
                let task_instance_id = handle.task_instance_id();
                let started = !handle.is_cancelled();
                let status = if started {
                    // Active before dequeued so the pool never looks emptier than it is.
                    counters.active_tasks.fetch_add(1, Ordering::AcqRel);
                    counters.queued_tasks.fetch_sub(1, Ordering::AcqRel);
                    handle.mark_started();
                    handle.context().set_status(ExecutionStatus::Running);
                    debug!(worker_id, task_instance_id, "Worker executing task");

                    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                        rt.block_on(executor.execute(handle.clone()))
                    }));

                    match outcome {
                        Ok(Ok(status)) => status,
                        Ok(Err(e)) => {
                            warn!(worker_id, task_instance_id, error = %e, "Task execution failed");
                            ExecutionStatus::Failure
                        }
                        Err(_) => {
                            error!(worker_id, task_instance_id, "Task execution panicked");
                            ExecutionStatus::Failure
                        }
                    }
                } else {
                    debug!(worker_id, task_instance_id, "Task cancelled before start, skipping");
                    ExecutionStatus::Kill
                };

                handle.context().set_status(status);
                counters.record_outcome(status);
                registry.remove_handle(&handle);
                // Released last: an empty pool implies the outcome is recorded.
                if started {
                    counters.active_tasks.fetch_sub(1, Ordering::Release);
                } else {
                    counters.queued_tasks.fetch_sub(1, Ordering::Release);
                }
                debug!(worker_id, task_instance_id, ?status, "Worker finished task");
            }

            debug!(worker_id, "Worker thread exiting");
        })
}
