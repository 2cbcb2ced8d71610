//! Dispatch loop and cancellation path.
//!
//! The [`Dispatcher`] ties the admission queue to the execution pool. One
//! dedicated thread moves ready tasks from the queue into the pool, pausing
//! whenever the pool already holds more than `exec_threads` unfinished tasks so
//! the backlog stays in the admission queue where it can still be cancelled.
//!
//! ```text
//! producers ──offer──► AdmissionQueue ──take──► dispatch loop ──submit──► ExecutionPool
//!                           ▲                                              │
//! cancel_before_start ──────┘ (remove)        registry ◄──insert/remove────┘
//!        └──► ContextCache ──► StatusReporter ──► coordinator
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::builders::DispatcherBuilder;
use crate::config::DispatcherConfig;
use crate::infra::{ContextCache, StatusReporter};

use super::admission::AdmissionQueue;
use super::error::DispatchError;
use super::executor::{TaskExecutor, TaskPreparer};
use super::metrics::MetricsSink;
use super::pool::{ExecutionPool, PoolStats};
use super::registry::RunningTaskHandle;
use super::shutdown::ShutdownSignal;
use super::task::{ExecutionStatus, PendingTask, TaskExecutionContext, TaskInstanceId};

/// Diagnostics snapshot of a dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatcherStats {
    /// Tasks waiting in the admission queue.
    pub admission_queue_size: usize,
    /// Tasks accepted by the pool and not finished.
    pub execution_queue_size: usize,
    /// Tasks currently registered as in flight.
    pub in_flight_tasks: usize,
    /// Status reports delivered.
    pub reports_sent: u64,
    /// Status reports whose delivery failed.
    pub reports_failed: u64,
}

pub(crate) struct DispatcherInner<E: TaskExecutor> {
    pub(crate) config: DispatcherConfig,
    pub(crate) admission: AdmissionQueue,
    pub(crate) pool: ExecutionPool<E>,
    pub(crate) preparer: Arc<dyn TaskPreparer>,
    pub(crate) contexts: Arc<dyn ContextCache>,
    pub(crate) reporter: StatusReporter,
    pub(crate) metrics: Arc<dyn MetricsSink>,
    pub(crate) shutdown: ShutdownSignal,
}

/// Local task dispatcher of a worker node.
///
/// Dropping it without [`Dispatcher::shutdown`] stops the dispatch loop but
/// does not wait for it.
pub struct Dispatcher<E: TaskExecutor> {
    inner: Arc<DispatcherInner<E>>,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<E: TaskExecutor> Dispatcher<E> {
    /// Start building a dispatcher around `executor`.
    pub fn builder(config: DispatcherConfig, executor: E) -> DispatcherBuilder<E> {
        DispatcherBuilder::new(config, executor)
    }

    pub(crate) fn from_parts(inner: DispatcherInner<E>) -> Self {
        Self {
            inner: Arc::new(inner),
            loop_handle: Mutex::new(None),
        }
    }

    /// Start the dispatch loop on a dedicated thread. Returns immediately.
    ///
    /// Calling it again while the loop is running is a no-op.
    ///
    /// # Errors
    ///
    /// `Internal` if the thread cannot be spawned.
    pub fn start(&self) -> Result<(), DispatchError> {
        let mut loop_handle = self.loop_handle.lock();
        if loop_handle.is_some() {
            warn!("Dispatch loop already started");
            return Ok(());
        }

        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name("worker-dispatch-loop".into())
            .spawn(move || inner.run())
            .map_err(|e| DispatchError::Internal(format!("failed to spawn dispatch loop: {e}")))?;
        *loop_handle = Some(handle);
        Ok(())
    }

    /// Submit a task to the admission queue.
    ///
    /// `false` means the task was not accepted and the caller should retry
    /// later; it never means the task is pending.
    pub fn offer(&self, task: PendingTask) -> bool {
        self.inner.admission.offer(task)
    }

    /// Cancel a task that has not been dispatched yet.
    ///
    /// Removes the task from the admission queue and reports a kill status for
    /// it, whether or not it was still queued. Returns whether the task was
    /// found in the queue. Tasks already in the pool are not touched; use
    /// [`Self::lookup`] and [`RunningTaskHandle::cancel`] for those.
    pub fn cancel_before_start(&self, task_instance_id: TaskInstanceId) -> bool {
        self.inner.cancel_before_start(task_instance_id)
    }

    /// Number of tasks in the admission queue.
    #[must_use]
    pub fn admission_queue_size(&self) -> usize {
        self.inner.admission.len()
    }

    /// Number of tasks accepted by the pool and not finished.
    #[must_use]
    pub fn execution_queue_size(&self) -> usize {
        self.inner.pool.internal_queue_size()
    }

    /// Look up an in-flight task.
    #[must_use]
    pub fn lookup(&self, task_instance_id: TaskInstanceId) -> Option<RunningTaskHandle> {
        self.inner.pool.lookup(task_instance_id)
    }

    /// Execution pool statistics.
    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        self.inner.pool.stats()
    }

    /// Diagnostics snapshot.
    #[must_use]
    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            admission_queue_size: self.admission_queue_size(),
            execution_queue_size: self.execution_queue_size(),
            in_flight_tasks: self.inner.pool.registry().len(),
            reports_sent: self.inner.reporter.sent_count(),
            reports_failed: self.inner.reporter.failed_count(),
        }
    }

    /// The run flag observed by the dispatch loop.
    #[must_use]
    pub fn shutdown_signal(&self) -> &ShutdownSignal {
        &self.inner.shutdown
    }

    /// Configuration the dispatcher was built with.
    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    /// Stop the dispatch loop, then shut down the pool and the reporter.
    ///
    /// Tasks still queued are abandoned.
    pub fn shutdown(&self) {
        self.inner.shutdown.stop();
        if let Some(handle) = self.loop_handle.lock().take() {
            if handle.join().is_err() {
                error!("Dispatch loop thread panicked");
            }
        }
        self.inner.pool.shutdown();
        self.inner.reporter.shutdown();
        info!(
            abandoned = self.inner.admission.len(),
            "Dispatcher shut down"
        );
    }
}

impl<E: TaskExecutor> Drop for Dispatcher<E> {
    fn drop(&mut self) {
        // Don't join here; explicit shutdown() is the graceful path.
        if self.inner.shutdown.stop() {
            debug!("Dispatcher dropped without explicit shutdown - dispatch loop detached");
        }
    }
}

impl<E: TaskExecutor> DispatcherInner<E> {
    fn run(&self) {
        info!(
            exec_threads = self.config.exec_threads,
            "Dispatch loop started"
        );
        while self.shutdown.is_running() {
            match panic::catch_unwind(AssertUnwindSafe(|| self.dispatch_once())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(
                    error = %e,
                    "Unexpected failure in dispatch loop, ignored; loop continues"
                ),
                Err(_) => error!("Dispatch loop iteration panicked, ignored; loop continues"),
            }
        }
        info!("Dispatch loop stopped");
    }

    fn dispatch_once(&self) -> Result<(), DispatchError> {
        if self.pool.internal_queue_size() > self.config.exec_threads {
            self.metrics.inc_overload();
            info!(
                admission_queue_size = self.admission.len(),
                execution_queue_size = self.pool.internal_queue_size(),
                "Execution queue is full, waiting before next dispatch"
            );
            thread::sleep(self.config.backoff_interval());
            return Ok(());
        }

        let Some(task) = self
            .admission
            .take_earliest_ready_timeout(self.config.poll_interval())
        else {
            return Ok(());
        };

        let task_instance_id = task.task_instance_id();
        // The task is out of the queue; a panicking preparer must not lose it.
        let prepared = panic::catch_unwind(AssertUnwindSafe(|| self.preparer.prepare(&task)))
            .unwrap_or_else(|_| Err(anyhow::anyhow!("preparer panicked")));
        if let Err(e) = prepared {
            self.fail_unprepared(task.context());
            return Err(DispatchError::Prepare {
                task_instance_id,
                reason: format!("{e:#}"),
            });
        }

        self.pool.submit(task)?;
        debug!(task_instance_id, "Task dispatched to execution pool");
        Ok(())
    }

    /// A task that left the queue but could not be prepared (error or panic)
    /// is reported as failed so the coordinator does not wait on it.
    fn fail_unprepared(&self, context: &TaskExecutionContext) {
        context.set_status(ExecutionStatus::Failure);
        if let Err(e) = self.reporter.send(context) {
            warn!(
                task_instance_id = context.task_instance_id(),
                error = %e,
                "Could not report failed preparation"
            );
        }
    }

    fn cancel_before_start(&self, task_instance_id: TaskInstanceId) -> bool {
        let removed = self.admission.remove_by_instance_id(task_instance_id);
        if removed {
            info!(task_instance_id, "Task removed from admission queue before start");
        } else {
            debug!(task_instance_id, "Task not in admission queue");
        }
        self.send_kill_report(task_instance_id);
        removed
    }

    fn send_kill_report(&self, task_instance_id: TaskInstanceId) {
        let Some(context) = self.contexts.get_by_task_instance_id(task_instance_id) else {
            debug!(task_instance_id, "No execution context cached, skipping kill report");
            return;
        };
        context.set_status(ExecutionStatus::Kill);
        if let Err(e) = self.reporter.send(&context) {
            warn!(task_instance_id, error = %e, "Could not enqueue kill report");
        }
    }
}
