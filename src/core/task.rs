//! Task identity, execution context and the pending-task envelope.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Unique identifier of one execution attempt of a task.
pub type TaskInstanceId = u64;

/// Execution status reported back to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Accepted by the worker, waiting in the admission queue.
    Submitted,
    /// Handed to the execution pool, waiting for a free slot.
    Dispatched,
    /// Occupying an execution slot.
    Running,
    /// Finished successfully.
    Success,
    /// Finished with an error or panic.
    Failure,
    /// Killed before or during execution.
    Kill,
}

impl ExecutionStatus {
    /// Whether the status is terminal.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Kill)
    }
}

/// Execution context of a task instance.
///
/// Built by the host process when the coordinator hands a task over, and
/// shared between the admission queue, the execution pool and the context
/// cache. Only the status is mutable.
#[derive(Debug)]
pub struct TaskExecutionContext {
    task_instance_id: TaskInstanceId,
    task_name: String,
    workflow_instance_id: u64,
    delay: Duration,
    status: RwLock<ExecutionStatus>,
}

impl TaskExecutionContext {
    /// Create a context for an immediately runnable task.
    pub fn new(task_instance_id: TaskInstanceId, task_name: impl Into<String>) -> Self {
        Self {
            task_instance_id,
            task_name: task_name.into(),
            workflow_instance_id: 0,
            delay: Duration::ZERO,
            status: RwLock::new(ExecutionStatus::Submitted),
        }
    }

    /// Set the owning workflow instance.
    #[must_use]
    pub fn with_workflow_instance_id(mut self, workflow_instance_id: u64) -> Self {
        self.workflow_instance_id = workflow_instance_id;
        self
    }

    /// Delay the task's start relative to its submission.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Task instance id.
    #[must_use]
    pub const fn task_instance_id(&self) -> TaskInstanceId {
        self.task_instance_id
    }

    /// Human-readable task name.
    #[must_use]
    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Owning workflow instance.
    #[must_use]
    pub const fn workflow_instance_id(&self) -> u64 {
        self.workflow_instance_id
    }

    /// Requested start delay.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Current execution status.
    #[must_use]
    pub fn status(&self) -> ExecutionStatus {
        *self.status.read()
    }

    /// Overwrite the execution status.
    pub fn set_status(&self, status: ExecutionStatus) {
        *self.status.write() = status;
    }
}

/// A submitted task that has not been dispatched yet.
#[derive(Debug, Clone)]
pub struct PendingTask {
    context: Arc<TaskExecutionContext>,
    ready_at: Instant,
}

impl PendingTask {
    /// Wrap a context; the task becomes ready once its delay has elapsed.
    #[must_use]
    pub fn new(context: Arc<TaskExecutionContext>) -> Self {
        let ready_at = Instant::now() + context.delay();
        Self { context, ready_at }
    }

    /// Wrap a context with an explicit readiness instant.
    #[must_use]
    pub const fn with_ready_at(context: Arc<TaskExecutionContext>, ready_at: Instant) -> Self {
        Self { context, ready_at }
    }

    /// Task instance id.
    #[must_use]
    pub fn task_instance_id(&self) -> TaskInstanceId {
        self.context.task_instance_id()
    }

    /// Instant at or after which the task may be dispatched.
    #[must_use]
    pub const fn ready_at(&self) -> Instant {
        self.ready_at
    }

    /// Whether the task is dispatch-eligible at `now`.
    #[must_use]
    pub fn is_ready(&self, now: Instant) -> bool {
        self.ready_at <= now
    }

    /// Shared execution context.
    #[must_use]
    pub const fn context(&self) -> &Arc<TaskExecutionContext> {
        &self.context
    }

    /// Consume the envelope, keeping the context.
    #[must_use]
    pub fn into_context(self) -> Arc<TaskExecutionContext> {
        self.context
    }
}
