//! Task execution and preparation hooks.

use async_trait::async_trait;

use super::error::AppResult;
use super::registry::RunningTaskHandle;
use super::task::{ExecutionStatus, PendingTask};

/// Runs a dispatched task inside an execution slot.
///
/// The executor is where the task's business logic lives (spawning the task
/// process, calling a plugin, ...). It is cloned into every worker thread.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use worker_dispatcher::core::{AppResult, ExecutionStatus, RunningTaskHandle, TaskExecutor};
///
/// #[derive(Clone)]
/// struct ShellExecutor;
///
/// #[async_trait]
/// impl TaskExecutor for ShellExecutor {
///     async fn execute(&self, task: RunningTaskHandle) -> AppResult<ExecutionStatus> {
///         let script = load_script(task.context().task_name())?;
///         run(script).await?;
///         Ok(ExecutionStatus::Success)
///     }
/// }
/// ```
#[async_trait]
pub trait TaskExecutor: Send + Sync + Clone + 'static {
    /// Execute the task and return its terminal status.
    ///
    /// # Threading
    ///
    /// Called from a dedicated worker thread that drives the future on its own
    /// single-threaded tokio runtime. Long-running executors should poll
    /// [`RunningTaskHandle::is_cancelled`] and return
    /// [`ExecutionStatus::Kill`] when asked to stop.
    ///
    /// # Errors
    ///
    /// An error marks the task as [`ExecutionStatus::Failure`].
    async fn execute(&self, task: RunningTaskHandle) -> AppResult<ExecutionStatus>;
}

/// Attaches externally provided execution dependencies (storage accessors,
/// credentials, ...) to a task right before it is submitted to the pool.
pub trait TaskPreparer: Send + Sync + 'static {
    /// Prepare `task` for execution.
    ///
    /// # Errors
    ///
    /// A failure is logged by the dispatch loop and the task is reported as
    /// failed instead of being executed.
    fn prepare(&self, task: &PendingTask) -> AppResult<()>;
}

/// Preparer for hosts without extra execution dependencies.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPreparer;

impl TaskPreparer for NoopPreparer {
    fn prepare(&self, _task: &PendingTask) -> AppResult<()> {
        Ok(())
    }
}
