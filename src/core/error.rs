//! Error types for dispatcher operations.

use thiserror::Error;

use super::TaskInstanceId;

/// Errors produced by dispatcher components.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The execution pool no longer accepts tasks.
    #[error("execution pool has been shut down")]
    PoolShutdown,
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Attaching execution dependencies to a task failed.
    #[error("failed to prepare task {task_instance_id}: {reason}")]
    Prepare {
        /// Task that could not be prepared.
        task_instance_id: TaskInstanceId,
        /// Rendered cause.
        reason: String,
    },
    /// The status reporter has stopped accepting reports.
    #[error("status reporter is closed")]
    ReporterClosed,
    /// Internal failure (thread spawn, runtime construction).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for collaborator hooks (executors, preparers, status senders).
pub type AppResult<T> = Result<T, anyhow::Error>;
