//! Admission queue, execution pool, dispatch loop and cancellation.

pub mod admission;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod pool;
pub mod registry;
pub mod shutdown;
pub mod task;

pub use admission::AdmissionQueue;
pub use dispatcher::{Dispatcher, DispatcherStats};
pub use error::{AppResult, DispatchError};
pub use executor::{NoopPreparer, TaskExecutor, TaskPreparer};
pub use metrics::{MetricsSink, MetricsSnapshot, WorkerMetrics};
pub use pool::{ExecutionPool, PoolStats};
pub use registry::{RunState, RunningTaskHandle, RunningTaskRegistry};
pub use shutdown::ShutdownSignal;
pub use task::{ExecutionStatus, PendingTask, TaskExecutionContext, TaskInstanceId};
