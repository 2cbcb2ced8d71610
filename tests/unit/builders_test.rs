//! Tests for the dispatcher builder

use async_trait::async_trait;
use worker_dispatcher::config::DispatcherConfig;
use worker_dispatcher::core::{
    AppResult, DispatchError, Dispatcher, ExecutionStatus, RunningTaskHandle, TaskExecutor,
};

#[derive(Clone)]
struct NoopExecutor;

#[async_trait]
impl TaskExecutor for NoopExecutor {
    async fn execute(&self, _task: RunningTaskHandle) -> AppResult<ExecutionStatus> {
        Ok(ExecutionStatus::Success)
    }
}

#[test]
fn test_build_with_defaults() {
    let dispatcher = Dispatcher::builder(DispatcherConfig::new().with_exec_threads(3), NoopExecutor)
        .build()
        .unwrap();
    assert_eq!(dispatcher.config().exec_threads, 3);
    assert_eq!(dispatcher.pool_stats().worker_count, 3);
    assert_eq!(dispatcher.stats().admission_queue_size, 0);
    assert!(dispatcher.shutdown_signal().is_running());
    dispatcher.shutdown();
}

#[test]
fn test_build_rejects_invalid_config() {
    let result = Dispatcher::builder(DispatcherConfig::new().with_exec_threads(0), NoopExecutor).build();
    assert!(matches!(result, Err(DispatchError::InvalidConfig(_))));
}
