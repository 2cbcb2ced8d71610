//! Builder wiring a [`Dispatcher`] to its external collaborators.

use std::sync::Arc;

use tracing::info;

use crate::config::DispatcherConfig;
use crate::core::dispatcher::DispatcherInner;
use crate::core::{
    AdmissionQueue, DispatchError, Dispatcher, ExecutionPool, MetricsSink, NoopPreparer,
    ShutdownSignal, TaskExecutor, TaskPreparer, WorkerMetrics,
};
use crate::infra::{ContextCache, InMemoryContextCache, LogStatusSender, StatusReporter, StatusSender};

/// Builder for [`Dispatcher`].
///
/// Every collaborator has a default so tests and small hosts only supply what
/// they care about: no preparation step, an empty in-memory context cache,
/// log-only status reporting, in-process counters, and a fresh shutdown signal.
pub struct DispatcherBuilder<E: TaskExecutor> {
    config: DispatcherConfig,
    executor: E,
    preparer: Option<Arc<dyn TaskPreparer>>,
    contexts: Option<Arc<dyn ContextCache>>,
    status_sender: Option<Arc<dyn StatusSender>>,
    metrics: Option<Arc<dyn MetricsSink>>,
    shutdown: Option<ShutdownSignal>,
}

impl<E: TaskExecutor> DispatcherBuilder<E> {
    /// Start from a configuration and an executor.
    pub fn new(config: DispatcherConfig, executor: E) -> Self {
        Self {
            config,
            executor,
            preparer: None,
            contexts: None,
            status_sender: None,
            metrics: None,
            shutdown: None,
        }
    }

    /// Hook attaching execution dependencies before submission.
    #[must_use]
    pub fn with_preparer(mut self, preparer: Arc<dyn TaskPreparer>) -> Self {
        self.preparer = Some(preparer);
        self
    }

    /// Cache consulted by the cancellation path.
    #[must_use]
    pub fn with_context_cache(mut self, contexts: Arc<dyn ContextCache>) -> Self {
        self.contexts = Some(contexts);
        self
    }

    /// Transport for status reports.
    #[must_use]
    pub fn with_status_sender(mut self, sender: Arc<dyn StatusSender>) -> Self {
        self.status_sender = Some(sender);
        self
    }

    /// Counter sink for overload events.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Run flag shared with the host process.
    #[must_use]
    pub fn with_shutdown_signal(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Validate the configuration, spawn the execution pool and the status
    /// reporter, and return a dispatcher whose loop is not started yet.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for an invalid configuration, `Internal` if a thread
    /// cannot be spawned.
    pub fn build(self) -> Result<Dispatcher<E>, DispatchError> {
        self.config.validate().map_err(DispatchError::InvalidConfig)?;

        let metrics = self
            .metrics
            .unwrap_or_else(|| Arc::new(WorkerMetrics::new()));
        let admission = AdmissionQueue::new(
            self.config.exec_threads,
            self.config.backoff_interval(),
            Arc::clone(&metrics),
        );
        let pool = ExecutionPool::new(
            self.config.exec_threads,
            self.config.thread_stack_size,
            self.executor,
        )?;
        let reporter = StatusReporter::new(
            self.status_sender
                .unwrap_or_else(|| Arc::new(LogStatusSender)),
        )?;

        info!(
            exec_threads = self.config.exec_threads,
            backoff_interval_ms = self.config.backoff_interval_ms,
            "Dispatcher built"
        );

        Ok(Dispatcher::from_parts(DispatcherInner {
            config: self.config,
            admission,
            pool,
            preparer: self.preparer.unwrap_or_else(|| Arc::new(NoopPreparer)),
            contexts: self
                .contexts
                .unwrap_or_else(|| Arc::new(InMemoryContextCache::new())),
            reporter,
            metrics,
            shutdown: self.shutdown.unwrap_or_default(),
        }))
    }
}
