//! Execution-context cache used by the cancellation path.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::core::{TaskExecutionContext, TaskInstanceId};

/// Lookup of execution contexts by task-instance id.
///
/// The host process fills the cache when it accepts a task from the
/// coordinator and evicts entries once the final status has been acknowledged.
pub trait ContextCache: Send + Sync {
    /// Context for `task_instance_id`, if the worker knows the task.
    fn get_by_task_instance_id(
        &self,
        task_instance_id: TaskInstanceId,
    ) -> Option<Arc<TaskExecutionContext>>;
}

/// Simple in-memory context cache.
#[derive(Debug, Default)]
pub struct InMemoryContextCache {
    contexts: RwLock<HashMap<TaskInstanceId, Arc<TaskExecutionContext>>>,
}

impl InMemoryContextCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache a context, replacing any previous one for the same id.
    pub fn cache(&self, context: Arc<TaskExecutionContext>) {
        self.contexts
            .write()
            .insert(context.task_instance_id(), context);
    }

    /// Evict a context.
    pub fn remove(&self, task_instance_id: TaskInstanceId) -> Option<Arc<TaskExecutionContext>> {
        self.contexts.write().remove(&task_instance_id)
    }

    /// Number of cached contexts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts.read().len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.contexts.read().is_empty()
    }
}

impl ContextCache for InMemoryContextCache {
    fn get_by_task_instance_id(
        &self,
        task_instance_id: TaskInstanceId,
    ) -> Option<Arc<TaskExecutionContext>> {
        self.contexts.read().get(&task_instance_id).cloned()
    }
}
