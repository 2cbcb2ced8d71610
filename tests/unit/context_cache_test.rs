//! Tests for the in-memory execution-context cache

use std::sync::Arc;

use worker_dispatcher::core::{ExecutionStatus, TaskExecutionContext};
use worker_dispatcher::infra::{ContextCache, InMemoryContextCache};

#[test]
fn test_cache_and_lookup_share_context() {
    let cache = InMemoryContextCache::new();
    let ctx = Arc::new(TaskExecutionContext::new(11, "load"));
    cache.cache(ctx.clone());

    let found = cache.get_by_task_instance_id(11).unwrap();
    found.set_status(ExecutionStatus::Kill);
    assert_eq!(ctx.status(), ExecutionStatus::Kill);
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_missing_context_is_none() {
    let cache = InMemoryContextCache::new();
    assert!(cache.get_by_task_instance_id(1).is_none());
    assert!(cache.is_empty());
}

#[test]
fn test_remove_evicts() {
    let cache = InMemoryContextCache::new();
    cache.cache(Arc::new(TaskExecutionContext::new(3, "t")));
    assert!(cache.remove(3).is_some());
    assert!(cache.get_by_task_instance_id(3).is_none());
}
