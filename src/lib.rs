//! # Worker Dispatcher
//!
//! The local task dispatcher of a workflow worker node.
//!
//! An upstream coordinator hands task-execution requests to the worker. This
//! crate holds them in a time-aware admission queue, drains them into a
//! fixed-size execution pool from a single dispatch loop, and lets callers
//! cancel work that has not started yet.
//!
//! ## Moving Parts
//!
//! - **Admission queue**: delay-ordered holding area with a soft capacity.
//!   Producers calling `offer` are slowed down for one backoff interval when the
//!   queue is over capacity and rejected if it still is afterwards.
//! - **Execution pool**: `C` dedicated worker threads plus a registry of
//!   in-flight tasks keyed by task-instance id.
//! - **Dispatch loop**: one thread that pulls the earliest ready task and
//!   submits it, backing off while the pool is saturated.
//! - **Cancellation**: removes a still-queued task and reports a kill status to
//!   the coordinator through an asynchronous status reporter.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use worker_dispatcher::config::DispatcherConfig;
//! use worker_dispatcher::core::{Dispatcher, PendingTask, TaskExecutionContext};
//!
//! let dispatcher = Dispatcher::builder(DispatcherConfig::new().with_exec_threads(4), my_executor)
//!     .with_context_cache(contexts.clone())
//!     .with_status_sender(coordinator_client)
//!     .build()?;
//! dispatcher.start()?;
//!
//! let ctx = Arc::new(TaskExecutionContext::new(42, "extract-orders"));
//! contexts.cache(Arc::clone(&ctx));
//! if !dispatcher.offer(PendingTask::new(ctx)) {
//!     // not accepted; the coordinator should retry later
//! }
//!
//! dispatcher.cancel_before_start(42);
//! dispatcher.shutdown();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Admission queue, execution pool, dispatch loop and cancellation.
pub mod core;
/// Dispatcher configuration.
pub mod config;
/// Builders to assemble a dispatcher from its collaborators.
pub mod builders;
/// Collaborator adapters: execution-context cache and status reporting.
pub mod infra;
/// Shared utilities.
pub mod util;
