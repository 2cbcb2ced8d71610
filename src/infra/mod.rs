//! Collaborator adapters: execution-context cache and status reporting.

pub mod context_cache;
pub mod reporter;

pub use context_cache::{ContextCache, InMemoryContextCache};
pub use reporter::{InMemoryStatusSender, LogStatusSender, StatusReport, StatusReporter, StatusSender};
