//! Dispatcher configuration.

pub mod dispatcher;

pub use dispatcher::DispatcherConfig;
