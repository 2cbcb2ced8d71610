//! Builders to assemble a dispatcher from its collaborators.

pub mod dispatcher_builder;

pub use dispatcher_builder::DispatcherBuilder;
